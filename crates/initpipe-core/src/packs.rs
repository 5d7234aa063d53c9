//! Skill packs and the skill sync manifest consumed by the wrapper-sync tool.

use crate::blueprint::Blueprint;
use crate::error::Result;
use crate::features;
use crate::paths;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Pack table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackSpec {
    pub name: &'static str,
    /// Skill path prefix selected by this pack in the sync manifest.
    pub prefix: &'static str,
}

/// Canonical pack order.
pub const PACKS: &[PackSpec] = &[
    PackSpec { name: "workflow", prefix: "workflows/" },
    PackSpec { name: "standards", prefix: "standards/" },
    PackSpec { name: "backend", prefix: "backend/" },
    PackSpec { name: "frontend", prefix: "frontend/" },
    PackSpec { name: "data", prefix: "data/" },
    PackSpec { name: "diagrams", prefix: "diagrams/" },
    PackSpec { name: "context-core", prefix: "context/" },
    PackSpec { name: "testing", prefix: "testing/" },
    PackSpec { name: "ops", prefix: "ops/" },
];

pub fn pack(name: &str) -> Option<&'static PackSpec> {
    PACKS.iter().find(|p| p.name == name)
}

/// Deduplicate known packs and order them canonically. Unknown names are
/// dropped (the validator reports them).
pub fn normalize<S: AsRef<str>>(requested: &[S]) -> Vec<String> {
    let wanted: BTreeSet<&str> = requested.iter().map(|s| s.as_ref()).collect();
    PACKS
        .iter()
        .filter(|p| wanted.contains(p.name))
        .map(|p| p.name.to_string())
        .collect()
}

/// Advisory pack recommendations, in canonical order.
pub fn recommended_packs(bp: &Blueprint) -> Vec<&'static str> {
    let caps = &bp.capabilities;
    let mut recs: BTreeSet<&str> = BTreeSet::new();
    recs.insert("workflow");
    if caps.backend() {
        recs.insert("backend");
    }
    if caps.frontend() {
        recs.insert("frontend");
    }
    if caps.database() || bp.db.ssot.is_managed() {
        recs.insert("data");
    }
    if caps.bpmn() {
        recs.insert("diagrams");
    }
    if bp.feature("contextAwareness") {
        recs.insert("context-core");
    }
    PACKS
        .iter()
        .map(|p| p.name)
        .filter(|n| recs.contains(n))
        .collect()
}

/// Safe-add `recommended` packs into the raw blueprint's `skills.packs`.
/// Existing entries are kept in place. Returns the packs added.
pub fn merge_pack_recommendations(doc: &mut Value, recommended: &[&str]) -> Vec<String> {
    let Some(obj) = doc.as_object_mut() else {
        return Vec::new();
    };
    let skills = obj
        .entry("skills")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(skills) = skills.as_object_mut() else {
        return Vec::new();
    };
    let packs = skills
        .entry("packs")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(list) = packs.as_array_mut() else {
        return Vec::new();
    };
    let mut added = Vec::new();
    for name in recommended {
        if !list.iter().any(|v| v.as_str() == Some(name)) {
            list.push(Value::String(name.to_string()));
            added.push(name.to_string());
        }
    }
    added
}

// ---------------------------------------------------------------------------
// SkillManifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub include_prefixes: Vec<String>,
    #[serde(default)]
    pub include_skills: Vec<String>,
    #[serde(default)]
    pub exclude_skills: Vec<String>,
}

fn default_version() -> u32 {
    1
}

impl Default for SkillManifest {
    fn default() -> Self {
        Self {
            version: 1,
            include_prefixes: Vec::new(),
            include_skills: Vec::new(),
            exclude_skills: Vec::new(),
        }
    }
}

/// Prefixes changed by [`SkillManifest::select_packs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SkillManifest {
    /// Load the manifest, or an empty one if it does not exist yet.
    pub fn load(root: &Path) -> Result<Self> {
        Ok(crate::io::read_json_optional(&paths::skill_manifest_path(root))?.unwrap_or_default())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::io::to_json_bytes(self)
    }

    /// Make the pack prefixes match `packs`: prefixes of requested packs are
    /// added, prefixes of packs no longer requested are withdrawn. Prefixes
    /// that belong to no known pack were added by hand and are kept.
    pub fn select_packs(&mut self, packs: &[String]) -> PrefixChanges {
        let wanted: Vec<&str> = packs
            .iter()
            .filter_map(|name| pack(name))
            .map(|spec| spec.prefix)
            .collect();
        let mut changes = PrefixChanges::default();

        self.include_prefixes.retain(|p| {
            let owned = PACKS.iter().any(|spec| spec.prefix == p);
            if owned && !wanted.contains(&p.as_str()) {
                changes.removed.push(p.clone());
                false
            } else {
                true
            }
        });
        for prefix in wanted {
            if !self.include_prefixes.iter().any(|p| p == prefix) {
                self.include_prefixes.push(prefix.to_string());
                changes.added.push(prefix.to_string());
            }
        }
        changes
    }

    /// Replace the DB sync entries of `excludeSkills` with `excluded`. Other
    /// exclusions are kept; the list is kept sorted for stable output.
    pub fn apply_sync_exclusions(&mut self, excluded: &[&str]) {
        self.exclude_skills
            .retain(|s| !features::SYNC_SKILLS.contains(&s.as_str()));
        self.exclude_skills
            .extend(excluded.iter().map(|s| s.to_string()));
        self.exclude_skills.sort();
        self.exclude_skills.dedup();
        // An excluded sync skill must not be force-included either.
        self.include_skills
            .retain(|s| !excluded.contains(&s.as_str()));
    }

    /// The DB sync skills currently excluded.
    pub fn sync_exclusions(&self) -> Vec<&str> {
        self.exclude_skills
            .iter()
            .map(|s| s.as_str())
            .filter(|s| features::SYNC_SKILLS.contains(s))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
