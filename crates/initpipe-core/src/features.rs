//! Optional features, their dependency edges, and the DB sync exclusion rule.
//!
//! Features and their `requires` edges are data. Adding a feature means adding
//! a row to [`FEATURES`]; validation, resolution and ordering pick it up.

use crate::blueprint::{Blueprint, DbSsot};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Feature table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureSpec {
    /// Blueprint key under `features.*`.
    pub key: &'static str,
    /// Directory name under `.ai/features/`.
    pub id: &'static str,
    pub summary: &'static str,
    /// Blueprint keys that must also be enabled.
    pub requires: &'static [&'static str],
}

/// Declaration order is installation order.
pub const FEATURES: &[FeatureSpec] = &[
    FeatureSpec {
        key: "contextAwareness",
        id: "context-awareness",
        summary: "API/DB/process context registry for agents",
        requires: &[],
    },
    FeatureSpec {
        key: "database",
        id: "database",
        summary: "schema sync between repo and database",
        requires: &[],
    },
    FeatureSpec {
        key: "ui",
        id: "ui",
        summary: "UI tokens and component contracts",
        requires: &[],
    },
    FeatureSpec {
        key: "environment",
        id: "environment",
        summary: "environment contract and env file generation",
        requires: &[],
    },
    FeatureSpec {
        key: "packaging",
        id: "packaging",
        summary: "container and artifact packaging",
        requires: &[],
    },
    FeatureSpec {
        key: "deployment",
        id: "deployment",
        summary: "deployment targets and rollout docs",
        requires: &[],
    },
    FeatureSpec {
        key: "release",
        id: "release",
        summary: "versioning and changelog workflow",
        requires: &[],
    },
    FeatureSpec {
        key: "observability",
        id: "observability",
        summary: "metrics, logs and traces contracts",
        requires: &["contextAwareness"],
    },
];

pub fn by_key(key: &str) -> Option<&'static FeatureSpec> {
    FEATURES.iter().find(|f| f.key == key)
}

pub fn is_known_key(key: &str) -> bool {
    by_key(key).is_some()
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Enabled features in declaration order, derived solely from `features.*`.
pub fn enabled_features(bp: &Blueprint) -> Vec<&'static FeatureSpec> {
    enabled_from_flags(&bp.features)
}

pub fn enabled_from_flags(flags: &BTreeMap<String, bool>) -> Vec<&'static FeatureSpec> {
    FEATURES
        .iter()
        .filter(|f| flags.get(f.key).copied().unwrap_or(false))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetRequirement {
    pub feature: &'static str,
    pub requires: &'static str,
}

/// Walk `requires` edges (transitively) from every enabled feature and report
/// each dependency that is not enabled. Each pair is reported once.
pub fn unmet_requirements(flags: &BTreeMap<String, bool>) -> Vec<UnmetRequirement> {
    let enabled: BTreeSet<&str> = enabled_from_flags(flags).iter().map(|f| f.key).collect();
    let mut out = Vec::new();

    for root in FEATURES.iter().filter(|f| enabled.contains(f.key)) {
        let mut stack: Vec<&'static str> = root.requires.to_vec();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        while let Some(dep) = stack.pop() {
            if !seen.insert(dep) {
                continue;
            }
            if !enabled.contains(dep) {
                out.push(UnmetRequirement {
                    feature: root.key,
                    requires: dep,
                });
            }
            if let Some(spec) = by_key(dep) {
                stack.extend(spec.requires.iter().copied());
            }
        }
    }
    out
}

/// Advisory feature recommendations. Never authoritative for installation.
pub fn recommended_features(bp: &Blueprint) -> Vec<&'static str> {
    let caps = &bp.capabilities;
    let mut recs: BTreeSet<&'static str> = BTreeSet::new();
    if caps.api() || caps.database() || caps.bpmn() {
        recs.insert("contextAwareness");
    }
    if bp.db.ssot.is_managed() {
        recs.insert("database");
    }
    if caps.frontend() {
        recs.insert("ui");
    }
    if caps.backend() {
        recs.insert("environment");
    }
    // Emit in declaration order.
    FEATURES
        .iter()
        .map(|f| f.key)
        .filter(|k| recs.contains(k))
        .collect()
}

/// Safe-add `recommended` into the raw blueprint's `features` map.
///
/// Only keys absent from `features` are added (as `true`); existing values,
/// including explicit `false`, are never changed. Returns the keys added.
pub fn merge_recommendations(doc: &mut Value, recommended: &[&str]) -> Vec<String> {
    let Some(obj) = doc.as_object_mut() else {
        return Vec::new();
    };
    let features = obj
        .entry("features")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(map) = features.as_object_mut() else {
        return Vec::new();
    };
    let mut added = Vec::new();
    for key in recommended {
        if !map.contains_key(*key) {
            map.insert(key.to_string(), Value::Bool(true));
            added.push(key.to_string());
        }
    }
    added
}

// ---------------------------------------------------------------------------
// DB sync exclusion
// ---------------------------------------------------------------------------

/// Skill that pulls the schema from a running database into the repo.
pub const SYNC_FROM_DATABASE: &str = "sync-from-database";
/// Skill that pushes the repo-defined schema to the database.
pub const SYNC_FROM_REPO: &str = "sync-from-repo";

/// Both DB sync skills; exactly the complement of the legal one is excluded.
pub const SYNC_SKILLS: &[&str] = &[SYNC_FROM_DATABASE, SYNC_FROM_REPO];

/// Skills excluded for a given SSOT.
pub fn sync_exclusions(ssot: DbSsot) -> Vec<&'static str> {
    match ssot {
        DbSsot::RepoPrisma => vec![SYNC_FROM_DATABASE],
        DbSsot::Database => vec![SYNC_FROM_REPO],
        DbSsot::None => SYNC_SKILLS.to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
