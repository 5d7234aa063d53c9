use crate::error::{InitError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoLayout {
    Single,
    Monorepo,
}

impl RepoLayout {
    pub const ALL: &'static [&'static str] = &["single", "monorepo"];
}

/// Which system is authoritative for schema synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DbSsot {
    #[default]
    None,
    RepoPrisma,
    Database,
}

impl DbSsot {
    pub const ALL: &'static [&'static str] = &["none", "repo-prisma", "database"];

    pub fn as_str(self) -> &'static str {
        match self {
            DbSsot::None => "none",
            DbSsot::RepoPrisma => "repo-prisma",
            DbSsot::Database => "database",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(DbSsot::None),
            "repo-prisma" => Some(DbSsot::RepoPrisma),
            "database" => Some(DbSsot::Database),
            _ => None,
        }
    }

    pub fn is_managed(self) -> bool {
        self != DbSsot::None
    }
}

impl fmt::Display for DbSsot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    pub layout: RepoLayout,
    pub language: String,
    pub package_manager: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capability {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpmn: Option<Capability>,
}

impl Capabilities {
    pub const KEYS: &'static [&'static str] = &["frontend", "backend", "database", "api", "bpmn"];

    fn on(c: &Option<Capability>) -> bool {
        c.as_ref().map(|c| c.enabled).unwrap_or(false)
    }

    pub fn frontend(&self) -> bool {
        Self::on(&self.frontend)
    }

    pub fn backend(&self) -> bool {
        Self::on(&self.backend)
    }

    pub fn database(&self) -> bool {
        Self::on(&self.database)
    }

    pub fn api(&self) -> bool {
        Self::on(&self.api)
    }

    pub fn bpmn(&self) -> bool {
        Self::on(&self.bpmn)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ssot: DbSsot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsConfig {
    #[serde(default)]
    pub packs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// Typed view of a blueprint that has passed validation.
///
/// The validator works on the raw JSON so it can report every problem in one
/// pass; this struct is built afterwards for the resolver and pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub version: u32,
    pub project: ProjectInfo,
    pub repo: RepoInfo,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
}

impl Blueprint {
    pub fn from_value(doc: &Value) -> Result<Self> {
        Ok(Blueprint::deserialize(doc)?)
    }

    pub fn feature(&self, key: &str) -> bool {
        self.features.get(key).copied().unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Raw document I/O
// ---------------------------------------------------------------------------

/// Read the blueprint as raw JSON.
pub fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(InitError::BlueprintNotFound(path.display().to_string()));
    }
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|source| InitError::BlueprintParse {
        path: path.display().to_string(),
        source,
    })
}

/// Write the blueprint back, preserving key order and unknown fields.
pub fn save_document(path: &Path, doc: &Value) -> Result<()> {
    let data = crate::io::to_json_bytes(doc)?;
    crate::io::atomic_write(path, &data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
