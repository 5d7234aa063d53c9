use crate::error::{InitError, Result};
use crate::paths;
use crate::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Keys of the Stage-A must-ask checklist, in interview order.
pub const MUST_ASK_KEYS: &[&str] = &[
    "onePurpose",
    "userRoles",
    "mustRequirements",
    "outOfScope",
    "userJourneys",
    "constraints",
    "successMetrics",
];

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MustAsk {
    pub asked: bool,
    pub answered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageA {
    pub must_ask: BTreeMap<String, MustAsk>,
    #[serde(default)]
    pub docs_written: BTreeMap<String, bool>,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub user_approved: bool,
}

impl Default for StageA {
    fn default() -> Self {
        Self {
            must_ask: MUST_ASK_KEYS
                .iter()
                .map(|k| (k.to_string(), MustAsk::default()))
                .collect(),
            docs_written: BTreeMap::new(),
            validated: false,
            user_approved: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageB {
    pub drafted: bool,
    pub validated: bool,
    pub packs_reviewed: bool,
    pub user_approved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageC {
    pub scaffold_applied: bool,
    pub configs_generated: bool,
    pub manifest_updated: bool,
    pub wrappers_synced: bool,
    pub user_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(default)]
    pub details: Value,
}

/// Flags produced by one `apply` run, merged into `stage-c`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCProgress {
    pub scaffold_applied: bool,
    pub configs_generated: bool,
    pub manifest_updated: bool,
    pub wrappers_synced: bool,
}

/// Per-stage completion counters reported by `status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounters {
    pub stage: Stage,
    pub done: usize,
    pub total: usize,
    pub validated: bool,
    pub user_approved: bool,
}

// ---------------------------------------------------------------------------
// InitState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitState {
    #[serde(default = "default_version")]
    pub version: u32,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "stage-a", default)]
    pub stage_a: StageA,
    #[serde(rename = "stage-b", default)]
    pub stage_b: StageB,
    #[serde(rename = "stage-c", default)]
    pub stage_c: StageC,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

fn default_version() -> u32 {
    1
}

impl InitState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: 1,
            stage: Stage::A,
            created_at: now,
            updated_at: now,
            stage_a: StageA::default(),
            stage_b: StageB::default(),
            stage_c: StageC::default(),
            history: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn exists(root: &Path) -> bool {
        paths::init_state_path(root).exists()
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::init_state_path(root);
        if !path.exists() {
            return Err(InitError::NotStarted);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: InitState = serde_json::from_str(&data)?;
        Ok(state)
    }

    /// Load the state if the pipeline has been started.
    pub fn load_optional(root: &Path) -> Result<Option<Self>> {
        match Self::load(root) {
            Ok(s) => Ok(Some(s)),
            Err(InitError::NotStarted) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::init_state_path(root);
        let data = crate::io::to_json_bytes(self)?;
        crate::io::atomic_write(&path, &data)
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    /// Append an audit event. History is never reordered or pruned.
    pub fn record(&mut self, event: &str, details: Value) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            timestamp: now,
            event: event.to_string(),
            details,
        });
        self.updated_at = now;
    }

    pub fn update_must_ask(
        &mut self,
        key: &str,
        asked: bool,
        answered: bool,
        written_to: Option<String>,
    ) -> Result<&MustAsk> {
        if !MUST_ASK_KEYS.contains(&key) {
            return Err(InitError::UnknownMustAsk {
                key: key.to_string(),
                valid: MUST_ASK_KEYS.iter().map(|k| k.to_string()).collect(),
            });
        }
        let entry = self.stage_a.must_ask.entry(key.to_string()).or_default();
        entry.asked |= asked || answered;
        entry.answered |= answered;
        if written_to.is_some() {
            entry.written_to = written_to.clone();
        }
        let snapshot = entry.clone();
        self.record(
            "must_ask_updated",
            serde_json::json!({
                "key": key,
                "asked": snapshot.asked,
                "answered": snapshot.answered,
                "writtenTo": snapshot.written_to,
            }),
        );
        Ok(&self.stage_a.must_ask[key])
    }

    /// Record the outcome of a Stage-A document check. Returns false (and
    /// changes nothing) when stage A is already approved.
    pub fn record_docs_check(&mut self, docs_written: BTreeMap<String, bool>, ok: bool) -> bool {
        if self.stage_a.user_approved {
            return false;
        }
        self.stage_a.docs_written = docs_written;
        self.stage_a.validated = ok;
        self.record("stage_a_docs_checked", serde_json::json!({ "ok": ok }));
        true
    }

    /// Record a blueprint validation outcome while stage B is unapproved.
    pub fn record_blueprint_validation(&mut self, ok: bool, blueprint: &str) -> bool {
        if self.stage_b.user_approved {
            return false;
        }
        self.stage_b.drafted = true;
        self.stage_b.validated = ok;
        self.record(
            "blueprint_validated",
            serde_json::json!({ "ok": ok, "blueprint": blueprint }),
        );
        true
    }

    pub fn record_packs_reviewed(&mut self, packs: &[String]) -> bool {
        if self.stage_b.user_approved {
            return false;
        }
        self.stage_b.packs_reviewed = true;
        self.record("packs_reviewed", serde_json::json!({ "packs": packs }));
        true
    }

    /// Merge `apply` progress into `stage-c`. Flags only ever turn on, and the
    /// state (including history) is left untouched when nothing changes, so a
    /// repeated `apply` leaves the document identical. Returns whether the
    /// state changed.
    pub fn merge_stage_c(&mut self, progress: StageCProgress) -> bool {
        let before = self.stage_c.clone();
        let c = &mut self.stage_c;
        c.scaffold_applied |= progress.scaffold_applied;
        c.configs_generated |= progress.configs_generated;
        c.manifest_updated |= progress.manifest_updated;
        c.wrappers_synced |= progress.wrappers_synced;
        if self.stage_c == before {
            return false;
        }
        self.record("stage_c_applied", serde_json::to_value(progress).unwrap_or_default());
        true
    }

    // ---------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------

    pub fn last_event(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    pub fn counters(&self) -> Vec<StageCounters> {
        let a = &self.stage_a;
        let answered = a.must_ask.values().filter(|m| m.answered).count();
        let docs = a.docs_written.values().filter(|w| **w).count();
        let b = &self.stage_b;
        let c = &self.stage_c;
        vec![
            StageCounters {
                stage: Stage::A,
                done: answered + docs,
                total: a.must_ask.len() + crate::docs::REQUIRED_DOCS.len(),
                validated: a.validated,
                user_approved: a.user_approved,
            },
            StageCounters {
                stage: Stage::B,
                done: [b.drafted, b.validated, b.packs_reviewed]
                    .iter()
                    .filter(|f| **f)
                    .count(),
                total: 3,
                validated: b.validated,
                user_approved: b.user_approved,
            },
            StageCounters {
                stage: Stage::C,
                done: [
                    c.scaffold_applied,
                    c.configs_generated,
                    c.manifest_updated,
                    c.wrappers_synced,
                ]
                .iter()
                .filter(|f| **f)
                .count(),
                total: 4,
                validated: c.wrappers_synced,
                user_approved: c.user_approved,
            },
        ]
    }
}

impl Default for InitState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
