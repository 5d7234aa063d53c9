//! Project runtime state at `.ai/project/state.json`.
//!
//! Distinct from [`crate::state::InitState`]: this file records which features
//! are installed and outlives the `init/` kit. Keys this tool does not own are
//! kept as-is on rewrite.

use crate::action::{Step, WritePolicy};
use crate::error::Result;
use crate::paths;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl ProjectState {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::project_state_path(root);
        let doc = match crate::io::read_json_optional::<Value>(&path)? {
            Some(Value::Object(map)) => map,
            Some(_) => {
                tracing::warn!(path = %path.display(), "project state is not an object; starting fresh");
                Map::new()
            }
            None => Map::new(),
        };
        let mut state = Self { path, doc };
        state.normalize();
        Ok(state)
    }

    fn normalize(&mut self) {
        self.doc
            .entry("version")
            .or_insert_with(|| Value::from(1));
        let features = self
            .doc
            .entry("features")
            .or_insert_with(|| Value::Object(Map::new()));
        if !features.is_object() {
            *features = Value::Object(Map::new());
        }
    }

    pub fn features(&self) -> BTreeMap<String, bool> {
        self.doc
            .get("features")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.features().get(key).copied().unwrap_or(false)
    }

    pub fn set_feature(&mut self, key: &str, enabled: bool) {
        if let Some(Value::Object(features)) = self.doc.get_mut("features") {
            features.insert(key.to_string(), Value::Bool(enabled));
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::io::to_json_bytes(&self.doc)
    }

    /// A write-if-changed step persisting the current document.
    pub fn write_step(&self) -> Result<Step> {
        Ok(Step::WriteFile {
            path: self.path.clone(),
            contents: self.to_bytes()?,
            policy: WritePolicy::IfChanged,
        })
    }
}
