use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Optional `init/pipeline.yaml`. Every key has a default, so a missing file
/// and an empty file are equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Provider selector handed to the wrapper-sync tool.
    #[serde(default = "default_providers")]
    pub providers: String,
    /// Program and leading arguments of the wrapper-sync tool.
    #[serde(default = "default_sync_command")]
    pub sync_command: Vec<String>,
    /// Interpreter for `ctl.mjs` control scripts.
    #[serde(default = "default_node_binary")]
    pub node_binary: String,
    #[serde(default = "default_docs_root")]
    pub docs_root: String,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
}

fn default_providers() -> String {
    "both".to_string()
}

fn default_sync_command() -> Vec<String> {
    vec!["node".to_string(), paths::DEFAULT_SYNC_SCRIPT.to_string()]
}

fn default_node_binary() -> String {
    "node".to_string()
}

fn default_docs_root() -> String {
    paths::DEFAULT_DOCS_ROOT.to_string()
}

fn default_archive_dir() -> String {
    paths::DEFAULT_ARCHIVE_DIR.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            sync_command: default_sync_command(),
            node_binary: default_node_binary(),
            docs_root: default_docs_root(),
            archive_dir: default_archive_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::pipeline_config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: PipelineConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn docs_root_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, Path::new(&self.docs_root))
    }

    pub fn archive_path(&self, root: &Path) -> PathBuf {
        root.join(&self.archive_dir)
    }

    /// Split `sync_command` into program and leading arguments.
    pub fn sync_program(&self) -> Option<(&str, &[String])> {
        self.sync_command
            .split_first()
            .map(|(program, rest)| (program.as_str(), rest))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        match self.sync_program() {
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "sync_command is empty; wrapper sync cannot run".to_string(),
            }),
            Some((program, _)) if program.trim().is_empty() => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "sync_command has an empty program name".to_string(),
            }),
            Some(_) => {}
        }

        if self.providers.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "providers is empty".to_string(),
            });
        }

        if self.node_binary.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "node_binary is empty; ctl.mjs control scripts will fail".to_string(),
            });
        }

        if let Some(message) = self.archive_dir_problem() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            });
        }

        warnings
    }

    /// Why `archive_dir` cannot receive the archive, if it cannot. It must be
    /// a relative path inside the repository and outside `init/`, which
    /// cleanup-init removes right after archiving.
    pub fn archive_dir_problem(&self) -> Option<String> {
        if paths::ensure_relative_inside(&self.archive_dir).is_err() {
            return Some(format!(
                "archive_dir '{}' must be a relative path inside the repository",
                self.archive_dir
            ));
        }
        if paths::is_under_init(&self.archive_dir) {
            return Some(format!(
                "archive_dir '{}' is inside {}/, which cleanup-init removes",
                self.archive_dir,
                paths::INIT_DIR
            ));
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
