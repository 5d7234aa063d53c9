use crate::error::{InitError, Result};
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const INIT_DIR: &str = "init";
pub const INIT_STATE_FILE: &str = "init/.init-state.json";
pub const INIT_LOCK_FILE: &str = "init/.init-state.lock";
pub const PIPELINE_CONFIG_FILE: &str = "init/pipeline.yaml";
pub const DEFAULT_BLUEPRINT: &str = "init/project-blueprint.json";
pub const DEFAULT_DOCS_ROOT: &str = "init/stage-a-docs";
pub const DEFAULT_ARCHIVE_DIR: &str = "docs/project";

pub const AI_DIR: &str = ".ai";
pub const FEATURES_DIR: &str = ".ai/features";
pub const PROJECT_STATE_FILE: &str = ".ai/project/state.json";
pub const SKILL_MANIFEST_FILE: &str = ".ai/skills/_meta/sync-manifest.json";
pub const DEFAULT_SYNC_SCRIPT: &str = ".ai/scripts/sync-skills.mjs";

pub const FEATURE_TEMPLATES_DIR: &str = "templates";
pub const FEATURE_CTL_MJS: &str = "ctl.mjs";
pub const FEATURE_CTL_SH: &str = "ctl.sh";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn init_dir(root: &Path) -> PathBuf {
    root.join(INIT_DIR)
}

pub fn init_state_path(root: &Path) -> PathBuf {
    root.join(INIT_STATE_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(INIT_LOCK_FILE)
}

pub fn pipeline_config_path(root: &Path) -> PathBuf {
    root.join(PIPELINE_CONFIG_FILE)
}

pub fn default_blueprint_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_BLUEPRINT)
}

pub fn feature_dir(root: &Path, feature_id: &str) -> PathBuf {
    root.join(FEATURES_DIR).join(feature_id)
}

pub fn feature_templates_dir(root: &Path, feature_id: &str) -> PathBuf {
    feature_dir(root, feature_id).join(FEATURE_TEMPLATES_DIR)
}

pub fn project_state_path(root: &Path) -> PathBuf {
    root.join(PROJECT_STATE_FILE)
}

pub fn skill_manifest_path(root: &Path) -> PathBuf {
    root.join(SKILL_MANIFEST_FILE)
}

/// Resolve a user-supplied path against the repository root.
/// Absolute paths are returned unchanged.
pub fn resolve(root: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Render `path` relative to `root` for display, falling back to the full path.
pub fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Reject relative paths that climb out of the root (`..`) or are absolute.
pub fn ensure_relative_inside(rel: &str) -> Result<()> {
    let p = Path::new(rel);
    let escapes = p.is_absolute()
        || p.components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(InitError::PathEscapesRoot(rel.to_string()));
    }
    Ok(())
}

/// True when `rel` names `init/` or something beneath it, ignoring `.`
/// components (`./init/archive` counts).
pub fn is_under_init(rel: &str) -> bool {
    Path::new(rel)
        .components()
        .find(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str() == INIT_DIR)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
