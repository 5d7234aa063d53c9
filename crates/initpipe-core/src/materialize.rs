//! Feature materialization.
//!
//! Installing a feature copies its template tree into the repository, marks it
//! enabled in the project runtime state, and optionally runs its control
//! script (`init`, then `verify`). Every effect goes through the caller's
//! [`Executor`], so the same code path produces the dry-run preview.

use crate::action::{plan_copy_tree, Action, Executor, Step};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::FeatureSpec;
use crate::paths;
use crate::process::CommandSpec;
use crate::project_state::ProjectState;
use crate::types::{ActionMode, InstallMode};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// Overwrite files that already exist.
    pub force: bool,
    /// Run the control script's `init` and `verify`.
    pub verify: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResult {
    pub feature_id: String,
    pub feature_key: String,
    pub install: InstallMode,
    pub actions: Vec<Action>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub verify_failed: bool,
}

impl FeatureResult {
    fn new(feature: &FeatureSpec, install: InstallMode) -> Self {
        Self {
            feature_id: feature.id.to_string(),
            feature_key: feature.key.to_string(),
            install,
            actions: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            verify_failed: false,
        }
    }

    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A feature's control script and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlScript {
    pub program: String,
    pub script: PathBuf,
}

/// Find `ctl.mjs` (run with `node_binary`) or `ctl.sh` (run with `sh`).
pub fn control_script(root: &Path, feature_id: &str, cfg: &PipelineConfig) -> Option<ControlScript> {
    let dir = paths::feature_dir(root, feature_id);
    let mjs = dir.join(paths::FEATURE_CTL_MJS);
    if mjs.is_file() {
        return Some(ControlScript {
            program: cfg.node_binary.clone(),
            script: mjs,
        });
    }
    let sh = dir.join(paths::FEATURE_CTL_SH);
    if sh.is_file() {
        return Some(ControlScript {
            program: "sh".to_string(),
            script: sh,
        });
    }
    None
}

pub fn ensure_feature(
    exec: &Executor,
    cfg: &PipelineConfig,
    feature: &FeatureSpec,
    opts: MaterializeOptions,
) -> Result<FeatureResult> {
    let root = exec.root();
    let install = if opts.force {
        InstallMode::Reinstall
    } else {
        InstallMode::Install
    };
    let mut result = FeatureResult::new(feature, install);

    // 1. Template source
    let templates = paths::feature_templates_dir(root, feature.id);
    if !templates.is_dir() {
        result.errors.push(format!(
            "feature '{}': templates not found at {}",
            feature.key,
            paths::display_rel(root, &templates)
        ));
        return Ok(result);
    }

    // 2. Copy template tree into the repository root
    let copies = plan_copy_tree(&templates, root, opts.force)?;
    let copied = exec.execute_all(&copies);
    for a in copied.iter().filter(|a| a.is_failed()) {
        result.errors.push(format!(
            "feature '{}': copy {} failed: {}",
            feature.key,
            a.path,
            a.reason.as_deref().unwrap_or("unknown error")
        ));
    }
    result.actions.extend(copied);
    if !result.ok() {
        return Ok(result);
    }

    // 3. Mark enabled in project state
    let mut state = ProjectState::load(root)?;
    state.set_feature(feature.key, true);
    let marked = exec.execute(&state.write_step()?);
    if marked.is_failed() {
        result.errors.push(format!(
            "feature '{}': could not update project state: {}",
            feature.key,
            marked.reason.as_deref().unwrap_or("unknown error")
        ));
    }
    result.actions.push(marked);
    if !result.ok() || !opts.verify {
        return Ok(result);
    }

    // 4. Control routine
    let Some(ctl) = control_script(root, feature.id, cfg) else {
        result.warnings.push(format!(
            "feature '{}': no control script; verify skipped",
            feature.key
        ));
        return Ok(result);
    };
    for subcommand in ["init", "verify"] {
        let spec = CommandSpec::with_repo_root(
            ctl.program.clone(),
            &[ctl.script.display().to_string()],
            subcommand,
            root,
        );
        let action = exec.execute(&Step::Run(spec));
        let failed = action.mode == ActionMode::Failed;
        if failed {
            result.verify_failed = true;
            result.errors.push(format!(
                "feature '{}': control script '{}' failed: {}",
                feature.key,
                subcommand,
                action.reason.as_deref().unwrap_or("unknown error")
            ));
        }
        result.actions.push(action);
        if failed {
            break;
        }
    }

    tracing::info!(
        feature = feature.key,
        install = %result.install,
        ok = result.ok(),
        "feature materialized"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features;
    use tempfile::TempDir;

    fn write(path: &Path, data: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn database() -> &'static FeatureSpec {
        features::by_key("database").unwrap()
    }

    fn seed_templates(root: &Path) {
        write(
            &root.join(".ai/features/database/templates/db/schema.prisma"),
            "// schema\n",
        );
        write(
            &root.join(".ai/features/database/templates/docs/database.md"),
            "# Database\n",
        );
    }

    #[test]
    fn missing_templates_is_blocking() {
        let dir = TempDir::new().unwrap();
        let exec = Executor::apply(dir.path());
        let r = ensure_feature(&exec, &PipelineConfig::default(), database(), Default::default())
            .unwrap();
        assert!(!r.ok());
        assert!(r.errors[0].contains(".ai/features/database/templates"));
        assert!(r.actions.is_empty());
    }

    #[test]
    fn install_copies_and_marks_enabled() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let exec = Executor::apply(dir.path());
        let r = ensure_feature(&exec, &PipelineConfig::default(), database(), Default::default())
            .unwrap();
        assert!(r.ok(), "{:?}", r.errors);
        assert_eq!(r.install, InstallMode::Install);
        assert!(dir.path().join("db/schema.prisma").exists());
        assert!(ProjectState::load(dir.path()).unwrap().is_enabled("database"));

        let again = ensure_feature(&exec, &PipelineConfig::default(), database(), Default::default())
            .unwrap();
        assert!(again.actions.iter().all(|a| a.mode == ActionMode::Skipped));
    }

    #[test]
    fn force_reinstalls_over_edits() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        write(&dir.path().join("docs/database.md"), "edited\n");
        let exec = Executor::apply(dir.path());
        let opts = MaterializeOptions {
            force: true,
            verify: false,
        };
        let r = ensure_feature(&exec, &PipelineConfig::default(), database(), opts).unwrap();
        assert_eq!(r.install, InstallMode::Reinstall);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs/database.md")).unwrap(),
            "# Database\n"
        );
    }

    #[test]
    fn dry_run_writes_nothing_and_runs_nothing() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        write(
            &dir.path().join(".ai/features/database/ctl.sh"),
            "touch ran-ctl\n",
        );
        let exec = Executor::dry_run(dir.path());
        let opts = MaterializeOptions {
            force: false,
            verify: true,
        };
        let r = ensure_feature(&exec, &PipelineConfig::default(), database(), opts).unwrap();
        assert!(r.ok());
        assert!(r.actions.iter().all(|a| a.mode == ActionMode::DryRun));
        assert!(!dir.path().join("db").exists());
        assert!(!dir.path().join("ran-ctl").exists());
        assert!(!paths::project_state_path(dir.path()).exists());
    }

    #[test]
    fn verify_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        write(
            &dir.path().join(".ai/features/database/ctl.sh"),
            "if [ \"$1\" = verify ]; then echo 'schema drift' >&2; exit 1; fi\n",
        );
        let exec = Executor::apply(dir.path());
        let opts = MaterializeOptions {
            force: false,
            verify: true,
        };
        let r = ensure_feature(&exec, &PipelineConfig::default(), database(), opts).unwrap();
        assert!(r.verify_failed);
        assert!(r.errors[0].contains("'verify' failed"));
        assert!(r.errors[0].contains("schema drift"));
    }

    #[test]
    fn verify_without_control_script_warns() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let exec = Executor::apply(dir.path());
        let opts = MaterializeOptions {
            force: false,
            verify: true,
        };
        let r = ensure_feature(&exec, &PipelineConfig::default(), database(), opts).unwrap();
        assert!(r.ok());
        assert_eq!(r.warnings.len(), 1);
    }
}
