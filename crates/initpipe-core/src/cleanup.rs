//! Removal of the `init/` bootstrap kit once the project is set up.

use crate::action::{plan_copy_tree, Action, Executor, Step};
use crate::config::PipelineConfig;
use crate::error::{InitError, Result};
use crate::paths;
use crate::state::InitState;
use crate::types::Stage;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub apply: bool,
    pub acknowledged: bool,
    pub archive: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub ok: bool,
    pub dry_run: bool,
    pub archive: Vec<Action>,
    pub remove: Vec<Action>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Steps that copy the Stage-A docs and blueprint into the archive directory.
pub fn plan_archive(root: &Path, cfg: &PipelineConfig) -> Result<Vec<Step>> {
    if let Some(problem) = cfg.archive_dir_problem() {
        return Err(InitError::InvalidConfig(problem));
    }
    let archive = cfg.archive_path(root);
    let mut steps = Vec::new();

    let docs = cfg.docs_root_path(root);
    if docs.is_dir() {
        steps.extend(plan_copy_tree(&docs, &archive.join("stage-a-docs"), false)?);
    }
    let bp = paths::default_blueprint_path(root);
    if bp.is_file() {
        steps.push(Step::CopyFile {
            from: bp,
            to: archive.join("project-blueprint.json"),
            overwrite: false,
        });
    }
    Ok(steps)
}

pub fn cleanup(
    root: &Path,
    cfg: &PipelineConfig,
    state: Option<&InitState>,
    opts: CleanupOptions,
) -> Result<CleanupReport> {
    if !opts.acknowledged {
        return Err(InitError::Refused(
            "cleanup-init removes the init/ kit; pass --i-understand to confirm".to_string(),
        ));
    }

    let exec = if opts.apply {
        Executor::apply(root)
    } else {
        Executor::dry_run(root)
    };
    let mut report = CleanupReport {
        dry_run: !opts.apply,
        ..Default::default()
    };

    match state.map(|s| s.stage) {
        Some(Stage::Complete) => {}
        Some(stage) => report.warnings.push(format!(
            "pipeline is at stage {stage}, not complete; removing init/ discards its progress"
        )),
        None => report
            .warnings
            .push("no init state found; the pipeline was never started".to_string()),
    }
    if !opts.archive {
        report
            .warnings
            .push("stage-a docs and blueprint are not archived (use --archive)".to_string());
    }

    if opts.archive {
        let steps = match plan_archive(root, cfg) {
            Ok(steps) => steps,
            Err(e) => {
                report.errors.push(e.to_string());
                return Ok(report);
            }
        };
        report.archive = exec.execute_all(&steps);
        for a in report.archive.iter().filter(|a| a.is_failed()) {
            report.errors.push(format!(
                "archive {} failed: {}",
                a.path,
                a.reason.as_deref().unwrap_or("unknown error")
            ));
        }
        if !report.errors.is_empty() {
            // Keep init/ when the archive is incomplete.
            return Ok(report);
        }
    }

    report.remove = vec![exec.execute(&Step::RemoveTree {
        path: paths::init_dir(root),
    })];
    if let Some(a) = report.remove.iter().find(|a| a.is_failed()) {
        report.errors.push(format!(
            "remove {} failed: {}",
            a.path,
            a.reason.as_deref().unwrap_or("unknown error")
        ));
    }
    report.ok = report.errors.is_empty();
    tracing::info!(ok = report.ok, dry_run = report.dry_run, "cleanup-init finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionMode;
    use tempfile::TempDir;

    fn seed(root: &Path) {
        std::fs::create_dir_all(root.join("init/stage-a-docs")).unwrap();
        std::fs::write(root.join("init/stage-a-docs/requirements.md"), "# Requirements\n").unwrap();
        std::fs::write(root.join("init/project-blueprint.json"), "{}\n").unwrap();
    }

    #[test]
    fn refuses_without_acknowledgement() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let err = cleanup(dir.path(), &PipelineConfig::default(), None, Default::default())
            .unwrap_err();
        assert!(matches!(err, InitError::Refused(_)));
        assert!(dir.path().join("init").exists());
    }

    #[test]
    fn dry_run_keeps_init() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let opts = CleanupOptions {
            acknowledged: true,
            archive: true,
            apply: false,
        };
        let r = cleanup(dir.path(), &PipelineConfig::default(), None, opts).unwrap();
        assert!(r.ok);
        assert!(r.dry_run);
        assert_eq!(r.archive.len(), 2);
        assert_eq!(r.remove[0].mode, ActionMode::DryRun);
        assert!(dir.path().join("init").exists());
        assert!(!dir.path().join("docs/project").exists());
    }

    #[test]
    fn archive_then_remove() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let mut st = InitState::new();
        st.stage = Stage::Complete;
        let opts = CleanupOptions {
            acknowledged: true,
            archive: true,
            apply: true,
        };
        let r = cleanup(dir.path(), &PipelineConfig::default(), Some(&st), opts).unwrap();
        assert!(r.ok, "{:?}", r.errors);
        assert!(r.warnings.is_empty());
        assert!(!dir.path().join("init").exists());
        assert!(dir
            .path()
            .join("docs/project/stage-a-docs/requirements.md")
            .exists());
        assert!(dir.path().join("docs/project/project-blueprint.json").exists());
    }

    #[test]
    fn incomplete_stage_warns() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let st = InitState::new();
        let opts = CleanupOptions {
            acknowledged: true,
            archive: true,
            apply: false,
        };
        let r = cleanup(dir.path(), &PipelineConfig::default(), Some(&st), opts).unwrap();
        assert!(r.warnings[0].contains("stage A"));
    }

    #[test]
    fn archive_inside_init_keeps_init() {
        for archive_dir in ["init/archive", "./init/archive"] {
            let dir = TempDir::new().unwrap();
            seed(dir.path());
            let cfg = PipelineConfig {
                archive_dir: archive_dir.to_string(),
                ..Default::default()
            };
            let opts = CleanupOptions {
                acknowledged: true,
                archive: true,
                apply: true,
            };
            let r = cleanup(dir.path(), &cfg, None, opts).unwrap();
            assert!(!r.ok, "{archive_dir} should be refused");
            assert!(r.errors[0].contains("inside init/"), "{:?}", r.errors);
            assert!(r.archive.is_empty());
            assert!(r.remove.is_empty());
            assert!(dir.path().join("init/stage-a-docs/requirements.md").exists());
            assert!(dir.path().join("init/project-blueprint.json").exists());
        }
    }

    #[test]
    fn escaping_archive_dir_keeps_init() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let cfg = PipelineConfig {
            archive_dir: "../elsewhere".to_string(),
            ..Default::default()
        };
        let opts = CleanupOptions {
            acknowledged: true,
            archive: true,
            apply: true,
        };
        let r = cleanup(dir.path(), &cfg, None, opts).unwrap();
        assert!(!r.ok);
        assert!(dir.path().join("init").exists());
    }
}
