//! The `apply` pipeline.
//!
//! validate blueprint -> (strict Stage-A docs) -> scaffold -> config files ->
//! features in declaration order -> skill manifest and DB sync exclusions ->
//! wrapper sync -> merge stage-c flags into InitState.
//!
//! Fail-fast: the first blocking error stops the sequence. Feature errors are
//! collected instead when `non_blocking_features` is set. There is no
//! rollback; flags reached before a failure are still recorded.

use crate::action::{Action, Executor, Step, WritePolicy};
use crate::blueprint::{self, Blueprint};
use crate::config::{PipelineConfig, WarnLevel};
use crate::docs::{self, DocsReport};
use crate::error::{InitError, Result};
use crate::features;
use crate::materialize::{self, FeatureResult, MaterializeOptions};
use crate::packs::{self, SkillManifest};
use crate::paths;
use crate::process::CommandSpec;
use crate::scaffold;
use crate::state::{InitState, StageCProgress};
use crate::templates;
use crate::types::Stage;
use crate::validate::{self, ValidationReport};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub blueprint: Option<PathBuf>,
    pub providers: Option<String>,
    pub force_features: bool,
    pub verify_features: bool,
    pub non_blocking_features: bool,
    pub require_stage_a: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub ok: bool,
    pub dry_run: bool,
    pub blueprint: String,
    pub validation: ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocsReport>,
    pub scaffold: Vec<Action>,
    pub configs: Vec<Action>,
    pub features: Vec<FeatureResult>,
    pub manifest: Vec<Action>,
    /// Skills excluded by the DB sync rule.
    pub excluded_skills: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<Action>,
    pub progress: StageCProgress,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Whether InitState changed and must be saved.
    pub state_updated: bool,
}

impl ApplyReport {
    /// Every action in execution order.
    pub fn all_actions(&self) -> impl Iterator<Item = &Action> {
        self.scaffold
            .iter()
            .chain(self.configs.iter())
            .chain(self.features.iter().flat_map(|f| f.actions.iter()))
            .chain(self.manifest.iter())
            .chain(self.sync.iter())
    }
}

/// Resolve `--blueprint` against the root, defaulting to `init/project-blueprint.json`.
pub fn blueprint_path(root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => paths::resolve(root, p),
        None => paths::default_blueprint_path(root),
    }
}

/// Refuse commands that need an approved blueprint.
pub fn require_stage_c(state: &InitState, command: &str) -> Result<()> {
    if matches!(state.stage, Stage::C | Stage::Complete) {
        Ok(())
    } else {
        Err(InitError::StageTooEarly {
            command: command.to_string(),
            current: state.stage.to_string(),
        })
    }
}

/// Run the pipeline. Mutates `state` in apply mode only; the caller saves it
/// when [`ApplyReport::state_updated`] is set.
pub fn apply(
    root: &Path,
    cfg: &PipelineConfig,
    state: &mut InitState,
    opts: &ApplyOptions,
) -> Result<ApplyReport> {
    require_stage_c(state, "apply")?;

    let exec = if opts.dry_run {
        Executor::dry_run(root)
    } else {
        Executor::apply(root)
    };
    let bp_path = blueprint_path(root, opts.blueprint.as_deref());
    let mut report = ApplyReport {
        dry_run: opts.dry_run,
        blueprint: paths::display_rel(root, &bp_path),
        ..Default::default()
    };

    run_sequence(&exec, cfg, &bp_path, opts, &mut report)?;

    report.ok = report.errors.is_empty();
    if !exec.is_dry_run() {
        report.state_updated = state.merge_stage_c(report.progress);
    }
    tracing::info!(
        ok = report.ok,
        dry_run = report.dry_run,
        state_updated = report.state_updated,
        "apply finished"
    );
    Ok(report)
}

fn run_sequence(
    exec: &Executor,
    cfg: &PipelineConfig,
    bp_path: &Path,
    opts: &ApplyOptions,
    report: &mut ApplyReport,
) -> Result<()> {
    let root = exec.root();

    for w in cfg.validate() {
        match w.level {
            WarnLevel::Error => report.errors.push(format!("pipeline config: {}", w.message)),
            WarnLevel::Warning => report.warnings.push(format!("pipeline config: {}", w.message)),
        }
    }
    if !report.errors.is_empty() {
        return Ok(());
    }

    // 1. Blueprint
    let doc = blueprint::load_document(bp_path)?;
    report.validation = validate::validate(&doc);
    report.warnings.extend(report.validation.warnings.iter().cloned());
    if !report.validation.ok {
        report.errors.extend(report.validation.errors.iter().cloned());
        return Ok(());
    }
    let bp = Blueprint::from_value(&doc)?;

    // 2. Stage-A docs (strict)
    if opts.require_stage_a {
        let docs_report = docs::check_docs(&cfg.docs_root_path(root), true)?;
        let ok = docs_report.ok;
        report
            .errors
            .extend(docs_report.errors.iter().map(|e| format!("stage-a docs: {e}")));
        report.docs = Some(docs_report);
        if !ok {
            return Ok(());
        }
    }

    // 3. Scaffold
    report.scaffold = exec.execute_all(&scaffold::plan(root, &bp));
    if collect_failures(&report.scaffold, "scaffold", &mut report.errors) {
        return Ok(());
    }
    report.progress.scaffold_applied = true;

    // 4. Config files
    report.configs = exec.execute_all(&templates::plan(root, &bp)?);
    if collect_failures(&report.configs, "config", &mut report.errors) {
        return Ok(());
    }
    report.progress.configs_generated = true;

    // 5. Features
    let mat_opts = MaterializeOptions {
        force: opts.force_features,
        verify: opts.verify_features,
    };
    for feature in features::enabled_features(&bp) {
        let result = materialize::ensure_feature(exec, cfg, feature, mat_opts)?;
        let failed = !result.ok();
        report.warnings.extend(result.warnings.iter().cloned());
        report.errors.extend(result.errors.iter().cloned());
        report.features.push(result);
        if failed && !opts.non_blocking_features {
            return Ok(());
        }
    }

    // 6. Skill manifest + DB sync exclusions
    let manifest_ok = update_manifest(exec, &bp, report)?;
    if !manifest_ok {
        return Ok(());
    }
    report.progress.manifest_updated = true;

    // 7. Wrapper sync
    let Some((program, prefix)) = cfg.sync_program() else {
        return Ok(());
    };
    let providers = opts.providers.as_deref().unwrap_or(&cfg.providers);
    let mut args = prefix.to_vec();
    args.extend(
        ["sync", "--scope", "current", "--providers", providers]
            .iter()
            .map(|s| s.to_string()),
    );
    let sync = exec.execute(&Step::Run(CommandSpec::new(program, args, root)));
    if sync.is_failed() {
        report.errors.push(format!(
            "wrapper sync failed: {}",
            sync.reason.as_deref().unwrap_or("unknown error")
        ));
    } else if report.errors.is_empty() {
        report.progress.wrappers_synced = true;
    } else {
        // Stage C must not become approvable after a run with feature errors.
        report.warnings.push(
            "wrapper sync ran, but stage-c.wrappersSynced stays false until apply finishes without errors"
                .to_string(),
        );
    }
    report.sync = Some(sync);
    Ok(())
}

fn update_manifest(exec: &Executor, bp: &Blueprint, report: &mut ApplyReport) -> Result<bool> {
    let root = exec.root();
    let mut manifest = SkillManifest::load(root)?;
    let normalized = packs::normalize(&bp.skills.packs);
    let changes = manifest.select_packs(&normalized);
    if !changes.added.is_empty() || !changes.removed.is_empty() {
        tracing::debug!(added = ?changes.added, removed = ?changes.removed, "skill prefixes changed");
    }
    let excluded = features::sync_exclusions(bp.db.ssot);
    manifest.apply_sync_exclusions(&excluded);
    report.excluded_skills = excluded.iter().map(|s| s.to_string()).collect();

    let step = Step::WriteFile {
        path: paths::skill_manifest_path(root),
        contents: manifest.to_bytes()?,
        policy: WritePolicy::IfChanged,
    };
    report.manifest = vec![exec.execute(&step)];
    Ok(!collect_failures(&report.manifest, "manifest", &mut report.errors))
}

/// Push one error per failed action. Returns true if any failed.
fn collect_failures(actions: &[Action], what: &str, errors: &mut Vec<String>) -> bool {
    let before = errors.len();
    for a in actions.iter().filter(|a| a.is_failed()) {
        errors.push(format!(
            "{what}: {} {} failed: {}",
            a.op,
            a.path,
            a.reason.as_deref().unwrap_or("unknown error")
        ));
    }
    errors.len() > before
}
