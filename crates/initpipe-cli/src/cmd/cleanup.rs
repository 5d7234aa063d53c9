use crate::cmd::lock_if_started;
use crate::output::{print_actions, print_json, print_messages};
use anyhow::Context;
use initpipe_core::cleanup::{self, CleanupOptions};
use initpipe_core::config::PipelineConfig;
use initpipe_core::state::InitState;
use std::path::Path;

pub fn run(root: &Path, opts: CleanupOptions, json: bool) -> anyhow::Result<()> {
    if !opts.acknowledged {
        anyhow::bail!("refused: cleanup-init removes the init/ kit; pass --i-understand to confirm");
    }
    let cfg = PipelineConfig::load(root).context("failed to load pipeline config")?;
    let _lock = if opts.apply { lock_if_started(root)? } else { None };
    let state = InitState::load_optional(root).context("failed to load init state")?;

    let report = cleanup::cleanup(root, &cfg, state.as_ref(), opts)?;

    if json {
        print_json(&report)?;
    } else {
        if !report.archive.is_empty() {
            println!("Archive:");
            print_actions(&report.archive);
        }
        print_actions(&report.remove);
        print_messages(&report.errors, &report.warnings);
        if report.dry_run {
            println!("\nDry run. Rerun with --apply to remove init/.");
        }
    }

    if !report.ok {
        anyhow::bail!("cleanup-init failed with {} error(s)", report.errors.len());
    }
    Ok(())
}
