use crate::cmd::{load_state, lock_if_started, save_state};
use crate::output::{print_json, print_messages};
use anyhow::Context;
use initpipe_core::config::PipelineConfig;
use initpipe_core::docs;
use initpipe_core::paths;
use std::path::Path;

pub fn run(root: &Path, docs_root: Option<&Path>, strict: bool, json: bool) -> anyhow::Result<()> {
    let cfg = PipelineConfig::load(root).context("failed to load pipeline config")?;
    let docs_root = match docs_root {
        Some(p) => paths::resolve(root, p),
        None => cfg.docs_root_path(root),
    };
    let report = docs::check_docs(&docs_root, strict)
        .with_context(|| format!("failed to read docs under {}", docs_root.display()))?;

    let lock = lock_if_started(root)?;
    let recorded = if lock.is_some() {
        let mut state = load_state(root)?;
        let recorded = state.record_docs_check(report.docs_written.clone(), report.ok);
        if recorded {
            save_state(root, &state)?;
        }
        recorded
    } else {
        false
    };

    if json {
        print_json(&serde_json::json!({
            "report": report,
            "recorded": recorded,
        }))?;
    } else {
        for (file, present) in &report.docs_written {
            println!("{} {}", if *present { "present" } else { "missing" }, file);
        }
        print_messages(&report.errors, &report.warnings);
        if report.ok {
            println!("Stage-A docs OK.");
        }
        if lock.is_some() && !recorded {
            println!("Stage A is already approved; result not recorded.");
        }
    }

    if !report.ok {
        anyhow::bail!(
            "stage-a docs check failed with {} error(s)",
            report.errors.len()
        );
    }
    Ok(())
}
