use crate::cmd::{load_state, lock, save_state};
use crate::output::{print_action, print_actions, print_json, print_messages};
use anyhow::Context;
use initpipe_core::config::PipelineConfig;
use initpipe_core::io::StateLock;
use initpipe_core::pipeline::{self, ApplyOptions, ApplyReport};
use std::path::Path;

pub fn run(root: &Path, opts: ApplyOptions, json: bool) -> anyhow::Result<()> {
    let cfg = PipelineConfig::load(root).context("failed to load pipeline config")?;
    // A dry run never writes the state, so it does not contend for the lock.
    let _lock: Option<StateLock> = if opts.dry_run { None } else { Some(lock(root)?) };
    let mut state = load_state(root)?;

    let report = pipeline::apply(root, &cfg, &mut state, &opts)?;
    if report.state_updated {
        save_state(root, &state)?;
    }

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if !report.ok {
        anyhow::bail!("apply failed with {} error(s)", report.errors.len());
    }
    Ok(())
}

fn print_report(r: &ApplyReport) {
    if r.dry_run {
        println!("Dry run: nothing will be written.\n");
    }
    println!("Blueprint: {}", r.blueprint);

    if !r.scaffold.is_empty() {
        println!("\nScaffold:");
        print_actions(&r.scaffold);
    }
    if !r.configs.is_empty() {
        println!("\nConfig files:");
        print_actions(&r.configs);
    }
    for f in &r.features {
        println!("\nFeature {} ({}):", f.feature_id, f.install);
        print_actions(&f.actions);
    }
    if !r.manifest.is_empty() {
        println!("\nSkill manifest:");
        print_actions(&r.manifest);
        if !r.excluded_skills.is_empty() {
            println!("  excluded: {}", r.excluded_skills.join(", "));
        }
    }
    if let Some(sync) = &r.sync {
        println!("\nWrapper sync:");
        print_action(sync);
    }

    println!();
    print_messages(&r.errors, &r.warnings);
    if r.ok {
        if r.dry_run {
            println!("Plan OK. Rerun without --dry-run to apply.");
        } else {
            println!("Apply complete. Approve with: initpipe approve --stage C");
        }
    }
}
