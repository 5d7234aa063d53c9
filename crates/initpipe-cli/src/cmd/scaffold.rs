use crate::cmd::{load_state, lock, save_state};
use crate::output::{print_actions, print_json, print_messages};
use anyhow::Context;
use initpipe_core::action::Executor;
use initpipe_core::blueprint::{self, Blueprint};
use initpipe_core::pipeline::{blueprint_path, require_stage_c};
use initpipe_core::scaffold;
use initpipe_core::state::StageCProgress;
use initpipe_core::validate;
use std::path::Path;

pub fn run(root: &Path, explicit: Option<&Path>, apply: bool, json: bool) -> anyhow::Result<()> {
    let path = blueprint_path(root, explicit);
    let doc = blueprint::load_document(&path).context("failed to load blueprint")?;
    let report = validate::validate(&doc);
    if !report.ok {
        print_messages(&report.errors, &[]);
        anyhow::bail!("blueprint is invalid; run 'initpipe validate'");
    }
    let bp = Blueprint::from_value(&doc)?;
    let steps = scaffold::plan(root, &bp);

    let (actions, recorded) = if apply {
        let _lock = lock(root)?;
        let mut state = load_state(root)?;
        require_stage_c(&state, "scaffold --apply")?;
        let actions = Executor::apply(root).execute_all(&steps);
        let failed = actions.iter().any(|a| a.is_failed());
        let recorded = !failed
            && state.merge_stage_c(StageCProgress {
                scaffold_applied: true,
                ..Default::default()
            });
        if recorded {
            save_state(root, &state)?;
        }
        (actions, recorded)
    } else {
        (Executor::dry_run(root).execute_all(&steps), false)
    };

    if json {
        print_json(&serde_json::json!({
            "dryRun": !apply,
            "actions": actions,
            "recorded": recorded,
        }))?;
    } else {
        print_actions(&actions);
        if !apply {
            println!("\nDry run. Rerun with --apply to create the directories.");
        }
    }

    let failed = actions.iter().filter(|a| a.is_failed()).count();
    if failed > 0 {
        anyhow::bail!("scaffold failed: {failed} action(s) failed");
    }
    Ok(())
}
