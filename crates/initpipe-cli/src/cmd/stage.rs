use crate::cmd::{load_state, lock, lock_for_start, save_state};
use crate::output::{print_json, print_table};
use anyhow::Context;
use initpipe_core::gate::{self, Readiness};
use initpipe_core::paths;
use initpipe_core::state::InitState;
use initpipe_core::types::Stage;
use std::path::Path;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

pub fn start(root: &Path, json: bool) -> anyhow::Result<()> {
    let _lock = lock_for_start(root)?;
    let created = if InitState::exists(root) {
        false
    } else {
        let mut state = InitState::new();
        state.record("init_started", serde_json::json!({}));
        save_state(root, &state)?;
        true
    };
    let state = load_state(root)?;

    if json {
        return print_json(&serde_json::json!({
            "created": created,
            "stage": state.stage,
            "path": paths::INIT_STATE_FILE,
        }));
    }
    if created {
        println!("Created {}", paths::INIT_STATE_FILE);
        println!("Stage A: answer the must-ask questions and write the Stage-A docs.");
    } else {
        println!(
            "Init state already exists (stage {}); nothing to do.",
            state.stage
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

pub fn status(root: &Path, json: bool) -> anyhow::Result<()> {
    let state = load_state(root)?;
    let counters = state.counters();
    let readiness = gate::readiness(&state);

    if json {
        return print_json(&serde_json::json!({
            "stage": state.stage,
            "createdAt": state.created_at,
            "updatedAt": state.updated_at,
            "stages": counters,
            "readiness": readiness,
            "lastEvent": state.last_event(),
        }));
    }

    println!("Stage: {} ({})", state.stage, state.stage.title());
    println!();
    let rows: Vec<Vec<String>> = counters
        .iter()
        .map(|c| {
            vec![
                c.stage.to_string(),
                format!("{}/{}", c.done, c.total),
                yes_no(c.validated).to_string(),
                yes_no(c.user_approved).to_string(),
            ]
        })
        .collect();
    print_table(&["STAGE", "DONE", "VALIDATED", "APPROVED"], rows);
    println!();
    print_readiness(&readiness);
    if let Some(last) = state.last_event() {
        println!("\nLast event: {} at {}", last.event, last.timestamp.to_rfc3339());
    }
    Ok(())
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn print_readiness(r: &Readiness) {
    if r.stage == Stage::Complete {
        println!("Pipeline complete.");
        return;
    }
    if r.ready {
        println!(
            "Stage {} is ready for approval: initpipe approve --stage {}",
            r.stage, r.stage
        );
    } else {
        println!("Stage {} is not ready:", r.stage);
        for m in &r.missing {
            println!("  - {m}");
        }
    }
    for a in &r.advisories {
        println!("  note: {a}");
    }
}

// ---------------------------------------------------------------------------
// advance
// ---------------------------------------------------------------------------

pub fn advance(root: &Path, json: bool) -> anyhow::Result<()> {
    let _lock = lock(root)?;
    let mut state = load_state(root)?;
    let before = gate::readiness(&state);

    let result = gate::advance(&mut state);
    if result.is_ok() {
        save_state(root, &state)?;
    }
    if json {
        print_json(&before)?;
    } else {
        print_readiness(&before);
    }
    result.map(|_| ()).map_err(Into::into)
}

// ---------------------------------------------------------------------------
// approve
// ---------------------------------------------------------------------------

pub fn approve(root: &Path, stage: &str, note: Option<&str>, json: bool) -> anyhow::Result<()> {
    let requested = Stage::from_str(stage)?;
    let _lock = lock(root)?;
    let mut state = load_state(root)?;

    let next = gate::approve(&mut state, requested, note)
        .with_context(|| format!("approval of stage {requested} refused"))?;
    save_state(root, &state)?;

    if json {
        return print_json(&serde_json::json!({
            "approved": requested,
            "stage": next,
        }));
    }
    println!("Stage {requested} approved. Current stage: {next}");
    Ok(())
}

// ---------------------------------------------------------------------------
// must-ask
// ---------------------------------------------------------------------------

pub fn must_ask(
    root: &Path,
    key: &str,
    asked: bool,
    answered: bool,
    written_to: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let _lock = lock(root)?;
    let mut state = load_state(root)?;
    let entry = state
        .update_must_ask(key, asked, answered, written_to)?
        .clone();
    save_state(root, &state)?;

    if json {
        return print_json(&serde_json::json!({ "key": key, "mustAsk": entry }));
    }
    println!(
        "{key}: asked={} answered={}{}",
        entry.asked,
        entry.answered,
        entry
            .written_to
            .as_deref()
            .map(|p| format!(" writtenTo={p}"))
            .unwrap_or_default()
    );
    Ok(())
}
