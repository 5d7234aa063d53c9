use crate::cmd::{load_state, lock_if_started, save_state};
use crate::output::{print_json, print_messages};
use anyhow::Context;
use initpipe_core::blueprint::{self, Blueprint};
use initpipe_core::features;
use initpipe_core::packs;
use initpipe_core::paths;
use initpipe_core::pipeline::blueprint_path;
use initpipe_core::validate;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn load(root: &Path, explicit: Option<&Path>) -> anyhow::Result<(PathBuf, Value)> {
    let path = blueprint_path(root, explicit);
    let doc = blueprint::load_document(&path).context("failed to load blueprint")?;
    Ok((path, doc))
}

/// Typed view for the recommendation commands; they need a blueprint that
/// at least has the required sections.
fn typed(doc: &Value) -> anyhow::Result<Blueprint> {
    Blueprint::from_value(doc)
        .context("blueprint does not match the expected shape; run 'initpipe validate'")
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn validate(root: &Path, explicit: Option<&Path>, strict: bool, json: bool) -> anyhow::Result<()> {
    let (path, doc) = load(root, explicit)?;
    let rel = paths::display_rel(root, &path);
    let mut report = validate::validate(&doc);
    if strict {
        report = report.strict();
    }

    // Stage B tracks the blueprint `apply` reads; other files are checked only.
    let is_default = path == paths::default_blueprint_path(root);
    let lock = if is_default { lock_if_started(root)? } else { None };
    let recorded = match lock {
        Some(_lock) => {
            let mut state = load_state(root)?;
            let recorded = state.record_blueprint_validation(report.ok, &rel);
            if recorded {
                save_state(root, &state)?;
            }
            recorded
        }
        None => false,
    };

    if json {
        print_json(&serde_json::json!({
            "blueprint": rel,
            "report": report,
            "recorded": recorded,
        }))?;
    } else {
        print_messages(&report.errors, &report.warnings);
        if report.ok {
            println!("Blueprint {rel} is valid.");
            println!("Packs: {}", display_list(&report.normalized_packs));
        }
        if !is_default {
            println!(
                "Not recorded: stage B tracks {} only.",
                paths::DEFAULT_BLUEPRINT
            );
        }
    }

    if !report.ok {
        anyhow::bail!("blueprint validation failed with {} error(s)", report.errors.len());
    }
    Ok(())
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

// ---------------------------------------------------------------------------
// review-packs
// ---------------------------------------------------------------------------

pub fn review_packs(root: &Path, explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (path, doc) = load(root, explicit)?;
    let bp = typed(&doc)?;
    let unknown: Vec<&str> = bp
        .skills
        .packs
        .iter()
        .map(String::as_str)
        .filter(|p| packs::pack(p).is_none())
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!("unknown skill pack(s): {}", unknown.join(", "));
    }
    let normalized = packs::normalize(&bp.skills.packs);
    let recommended = packs::recommended_packs(&bp);
    let missing: Vec<&str> = recommended
        .iter()
        .copied()
        .filter(|r| !normalized.iter().any(|n| n == r))
        .collect();

    let lock = if path == paths::default_blueprint_path(root) {
        lock_if_started(root)?
    } else {
        None
    };
    let recorded = match lock {
        Some(_lock) => {
            let mut state = load_state(root)?;
            let recorded = state.record_packs_reviewed(&normalized);
            if recorded {
                save_state(root, &state)?;
            }
            recorded
        }
        None => false,
    };

    if json {
        let rows: Vec<Value> = normalized
            .iter()
            .filter_map(|n| packs::pack(n))
            .map(|p| serde_json::json!({ "pack": p.name, "prefix": p.prefix }))
            .collect();
        return print_json(&serde_json::json!({
            "packs": rows,
            "recommendedMissing": missing,
            "recorded": recorded,
        }));
    }
    if normalized.is_empty() {
        println!("No skill packs requested.");
    }
    for name in &normalized {
        if let Some(p) = packs::pack(name) {
            println!("{:<14} {}", p.name, p.prefix);
        }
    }
    if !missing.is_empty() {
        println!(
            "\nRecommended but not requested: {} (initpipe suggest-packs --write)",
            missing.join(", ")
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// suggest-features / suggest-packs
// ---------------------------------------------------------------------------

pub fn suggest_features(
    root: &Path,
    explicit: Option<&Path>,
    write: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (path, doc) = load(root, explicit)?;
    let bp = typed(&doc)?;
    let recommended = features::recommended_features(&bp);
    suggest(root, &path, &doc, &recommended, write, json, "features", |doc, recs| {
        features::merge_recommendations(doc, recs)
    })
}

pub fn suggest_packs(
    root: &Path,
    explicit: Option<&Path>,
    write: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (path, doc) = load(root, explicit)?;
    let bp = typed(&doc)?;
    let recommended = packs::recommended_packs(&bp);
    suggest(root, &path, &doc, &recommended, write, json, "skills.packs", |doc, recs| {
        packs::merge_pack_recommendations(doc, recs)
    })
}

#[allow(clippy::too_many_arguments)]
fn suggest(
    root: &Path,
    path: &Path,
    doc: &Value,
    recommended: &[&str],
    write: bool,
    json: bool,
    field: &str,
    merge: impl Fn(&mut Value, &[&str]) -> Vec<String>,
) -> anyhow::Result<()> {
    let mut merged = doc.clone();
    let added = merge(&mut merged, recommended);

    let written = if write && !added.is_empty() {
        let _lock = lock_if_started(root)?;
        blueprint::save_document(path, &merged).context("failed to write blueprint")?;
        true
    } else {
        false
    };

    if json {
        return print_json(&serde_json::json!({
            "recommended": recommended,
            "added": added,
            "written": written,
        }));
    }
    println!("Recommended {field}: {}", recommended.join(", "));
    if added.is_empty() {
        println!("Blueprint already lists every recommendation.");
    } else if written {
        println!("Added to {field}: {}", added.join(", "));
    } else {
        println!(
            "Would add to {field}: {} (rerun with --write)",
            added.join(", ")
        );
    }
    Ok(())
}
