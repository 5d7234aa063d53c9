#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

fn initpipe(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("initpipe").unwrap();
    cmd.current_dir(dir.path())
        .env("INITPIPE_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write(path: &Path, data: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

fn scenario_blueprint() -> Value {
    json!({
        "version": 1,
        "project": {"name": "Order Service", "description": "Takes orders"},
        "repo": {"layout": "single", "language": "typescript", "packageManager": "pnpm"},
        "capabilities": {"backend": {"enabled": true}, "database": {"enabled": true}},
        "features": {"database": true},
        "db": {"enabled": true, "ssot": "database"},
        "skills": {"packs": ["workflow", "backend", "data"]}
    })
}

fn write_blueprint(dir: &TempDir, doc: &Value) {
    write(
        &dir.path().join("init/project-blueprint.json"),
        &serde_json::to_string_pretty(doc).unwrap(),
    );
}

fn write_docs(dir: &TempDir) {
    let docs = dir.path().join("init/stage-a-docs");
    write(
        &docs.join("requirements.md"),
        "# Requirements\n\n## Goal\nTake orders.\n\n## Users\nShoppers.\n\n## Must requirements\n- Checkout\n\n## Out of scope\n- Refunds\n",
    );
    write(
        &docs.join("non-functional-requirements.md"),
        "# Non-functional Requirements\n\n## Performance\np99 < 200ms\n\n## Security\nAuth required.\n\n## Availability\n99.9%\n",
    );
    write(
        &docs.join("domain-glossary.md"),
        "# Domain Glossary\n\n## Terms\n- Order: a purchase.\n",
    );
    write(
        &docs.join("risk-open-questions.md"),
        "# Risks and Open Questions\n\n## Risks\n- Payment provider outage.\n\n## Open questions\n- None yet.\n",
    );
}

/// Fixture repo: docs, blueprint, database feature templates, and a
/// wrapper-sync command that always succeeds.
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_docs(&dir);
    write_blueprint(&dir, &scenario_blueprint());
    write(
        &dir.path().join(".ai/features/database/templates/db/README.md"),
        "# Database\n",
    );
    write(
        &dir.path().join("init/pipeline.yaml"),
        "sync_command: [\"true\"]\n",
    );
    dir
}

/// Drive the pipeline to stage C.
fn reach_stage_c(dir: &TempDir) {
    initpipe(dir).arg("start").assert().success();
    initpipe(dir).arg("check-docs").assert().success();
    initpipe(dir).args(["approve", "--stage", "A"]).assert().success();
    initpipe(dir).arg("validate").assert().success();
    initpipe(dir).arg("review-packs").assert().success();
    initpipe(dir).args(["approve", "--stage", "B"]).assert().success();
}

fn status_json(dir: &TempDir) -> Value {
    let out = initpipe(dir)
        .args(["--format", "json", "status"])
        .output()
        .unwrap();
    assert!(out.status.success());
    serde_json::from_slice(&out.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// start / status
// ---------------------------------------------------------------------------

#[test]
fn start_creates_state() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir)
        .arg("start")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created init/.init-state.json"));

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("init/.init-state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["stage"], "A");
    assert_eq!(state["history"][0]["event"], "init_started");
    assert_eq!(state["stage-a"]["mustAsk"]["onePurpose"]["asked"], false);
    assert!(!dir.path().join("init/.init-state.lock").exists());
}

#[test]
fn start_is_idempotent() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir).arg("start").assert().success();
    let before = std::fs::read(dir.path().join("init/.init-state.json")).unwrap();
    initpipe(&dir)
        .arg("start")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    let after = std::fs::read(dir.path().join("init/.init-state.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn status_before_start_fails() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not started"));
}

#[test]
fn mutating_commands_before_start_leave_no_init_dir() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir)
        .args(["approve", "--stage", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not started"));
    initpipe(&dir)
        .args(["must-ask", "--key", "onePurpose", "--asked"])
        .assert()
        .failure();
    initpipe(&dir).arg("advance").assert().failure();
    initpipe(&dir).arg("apply").assert().failure();
    assert!(!dir.path().join("init").exists());
}

#[test]
fn status_reports_counters() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir).arg("start").assert().success();
    let status = status_json(&dir);
    assert_eq!(status["stage"], "A");
    assert_eq!(status["stages"][0]["total"], 11);
    assert_eq!(status["readiness"]["ready"], false);
}

// ---------------------------------------------------------------------------
// must-ask
// ---------------------------------------------------------------------------

#[test]
fn must_ask_updates_checklist() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir).arg("start").assert().success();
    initpipe(&dir)
        .args([
            "must-ask",
            "--key",
            "onePurpose",
            "--answered",
            "--written-to",
            "init/stage-a-docs/requirements.md",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("asked=true answered=true"));

    initpipe(&dir)
        .args(["must-ask", "--key", "favouriteColour", "--asked"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown must-ask key"));
}

// ---------------------------------------------------------------------------
// stage gate
// ---------------------------------------------------------------------------

#[test]
fn approve_before_validation_is_refused() {
    let dir = TempDir::new().unwrap();
    initpipe(&dir).arg("start").assert().success();
    initpipe(&dir)
        .args(["approve", "--stage", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stage-a.validated"));
    assert_eq!(status_json(&dir)["stage"], "A");
}

#[test]
fn approve_non_current_stage_is_refused() {
    let dir = fixture();
    initpipe(&dir).arg("start").assert().success();
    initpipe(&dir).arg("check-docs").assert().success();
    initpipe(&dir)
        .args(["approve", "--stage", "B"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("current stage is A"));
}

#[test]
fn advance_reports_readiness_without_moving() {
    let dir = fixture();
    initpipe(&dir).arg("start").assert().success();
    initpipe(&dir)
        .arg("advance")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not ready"));

    initpipe(&dir).arg("check-docs").assert().success();
    initpipe(&dir)
        .arg("advance")
        .assert()
        .success()
        .stdout(predicate::str::contains("ready for approval"));
    assert_eq!(status_json(&dir)["stage"], "A");
}

#[test]
fn full_flow_reaches_complete() {
    let dir = fixture();
    reach_stage_c(&dir);
    initpipe(&dir).arg("apply").assert().success();
    initpipe(&dir).args(["approve", "--stage", "C"]).assert().success();

    let status = status_json(&dir);
    assert_eq!(status["stage"], "complete");

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("init/.init-state.json")).unwrap(),
    )
    .unwrap();
    let events: Vec<&str> = state["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["event"].as_str().unwrap())
        .collect();
    assert_eq!(
        events,
        [
            "init_started",
            "stage_a_docs_checked",
            "stage_approved",
            "blueprint_validated",
            "packs_reviewed",
            "stage_approved",
            "stage_c_applied",
            "stage_approved"
        ]
    );
}

// ---------------------------------------------------------------------------
// check-docs
// ---------------------------------------------------------------------------

#[test]
fn check_docs_fails_on_missing_heading() {
    let dir = fixture();
    write(
        &dir.path().join("init/stage-a-docs/domain-glossary.md"),
        "# Domain Glossary\n",
    );
    initpipe(&dir)
        .arg("check-docs")
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing heading '## Terms'"));
}

#[test]
fn check_docs_strict_promotes_warnings() {
    let dir = fixture();
    write(
        &dir.path().join("init/stage-a-docs/domain-glossary.md"),
        "# Domain Glossary\n\n## Terms\n- Order: TBD\n",
    );
    initpipe(&dir).arg("check-docs").assert().success();
    initpipe(&dir)
        .args(["check-docs", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("(strict)"));
}

// ---------------------------------------------------------------------------
// validate / suggestions
// ---------------------------------------------------------------------------

#[test]
fn validate_scenario_blueprint_passes() {
    let dir = fixture();
    initpipe(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn validate_reports_ssot_biconditional() {
    let dir = fixture();
    let mut doc = scenario_blueprint();
    doc["features"]["database"] = json!(false);
    write_blueprint(&dir, &doc);

    let out = initpipe(&dir)
        .args(["--format", "json", "validate"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["report"]["ok"], false);
    assert!(v["report"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e.as_str().unwrap().contains("db.ssot/features.database")));
}

#[test]
fn validate_other_blueprint_is_not_recorded() {
    let dir = fixture();
    initpipe(&dir).arg("start").assert().success();
    write(
        &dir.path().join("drafts/other.json"),
        &serde_json::to_string_pretty(&scenario_blueprint()).unwrap(),
    );
    initpipe(&dir)
        .args(["validate", "--blueprint", "drafts/other.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not recorded"));

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("init/.init-state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["stage-b"]["validated"], false);
    assert_eq!(state["history"].as_array().unwrap().len(), 1);
}

#[test]
fn validate_rejects_addons() {
    let dir = fixture();
    let mut doc = scenario_blueprint();
    doc["addons"] = json!(["database"]);
    write_blueprint(&dir, &doc);
    initpipe(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("addons"));
}

#[test]
fn suggest_features_write_only_adds() {
    let dir = fixture();
    let mut doc = scenario_blueprint();
    doc["features"] = json!({"database": true, "contextAwareness": false});
    doc["custom"] = json!({"keep": "me"});
    write_blueprint(&dir, &doc);

    initpipe(&dir)
        .arg("suggest-features")
        .assert()
        .success()
        .stdout(predicate::str::contains("Would add to features: environment"));

    initpipe(&dir)
        .args(["suggest-features", "--write"])
        .assert()
        .success();

    let written: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("init/project-blueprint.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        written["features"],
        json!({"database": true, "contextAwareness": false, "environment": true})
    );
    assert_eq!(written["custom"], json!({"keep": "me"}));
}

#[test]
fn suggest_packs_write_appends() {
    let dir = fixture();
    let mut doc = scenario_blueprint();
    doc["skills"]["packs"] = json!(["ops"]);
    write_blueprint(&dir, &doc);
    initpipe(&dir)
        .args(["suggest-packs", "--write"])
        .assert()
        .success();
    let written: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("init/project-blueprint.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        written["skills"]["packs"],
        json!(["ops", "workflow", "backend", "data"])
    );
}

// ---------------------------------------------------------------------------
// scaffold / apply
// ---------------------------------------------------------------------------

#[test]
fn scaffold_without_apply_writes_nothing() {
    let dir = fixture();
    initpipe(&dir)
        .arg("scaffold")
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] mkdir src"));
    assert!(!dir.path().join("src").exists());
}

#[test]
fn scaffold_apply_requires_stage_c() {
    let dir = fixture();
    initpipe(&dir).arg("start").assert().success();
    initpipe(&dir)
        .args(["scaffold", "--apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires stage C"));
    assert!(!dir.path().join("src").exists());
}

#[test]
fn apply_before_stage_c_is_refused() {
    let dir = fixture();
    initpipe(&dir).arg("start").assert().success();
    initpipe(&dir)
        .arg("apply")
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires stage C"));
}

#[test]
fn apply_installs_database_and_excludes_sync_from_repo() {
    let dir = fixture();
    reach_stage_c(&dir);
    initpipe(&dir)
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("[applied] mkdir src"))
        .stdout(predicate::str::contains("Feature database (install)"));

    assert!(dir.path().join("db/README.md").exists());
    assert!(dir.path().join("package.json").exists());
    assert!(dir.path().join("tsconfig.json").exists());

    let project: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(".ai/project/state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(project["features"]["database"], true);

    let manifest: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(".ai/skills/_meta/sync-manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["excludeSkills"], json!(["sync-from-repo"]));

    let status = status_json(&dir);
    assert_eq!(status["stages"][2]["done"], 4);
}

#[test]
fn second_apply_is_idempotent() {
    let dir = fixture();
    reach_stage_c(&dir);
    initpipe(&dir).arg("apply").assert().success();
    let state_before = std::fs::read(dir.path().join("init/.init-state.json")).unwrap();

    let out = initpipe(&dir)
        .args(["--format", "json", "apply"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["stateUpdated"], false);

    let mut file_actions: Vec<&Value> = Vec::new();
    for key in ["scaffold", "configs", "manifest"] {
        file_actions.extend(report[key].as_array().unwrap());
    }
    for f in report["features"].as_array().unwrap() {
        file_actions.extend(f["actions"].as_array().unwrap());
    }
    assert!(!file_actions.is_empty());
    assert!(file_actions.iter().all(|a| a["mode"] == "skipped"));

    let state_after = std::fs::read(dir.path().join("init/.init-state.json")).unwrap();
    assert_eq!(state_before, state_after);
}

#[test]
fn apply_dry_run_writes_nothing() {
    let dir = fixture();
    reach_stage_c(&dir);
    let state_before = std::fs::read(dir.path().join("init/.init-state.json")).unwrap();
    initpipe(&dir)
        .args(["apply", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] mkdir src"))
        .stdout(predicate::str::contains("[dry-run] run true sync --scope current --providers both"));

    assert!(!dir.path().join("src").exists());
    assert!(!dir.path().join("db").exists());
    assert!(!dir.path().join(".ai/skills").exists());
    let state_after = std::fs::read(dir.path().join("init/.init-state.json")).unwrap();
    assert_eq!(state_before, state_after);
}

#[test]
fn apply_fails_fast_on_missing_feature_templates() {
    let dir = fixture();
    let mut doc = scenario_blueprint();
    doc["features"]["release"] = json!(true);
    write_blueprint(&dir, &doc);
    reach_stage_c(&dir);
    initpipe(&dir)
        .arg("apply")
        .assert()
        .failure()
        .stdout(predicate::str::contains(".ai/features/release/templates"));
    assert!(!dir.path().join(".ai/skills/_meta/sync-manifest.json").exists());

    initpipe(&dir)
        .args(["apply", "--non-blocking-features"])
        .assert()
        .failure();
    assert!(dir.path().join(".ai/skills/_meta/sync-manifest.json").exists());

    // The sync ran, but a failed run must not make stage C approvable.
    initpipe(&dir)
        .args(["approve", "--stage", "C"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrappersSynced"));
    assert_eq!(status_json(&dir)["stage"], "C");
}

// ---------------------------------------------------------------------------
// lock / cleanup
// ---------------------------------------------------------------------------

#[test]
fn held_lock_blocks_mutations() {
    let dir = fixture();
    initpipe(&dir).arg("start").assert().success();
    write(
        &dir.path().join("init/.init-state.lock"),
        "pid=4242 since=2026-01-01T00:00:00Z\n",
    );
    initpipe(&dir)
        .args(["must-ask", "--key", "userRoles", "--asked"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pid=4242"));
    // Read-only commands still work.
    initpipe(&dir).arg("status").assert().success();
}

#[test]
fn cleanup_requires_acknowledgement() {
    let dir = fixture();
    initpipe(&dir)
        .args(["cleanup-init", "--apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--i-understand"));
    assert!(dir.path().join("init").exists());
}

#[test]
fn cleanup_archives_and_removes_init() {
    let dir = fixture();
    reach_stage_c(&dir);
    initpipe(&dir).arg("apply").assert().success();
    initpipe(&dir).args(["approve", "--stage", "C"]).assert().success();

    initpipe(&dir)
        .args(["cleanup-init", "--i-understand", "--archive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] remove init"));
    assert!(dir.path().join("init").exists());

    initpipe(&dir)
        .args(["cleanup-init", "--apply", "--i-understand", "--archive"])
        .assert()
        .success();
    assert!(!dir.path().join("init").exists());
    assert!(dir
        .path()
        .join("docs/project/stage-a-docs/requirements.md")
        .exists());
    assert!(dir.path().join("docs/project/project-blueprint.json").exists());
}

#[test]
fn cleanup_refuses_archive_inside_init() {
    let dir = fixture();
    write(
        &dir.path().join("init/pipeline.yaml"),
        "sync_command: [\"true\"]\narchive_dir: ./init/archive\n",
    );
    initpipe(&dir)
        .args(["cleanup-init", "--apply", "--i-understand", "--archive"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("inside init/"));
    assert!(dir
        .path()
        .join("init/stage-a-docs/requirements.md")
        .exists());
    assert!(dir.path().join("init/project-blueprint.json").exists());
}
