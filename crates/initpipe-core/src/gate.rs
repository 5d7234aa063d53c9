//! Stage gate: the A → B → C → complete checkpoint machine.
//!
//! A stage advances only through [`approve`], and only when the stage's
//! structural-validation flag is already set. Approval is recorded as its own
//! boolean and never inferred from validation.

use crate::error::{InitError, Result};
use crate::state::InitState;
use crate::types::Stage;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub stage: Stage,
    pub ready: bool,
    /// Blocking prerequisites that are not met.
    pub missing: Vec<String>,
    /// Non-blocking reminders shown alongside the readiness verdict.
    pub advisories: Vec<String>,
}

/// Whether the validation flag guarding `stage`'s approval is set.
pub fn is_validated(state: &InitState, stage: Stage) -> bool {
    match stage {
        Stage::A => state.stage_a.validated,
        Stage::B => state.stage_b.validated,
        Stage::C => state.stage_c.wrappers_synced,
        Stage::Complete => false,
    }
}

pub fn readiness(state: &InitState) -> Readiness {
    let stage = state.stage;
    let mut missing = Vec::new();
    let mut advisories = Vec::new();

    match stage {
        Stage::A => {
            if !state.stage_a.validated {
                missing.push(
                    "stage-a.validated is false: run 'initpipe check-docs' until it passes"
                        .to_string(),
                );
            }
            let unanswered: Vec<&str> = state
                .stage_a
                .must_ask
                .iter()
                .filter(|(_, m)| !m.answered)
                .map(|(k, _)| k.as_str())
                .collect();
            if !unanswered.is_empty() {
                advisories.push(format!("must-ask not answered: {}", unanswered.join(", ")));
            }
        }
        Stage::B => {
            if !state.stage_b.validated {
                missing.push(
                    "stage-b.validated is false: run 'initpipe validate' until it passes"
                        .to_string(),
                );
            }
            if !state.stage_b.packs_reviewed {
                advisories.push("skill packs not reviewed: run 'initpipe review-packs'".to_string());
            }
        }
        Stage::C => {
            if !state.stage_c.wrappers_synced {
                missing.push(
                    "stage-c.wrappersSynced is false: run 'initpipe apply' until wrapper sync succeeds"
                        .to_string(),
                );
            }
        }
        Stage::Complete => {
            missing.push("the pipeline is already complete".to_string());
        }
    }

    Readiness {
        stage,
        ready: missing.is_empty(),
        missing,
        advisories,
    }
}

/// Check the current stage and record an `advance_requested` event when it is
/// ready for approval. Never changes `stage`.
pub fn advance(state: &mut InitState) -> Result<Readiness> {
    let r = readiness(state);
    if !r.ready {
        return Err(InitError::NotReady {
            stage: r.stage.to_string(),
            missing: r.missing,
        });
    }
    state.record(
        "advance_requested",
        serde_json::json!({ "stage": r.stage.as_str() }),
    );
    Ok(r)
}

/// Record explicit approval of `requested` and move to the next stage.
/// Returns the new current stage.
pub fn approve(state: &mut InitState, requested: Stage, note: Option<&str>) -> Result<Stage> {
    let current = state.stage;
    if current == Stage::Complete {
        return Err(InitError::ApprovalRefused {
            requested: requested.to_string(),
            reason: "the pipeline is already complete".to_string(),
        });
    }
    if requested != current {
        return Err(InitError::ApprovalRefused {
            requested: requested.to_string(),
            reason: format!("current stage is {current}"),
        });
    }
    if !is_validated(state, current) {
        let r = readiness(state);
        return Err(InitError::ApprovalRefused {
            requested: requested.to_string(),
            reason: r.missing.join("; "),
        });
    }

    let next = match current.next() {
        Some(n) => n,
        None => {
            return Err(InitError::ApprovalRefused {
                requested: requested.to_string(),
                reason: "no stage follows".to_string(),
            })
        }
    };

    match current {
        Stage::A => state.stage_a.user_approved = true,
        Stage::B => state.stage_b.user_approved = true,
        Stage::C => state.stage_c.user_approved = true,
        Stage::Complete => {}
    }
    state.stage = next;
    state.record(
        "stage_approved",
        serde_json::json!({
            "stage": current.as_str(),
            "next": next.as_str(),
            "note": note,
        }),
    );
    Ok(next)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
