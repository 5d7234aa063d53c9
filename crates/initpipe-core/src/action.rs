//! Action primitives.
//!
//! Every file-system or process effect is planned as a [`Step`]. A step's
//! [`Step::decide`] is the only place that decides whether it would write or
//! skip, and it is called identically in dry-run and apply mode; the
//! [`Executor`] then either reports the decision (`dry-run`) or carries it out
//! (`applied` / `failed`). A dry-run plan is therefore an exact preview.

use crate::error::Result;
use crate::process::{self, CommandSpec};
use crate::types::{ActionMode, ActionOp};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Action (result)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub op: ActionOp,
    pub path: String,
    pub mode: ActionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Action {
    pub fn is_failed(&self) -> bool {
        self.mode == ActionMode::Failed
    }
}

// ---------------------------------------------------------------------------
// Step (plan)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write only when the destination does not exist.
    IfMissing,
    /// Write when the destination is absent or its bytes differ.
    IfChanged,
}

#[derive(Debug, Clone)]
pub enum Step {
    EnsureDir {
        path: PathBuf,
    },
    WriteFile {
        path: PathBuf,
        contents: Vec<u8>,
        policy: WritePolicy,
    },
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        overwrite: bool,
    },
    RemoveTree {
        path: PathBuf,
    },
    Run(CommandSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip(String),
}

impl Step {
    pub fn op(&self) -> ActionOp {
        match self {
            Step::EnsureDir { .. } => ActionOp::Mkdir,
            Step::WriteFile { .. } => ActionOp::Write,
            Step::CopyFile { .. } => ActionOp::Copy,
            Step::RemoveTree { .. } => ActionOp::Remove,
            Step::Run(_) => ActionOp::Run,
        }
    }

    /// The path (or command line) reported for this step, relative to `root`.
    pub fn label(&self, root: &Path) -> String {
        let rel = |p: &Path| crate::paths::display_rel(root, p);
        match self {
            Step::EnsureDir { path } | Step::RemoveTree { path } => rel(path),
            Step::WriteFile { path, .. } => rel(path),
            Step::CopyFile { to, .. } => rel(to),
            Step::Run(spec) => spec.display(),
        }
    }

    /// Decide whether the step would change anything. Pure apart from reading
    /// the destination.
    pub fn decide(&self) -> Result<Decision> {
        Ok(match self {
            Step::EnsureDir { path } => {
                if path.is_dir() {
                    Decision::Skip("exists".to_string())
                } else {
                    Decision::Proceed
                }
            }
            Step::WriteFile {
                path,
                contents,
                policy,
            } => {
                if !path.exists() {
                    Decision::Proceed
                } else {
                    match policy {
                        WritePolicy::IfMissing => Decision::Skip("exists".to_string()),
                        WritePolicy::IfChanged => {
                            if std::fs::read(path)? == *contents {
                                Decision::Skip("unchanged".to_string())
                            } else {
                                Decision::Proceed
                            }
                        }
                    }
                }
            }
            Step::CopyFile { to, overwrite, .. } => {
                if to.exists() && !overwrite {
                    Decision::Skip("exists".to_string())
                } else {
                    Decision::Proceed
                }
            }
            Step::RemoveTree { path } => {
                if path.exists() {
                    Decision::Proceed
                } else {
                    Decision::Skip("absent".to_string())
                }
            }
            Step::Run(_) => Decision::Proceed,
        })
    }

    fn perform(&self) -> std::result::Result<Option<String>, String> {
        match self {
            Step::EnsureDir { path } => crate::io::ensure_dir(path)
                .map(|_| None)
                .map_err(|e| e.to_string()),
            Step::WriteFile { path, contents, .. } => crate::io::atomic_write(path, contents)
                .map(|_| None)
                .map_err(|e| e.to_string()),
            Step::CopyFile { from, to, .. } => {
                if let Some(parent) = to.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::copy(from, to)
                    .map(|_| None)
                    .map_err(|e| format!("copy from {}: {e}", from.display()))
            }
            Step::RemoveTree { path } => {
                let res = if path.is_dir() {
                    std::fs::remove_dir_all(path)
                } else {
                    std::fs::remove_file(path)
                };
                res.map(|_| None).map_err(|e| e.to_string())
            }
            Step::Run(spec) => match process::run(spec) {
                Ok(out) if out.success => Ok(None),
                Ok(out) => Err(out.failure_summary()),
                Err(e) => Err(e.to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Planners
// ---------------------------------------------------------------------------

/// Plan a copy of every file under `src` into `dst`, in sorted order.
pub fn plan_copy_tree(src: &Path, dst: &Path, overwrite: bool) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        steps.push(Step::CopyFile {
            from: entry.path().to_path_buf(),
            to: dst.join(rel),
            overwrite,
        });
    }
    Ok(steps)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    DryRun,
    Apply,
}

#[derive(Debug, Clone)]
pub struct Executor {
    root: PathBuf,
    mode: ExecMode,
}

impl Executor {
    pub fn new(root: &Path, mode: ExecMode) -> Self {
        Self {
            root: root.to_path_buf(),
            mode,
        }
    }

    pub fn dry_run(root: &Path) -> Self {
        Self::new(root, ExecMode::DryRun)
    }

    pub fn apply(root: &Path) -> Self {
        Self::new(root, ExecMode::Apply)
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecMode::DryRun
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn execute(&self, step: &Step) -> Action {
        let op = step.op();
        let path = step.label(&self.root);
        let action = |mode, reason: Option<String>| Action {
            op,
            path: path.clone(),
            mode,
            reason,
        };

        match step.decide() {
            Err(e) => action(ActionMode::Failed, Some(e.to_string())),
            Ok(Decision::Skip(reason)) => action(ActionMode::Skipped, Some(reason)),
            Ok(Decision::Proceed) => match self.mode {
                ExecMode::DryRun => action(ActionMode::DryRun, None),
                ExecMode::Apply => match step.perform() {
                    Ok(reason) => {
                        tracing::debug!(op = %op, path = %path, "applied");
                        action(ActionMode::Applied, reason)
                    }
                    Err(reason) => {
                        tracing::warn!(op = %op, path = %path, %reason, "action failed");
                        action(ActionMode::Failed, Some(reason))
                    }
                },
            },
        }
    }

    pub fn execute_all(&self, steps: &[Step]) -> Vec<Action> {
        steps.iter().map(|s| self.execute(s)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, data: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn dry_run_and_apply_share_decisions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(&root.join("keep.txt"), "user edit");
        let steps = vec![
            Step::EnsureDir { path: root.join("src") },
            Step::WriteFile {
                path: root.join("keep.txt"),
                contents: b"template".to_vec(),
                policy: WritePolicy::IfMissing,
            },
            Step::WriteFile {
                path: root.join("new.txt"),
                contents: b"template".to_vec(),
                policy: WritePolicy::IfMissing,
            },
        ];

        let plan = Executor::dry_run(root).execute_all(&steps);
        let modes: Vec<_> = plan.iter().map(|a| a.mode).collect();
        assert_eq!(
            modes,
            [ActionMode::DryRun, ActionMode::Skipped, ActionMode::DryRun]
        );
        assert!(!root.join("src").exists());
        assert!(!root.join("new.txt").exists());

        let applied = Executor::apply(root).execute_all(&steps);
        let modes: Vec<_> = applied.iter().map(|a| a.mode).collect();
        assert_eq!(
            modes,
            [ActionMode::Applied, ActionMode::Skipped, ActionMode::Applied]
        );
        assert_eq!(std::fs::read_to_string(root.join("keep.txt")).unwrap(), "user edit");
        assert_eq!(applied[2].path, "new.txt");
    }

    #[test]
    fn second_apply_skips_everything() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let steps = vec![
            Step::EnsureDir { path: root.join("docs") },
            Step::WriteFile {
                path: root.join("state.json"),
                contents: b"{}".to_vec(),
                policy: WritePolicy::IfChanged,
            },
        ];
        let exec = Executor::apply(root);
        exec.execute_all(&steps);
        let again = exec.execute_all(&steps);
        assert!(again.iter().all(|a| a.mode == ActionMode::Skipped));
    }

    #[test]
    fn if_changed_rewrites_different_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        write(&path, "old");
        let step = Step::WriteFile {
            path: path.clone(),
            contents: b"new".to_vec(),
            policy: WritePolicy::IfChanged,
        };
        assert_eq!(step.decide().unwrap(), Decision::Proceed);
        Executor::apply(dir.path()).execute(&step);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn copy_tree_respects_overwrite() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("tpl");
        let dst = dir.path().join("repo");
        write(&src.join("a.md"), "A");
        write(&src.join("nested/b.md"), "B");
        write(&dst.join("a.md"), "user A");

        let steps = plan_copy_tree(&src, &dst, false).unwrap();
        assert_eq!(steps.len(), 2);
        let actions = Executor::apply(dir.path()).execute_all(&steps);
        assert_eq!(actions[0].mode, ActionMode::Skipped);
        assert_eq!(actions[1].mode, ActionMode::Applied);
        assert_eq!(std::fs::read_to_string(dst.join("a.md")).unwrap(), "user A");
        assert_eq!(std::fs::read_to_string(dst.join("nested/b.md")).unwrap(), "B");

        let forced = plan_copy_tree(&src, &dst, true).unwrap();
        Executor::apply(dir.path()).execute_all(&forced);
        assert_eq!(std::fs::read_to_string(dst.join("a.md")).unwrap(), "A");
    }

    #[test]
    fn remove_tree_absent_is_skipped() {
        let dir = TempDir::new().unwrap();
        let step = Step::RemoveTree {
            path: dir.path().join("init"),
        };
        let a = Executor::apply(dir.path()).execute(&step);
        assert_eq!(a.mode, ActionMode::Skipped);
        assert_eq!(a.reason.as_deref(), Some("absent"));
    }

    #[test]
    fn failed_copy_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let step = Step::CopyFile {
            from: dir.path().join("missing.txt"),
            to: dir.path().join("out.txt"),
            overwrite: false,
        };
        let a = Executor::apply(dir.path()).execute(&step);
        assert!(a.is_failed());
        assert!(a.reason.unwrap().contains("missing.txt"));
    }
}
