use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    A,
    B,
    C,
    #[serde(rename = "complete")]
    Complete,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[Stage::A, Stage::B, Stage::C, Stage::Complete]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Stage::all().get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::A => "A",
            Stage::B => "B",
            Stage::C => "C",
            Stage::Complete => "complete",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::A => "requirements",
            Stage::B => "blueprint",
            Stage::C => "scaffold",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::error::InitError;

    /// Parses an approvable stage. `complete` is a terminal state and is not
    /// accepted here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Stage::A),
            "B" | "b" => Ok(Stage::B),
            "C" | "c" => Ok(Stage::C),
            _ => Err(crate::error::InitError::InvalidStage(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionMode / ActionOp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionMode {
    Applied,
    DryRun,
    Skipped,
    Failed,
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionMode::Applied => "applied",
            ActionMode::DryRun => "dry-run",
            ActionMode::Skipped => "skipped",
            ActionMode::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOp {
    Mkdir,
    Write,
    Copy,
    Remove,
    Run,
}

impl fmt::Display for ActionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionOp::Mkdir => "mkdir",
            ActionOp::Write => "write",
            ActionOp::Copy => "copy",
            ActionOp::Remove => "remove",
            ActionOp::Run => "run",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// InstallMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    Install,
    Reinstall,
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallMode::Install => "install",
            InstallMode::Reinstall => "reinstall",
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_order_is_linear() {
        assert_eq!(Stage::A.next(), Some(Stage::B));
        assert_eq!(Stage::B.next(), Some(Stage::C));
        assert_eq!(Stage::C.next(), Some(Stage::Complete));
        assert_eq!(Stage::Complete.next(), None);
        assert!(Stage::A < Stage::B && Stage::C < Stage::Complete);
    }

    #[test]
    fn stage_serializes_as_letters() {
        assert_eq!(serde_json::to_string(&Stage::B).unwrap(), "\"B\"");
        assert_eq!(
            serde_json::to_string(&Stage::Complete).unwrap(),
            "\"complete\""
        );
        let s: Stage = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(s, Stage::Complete);
    }

    #[test]
    fn complete_is_not_approvable() {
        assert!(Stage::from_str("complete").is_err());
        assert!(Stage::from_str("D").is_err());
        assert_eq!(Stage::from_str("c").unwrap(), Stage::C);
    }

    #[test]
    fn action_mode_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ActionMode::DryRun).unwrap(),
            "\"dry-run\""
        );
    }
}
