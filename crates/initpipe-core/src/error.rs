use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("init pipeline not started: run 'initpipe start'")]
    NotStarted,

    #[error("blueprint not found: {0}")]
    BlueprintNotFound(String),

    #[error("blueprint {path} is not valid JSON: {source}")]
    BlueprintParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("blueprint is invalid: {}", .0.join("; "))]
    InvalidBlueprint(Vec<String>),

    #[error("invalid stage: {0} (expected A, B or C)")]
    InvalidStage(String),

    #[error("cannot approve stage {requested}: {reason}")]
    ApprovalRefused { requested: String, reason: String },

    #[error("stage {stage} is not ready: {}", .missing.join("; "))]
    NotReady { stage: String, missing: Vec<String> },

    #[error("unknown must-ask key '{key}'; valid keys: {}", .valid.join(", "))]
    UnknownMustAsk { key: String, valid: Vec<String> },

    #[error("'{command}' requires stage C (current stage: {current}); approve stage B first")]
    StageTooEarly { command: String, current: String },

    #[error("refused: {0}")]
    Refused(String),

    #[error("another initpipe invocation holds the lock at {path} ({holder})")]
    Locked { path: String, holder: String },

    #[error("program not found: {0}")]
    ProgramNotFound(String),

    #[error("failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("path escapes the repository root: {0}")]
    PathEscapesRoot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::ser::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, InitError>;
