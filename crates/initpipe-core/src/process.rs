//! Blocking invocation of external collaborators: feature control scripts and
//! the wrapper-sync tool.
//!
//! Commands run one at a time in the repository root; the caller waits for
//! each to exit. A non-zero exit is a failure of that step.
//!
//! Control scripts receive `--repo-root <root>`. Older scripts reject the
//! flag; when a run fails and its output shows the flag was not understood,
//! the command is retried once without it.

use crate::error::{InitError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Output kept from a subprocess, tail-first.
const MAX_OUTPUT: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Arguments to retry with when the first run rejects a flag.
    pub fallback_args: Option<Vec<String>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.to_path_buf(),
            fallback_args: None,
        }
    }

    /// `<program> [prefix...] <subcommand> --repo-root <root>`, retrying
    /// without `--repo-root` if the script rejects it.
    pub fn with_repo_root(
        program: impl Into<String>,
        prefix: &[String],
        subcommand: &str,
        root: &Path,
    ) -> Self {
        let mut base: Vec<String> = prefix.to_vec();
        base.push(subcommand.to_string());
        let mut args = base.clone();
        args.push("--repo-root".to_string());
        args.push(root.display().to_string());
        Self {
            program: program.into(),
            args,
            cwd: root.to_path_buf(),
            fallback_args: Some(base),
        }
    }

    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub output: String,
    /// True when the run used the fallback arguments.
    pub retried_without_flag: bool,
}

impl ProcessOutput {
    pub fn failure_summary(&self) -> String {
        let code = self
            .code
            .map(|c| format!("exit code {c}"))
            .unwrap_or_else(|| "terminated by signal".to_string());
        if self.output.is_empty() {
            code
        } else {
            let last = self.output.lines().last().unwrap_or_default();
            format!("{code}: {last}")
        }
    }
}

/// Locate `program` on PATH, or accept it as a path that exists.
pub fn resolve_program(program: &str, cwd: &Path) -> Result<PathBuf> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 {
        let p = crate::paths::resolve(cwd, as_path);
        if p.exists() {
            return Ok(p);
        }
        return Err(InitError::ProgramNotFound(program.to_string()));
    }
    which::which(program).map_err(|_| InitError::ProgramNotFound(program.to_string()))
}

/// Run `spec` to completion, applying the flag-rejection fallback.
pub fn run(spec: &CommandSpec) -> Result<ProcessOutput> {
    let first = run_once(&spec.program, &spec.args, &spec.cwd)?;
    if first.success {
        return Ok(first);
    }
    if let Some(fallback) = &spec.fallback_args {
        if flag_rejected(&first.output) {
            tracing::info!(
                command = %spec.display(),
                "control script rejected --repo-root; retrying without it"
            );
            let mut retry = run_once(&spec.program, fallback, &spec.cwd)?;
            retry.retried_without_flag = true;
            return Ok(retry);
        }
    }
    Ok(first)
}

fn run_once(program: &str, args: &[String], cwd: &Path) -> Result<ProcessOutput> {
    let resolved = resolve_program(program, cwd)?;
    tracing::debug!(program = %resolved.display(), ?args, "spawning");

    let output = Command::new(&resolved)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| InitError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(ProcessOutput {
        success: output.status.success(),
        code: output.status.code(),
        output: combine_output(&stdout, &stderr),
        retried_without_flag: false,
    })
}

/// Whether a failed run's output indicates `--repo-root` was not understood.
fn flag_rejected(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("repo-root")
        && ["unknown", "unrecognized", "unexpected", "invalid", "not allowed"]
            .iter()
            .any(|w| lower.contains(w))
}

/// Combine stdout/stderr and cap to 10KB (keeping the tail).
fn combine_output(stdout: &str, stderr: &str) -> String {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    let trimmed = output.trim();
    if trimmed.len() > MAX_OUTPUT {
        let mut start = trimmed.len() - MAX_OUTPUT;
        while !trimmed.is_char_boundary(start) {
            start += 1;
        }
        trimmed[start..].to_string()
    } else {
        trimmed.to_string()
    }
}
