//! Structural check of the Stage-A documents.
//!
//! Each required document must exist and carry its fixed headings. Leftover
//! template placeholders are errors; `TBD`/`TODO` markers and empty required
//! sections are warnings that `--strict` turns into failures.

use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocSpec {
    pub file: &'static str,
    pub headings: &'static [&'static str],
}

pub const REQUIRED_DOCS: &[DocSpec] = &[
    DocSpec {
        file: "requirements.md",
        headings: &[
            "# Requirements",
            "## Goal",
            "## Users",
            "## Must requirements",
            "## Out of scope",
        ],
    },
    DocSpec {
        file: "non-functional-requirements.md",
        headings: &[
            "# Non-functional Requirements",
            "## Performance",
            "## Security",
            "## Availability",
        ],
    },
    DocSpec {
        file: "domain-glossary.md",
        headings: &["# Domain Glossary", "## Terms"],
    },
    DocSpec {
        file: "risk-open-questions.md",
        headings: &["# Risks and Open Questions", "## Risks", "## Open questions"],
    },
];

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
static MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{[^}]*\}\}|<!--\s*FILL\b").unwrap())
}

fn marker_re() -> &'static Regex {
    MARKER_RE.get_or_init(|| Regex::new(r"\b(TBD|TODO)\b").unwrap())
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocsReport {
    pub ok: bool,
    pub docs_root: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Per required file: present on disk.
    pub docs_written: BTreeMap<String, bool>,
}

/// Check every required document under `docs_root`.
pub fn check_docs(docs_root: &Path, strict: bool) -> Result<DocsReport> {
    let mut report = DocsReport {
        docs_root: docs_root.display().to_string(),
        ..Default::default()
    };

    for spec in REQUIRED_DOCS {
        let path = docs_root.join(spec.file);
        if !path.is_file() {
            report.docs_written.insert(spec.file.to_string(), false);
            report.errors.push(format!("{}: missing file", spec.file));
            continue;
        }
        report.docs_written.insert(spec.file.to_string(), true);
        let text = std::fs::read_to_string(&path)?;
        check_document(spec, &text, &mut report.errors, &mut report.warnings);
    }

    if strict {
        report.errors.extend(
            std::mem::take(&mut report.warnings)
                .into_iter()
                .map(|w| format!("(strict) {w}")),
        );
    }
    report.ok = report.errors.is_empty();
    tracing::debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "stage-a docs checked"
    );
    Ok(report)
}

fn check_document(spec: &DocSpec, text: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let lines: Vec<&str> = text.lines().collect();

    for heading in spec.headings {
        let Some(idx) = lines.iter().position(|l| l.trim_end() == *heading) else {
            errors.push(format!("{}: missing heading '{}'", spec.file, heading));
            continue;
        };
        // Only second-level sections carry content of their own.
        if heading.starts_with("## ") && section_is_empty(&lines[idx + 1..]) {
            warnings.push(format!("{}: section '{}' is empty", spec.file, heading));
        }
    }

    for (n, line) in lines.iter().enumerate() {
        if placeholder_re().is_match(line) {
            errors.push(format!(
                "{}:{}: unresolved template placeholder",
                spec.file,
                n + 1
            ));
        }
        if let Some(m) = marker_re().find(line) {
            warnings.push(format!("{}:{}: {} marker", spec.file, n + 1, m.as_str()));
        }
    }
}

/// True when the lines up to the next heading hold nothing but blanks and
/// HTML comments.
fn section_is_empty(rest: &[&str]) -> bool {
    let mut in_comment = false;
    for line in rest {
        let t = line.trim();
        if t.starts_with('#') && !in_comment {
            break;
        }
        if in_comment {
            if t.contains("-->") {
                in_comment = false;
            }
            continue;
        }
        if t.is_empty() {
            continue;
        }
        if t.starts_with("<!--") {
            in_comment = !t.contains("-->");
            continue;
        }
        return false;
    }
    true
}
