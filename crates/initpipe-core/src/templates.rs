//! Built-in config file templates written during `apply`.
//!
//! Every template is write-if-missing: a file the user already has is never
//! touched. Richer templating lives in feature template trees.

use crate::action::{Step, WritePolicy};
use crate::blueprint::{Blueprint, RepoLayout};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Go,
    Rust,
    Other,
}

impl Language {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Language::TypeScript,
            "javascript" | "js" | "node" => Language::JavaScript,
            "python" | "py" => Language::Python,
            "go" | "golang" => Language::Go,
            "rust" | "rs" => Language::Rust,
            _ => Language::Other,
        }
    }

    pub fn is_node(self) -> bool {
        matches!(self, Language::TypeScript | Language::JavaScript)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Other => "other",
        };
        f.write_str(s)
    }
}

/// A rendered template: repository-relative path and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: &'static str,
    pub contents: String,
}

/// Lowercase, dash-separated package name derived from the project name.
pub fn package_name(project: &str) -> String {
    let mut out = String::new();
    for c in project.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn render(bp: &Blueprint) -> Result<Vec<ConfigFile>> {
    let lang = Language::parse(&bp.repo.language);
    let name = package_name(&bp.project.name);
    let mut files = vec![
        ConfigFile {
            path: "README.md",
            contents: readme(bp),
        },
        ConfigFile {
            path: ".editorconfig",
            contents: EDITORCONFIG.to_string(),
        },
        ConfigFile {
            path: ".gitignore",
            contents: gitignore(lang),
        },
    ];

    match lang {
        Language::TypeScript | Language::JavaScript => {
            files.push(ConfigFile {
                path: "package.json",
                contents: package_json(bp, &name, lang)?,
            });
            if lang == Language::TypeScript {
                files.push(ConfigFile {
                    path: "tsconfig.json",
                    contents: TSCONFIG.to_string(),
                });
            }
            if bp.repo.layout == RepoLayout::Monorepo
                && bp.repo.package_manager.eq_ignore_ascii_case("pnpm")
            {
                files.push(ConfigFile {
                    path: "pnpm-workspace.yaml",
                    contents: pnpm_workspace()?,
                });
            }
        }
        Language::Python => files.push(ConfigFile {
            path: "pyproject.toml",
            contents: pyproject(bp, &name)?,
        }),
        Language::Go => files.push(ConfigFile {
            path: "go.mod",
            contents: format!("module {name}\n\ngo 1.22\n"),
        }),
        Language::Rust => files.push(ConfigFile {
            path: "Cargo.toml",
            contents: cargo_toml(bp, &name)?,
        }),
        Language::Other => {
            tracing::info!(language = %bp.repo.language, "no language-specific config template");
        }
    }
    Ok(files)
}

/// Write-if-missing steps for every rendered template.
pub fn plan(root: &Path, bp: &Blueprint) -> Result<Vec<Step>> {
    Ok(render(bp)?
        .into_iter()
        .map(|f| Step::WriteFile {
            path: root.join(f.path),
            contents: f.contents.into_bytes(),
            policy: WritePolicy::IfMissing,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Template bodies
// ---------------------------------------------------------------------------

const EDITORCONFIG: &str = "root = true

[*]
charset = utf-8
end_of_line = lf
insert_final_newline = true
indent_style = space
indent_size = 2
trim_trailing_whitespace = true

[*.md]
trim_trailing_whitespace = false
";

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2022",
    "module": "NodeNext",
    "moduleResolution": "NodeNext",
    "strict": true,
    "esModuleInterop": true,
    "skipLibCheck": true,
    "outDir": "dist"
  }
}
"#;

fn readme(bp: &Blueprint) -> String {
    format!(
        "# {}\n\n{}\n\n## Layout\n\n- Layout: {}\n- Language: {}\n- Package manager: {}\n",
        bp.project.name,
        bp.project.description,
        match bp.repo.layout {
            RepoLayout::Single => "single",
            RepoLayout::Monorepo => "monorepo",
        },
        bp.repo.language,
        bp.repo.package_manager,
    )
}

fn gitignore(lang: Language) -> String {
    let mut out = String::from(".DS_Store\n.env\n.env.*\n!.env.example\n*.log\n");
    let extra = match lang {
        Language::TypeScript | Language::JavaScript => "node_modules/\ndist/\ncoverage/\n",
        Language::Python => "__pycache__/\n*.pyc\n.venv/\n.pytest_cache/\ndist/\n",
        Language::Go => "bin/\n*.test\n",
        Language::Rust => "target/\n",
        Language::Other => "",
    };
    out.push_str(extra);
    out
}

fn package_json(bp: &Blueprint, name: &str, lang: Language) -> Result<String> {
    let mut doc = serde_json::json!({
        "name": name,
        "version": "0.1.0",
        "private": true,
        "description": bp.project.description,
        "type": "module",
        "scripts": {
            "test": "echo \"no tests yet\"",
        },
    });
    if lang == Language::TypeScript {
        doc["scripts"]["build"] = serde_json::Value::from("tsc -p .");
    }
    if bp.repo.layout == RepoLayout::Monorepo && !bp.repo.package_manager.eq_ignore_ascii_case("pnpm") {
        doc["workspaces"] = serde_json::json!(["apps/*", "packages/*"]);
    }
    Ok(String::from_utf8_lossy(&crate::io::to_json_bytes(&doc)?).into_owned())
}

#[derive(Serialize)]
struct PnpmWorkspace {
    packages: Vec<&'static str>,
}

fn pnpm_workspace() -> Result<String> {
    Ok(serde_yaml::to_string(&PnpmWorkspace {
        packages: vec!["apps/*", "packages/*"],
    })?)
}

#[derive(Serialize)]
struct PyProject<'a> {
    project: PyProjectTable<'a>,
}

#[derive(Serialize)]
struct PyProjectTable<'a> {
    name: &'a str,
    version: &'static str,
    description: &'a str,
    #[serde(rename = "requires-python")]
    requires_python: &'static str,
}

fn pyproject(bp: &Blueprint, name: &str) -> Result<String> {
    Ok(toml::to_string(&PyProject {
        project: PyProjectTable {
            name,
            version: "0.1.0",
            description: &bp.project.description,
            requires_python: ">=3.10",
        },
    })?)
}

#[derive(Serialize)]
struct CargoPackageManifest<'a> {
    package: CargoPackage<'a>,
}

#[derive(Serialize)]
struct CargoPackage<'a> {
    name: &'a str,
    version: &'static str,
    edition: &'static str,
    description: &'a str,
}

#[derive(Serialize)]
struct CargoWorkspaceManifest {
    workspace: CargoWorkspace,
}

#[derive(Serialize)]
struct CargoWorkspace {
    resolver: &'static str,
    members: Vec<&'static str>,
}

fn cargo_toml(bp: &Blueprint, name: &str) -> Result<String> {
    if bp.repo.layout == RepoLayout::Monorepo {
        return Ok(toml::to_string(&CargoWorkspaceManifest {
            workspace: CargoWorkspace {
                resolver: "2",
                members: vec!["apps/*", "packages/*"],
            },
        })?);
    }
    Ok(toml::to_string(&CargoPackageManifest {
        package: CargoPackage {
            name,
            version: "0.1.0",
            edition: "2021",
            description: &bp.project.description,
        },
    })?)
}
