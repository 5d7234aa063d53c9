//! Base directory layout derived from the blueprint.

use crate::action::Step;
use crate::blueprint::{Blueprint, RepoLayout};
use crate::paths;
use std::path::Path;

/// Directories every bootstrapped repository gets.
const COMMON_DIRS: &[&str] = &["docs", "scripts", "config"];

/// Repository-relative directories to create, in creation order.
pub fn directories(bp: &Blueprint) -> Vec<String> {
    let mut dirs: Vec<String> = COMMON_DIRS.iter().map(|d| d.to_string()).collect();
    dirs.push(format!("{}/project", paths::AI_DIR));

    let caps = &bp.capabilities;
    let (code, second) = match bp.repo.layout {
        RepoLayout::Single => ("src", "tests"),
        RepoLayout::Monorepo => ("apps", "packages"),
    };
    dirs.push(code.to_string());
    dirs.push(second.to_string());
    if caps.frontend() {
        dirs.push(format!("{code}/frontend"));
    }
    if caps.backend() {
        dirs.push(format!("{code}/backend"));
    }
    dirs
}

pub fn plan(root: &Path, bp: &Blueprint) -> Vec<Step> {
    directories(bp)
        .into_iter()
        .map(|d| Step::EnsureDir { path: root.join(d) })
        .collect()
}
