//! Blueprint validator.
//!
//! Pure: takes the raw JSON document and returns a [`ValidationReport`].
//! Field-presence and type checks run first, then cross-field invariants, so
//! one pass reports every independent problem.

use crate::blueprint::{Capabilities, DbSsot, RepoLayout};
use crate::features;
use crate::packs;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub normalized_packs: Vec<String>,
}

impl ValidationReport {
    /// Treat warnings as errors (`--strict`).
    pub fn strict(mut self) -> Self {
        let promoted: Vec<String> = self
            .warnings
            .drain(..)
            .map(|w| format!("(strict) {w}"))
            .collect();
        self.errors.extend(promoted);
        self.ok = self.errors.is_empty();
        self
    }
}

/// Values the cross-field pass needs, captured only when they type-checked.
#[derive(Default)]
struct Parsed {
    features: Option<BTreeMap<String, bool>>,
    ssot: Option<DbSsot>,
    db_enabled: Option<bool>,
    db_capability: Option<bool>,
    capabilities: BTreeMap<String, bool>,
    packs: Vec<String>,
}

struct Checker {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Checker {
    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn object<'a>(&mut self, root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
        match root.get(key) {
            None => {
                self.error(format!("{key}: required object is missing"));
                None
            }
            Some(Value::Object(m)) => Some(m),
            Some(_) => {
                self.error(format!("{key}: must be an object"));
                None
            }
        }
    }

    fn non_empty_string<'a>(&mut self, obj: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a str> {
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            Some(Value::String(_)) => {
                self.error(format!("{path}.{key}: must not be empty"));
                None
            }
            None => {
                self.error(format!("{path}.{key}: required string is missing"));
                None
            }
            Some(_) => {
                self.error(format!("{path}.{key}: must be a string"));
                None
            }
        }
    }
}

pub fn validate(doc: &Value) -> ValidationReport {
    let mut c = Checker {
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let Some(root) = doc.as_object() else {
        return ValidationReport {
            ok: false,
            errors: vec!["blueprint: top level must be a JSON object".to_string()],
            ..Default::default()
        };
    };

    let parsed = check_fields(&mut c, root);
    check_invariants(&mut c, &parsed);

    ValidationReport {
        ok: c.errors.is_empty(),
        errors: c.errors,
        warnings: c.warnings,
        normalized_packs: packs::normalize(&parsed.packs),
    }
}

// ---------------------------------------------------------------------------
// Pass 1: presence and types
// ---------------------------------------------------------------------------

fn check_fields(c: &mut Checker, root: &Map<String, Value>) -> Parsed {
    let mut parsed = Parsed::default();

    if root.contains_key("addons") {
        c.error("addons: obsolete field; move each entry to features.<featureKey> = true");
    }

    match root.get("version") {
        None => c.error("version: required integer is missing"),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => {}
            Some(_) => c.error("version: must be >= 1"),
            None => c.error("version: must be a positive integer"),
        },
    }

    if let Some(project) = c.object(root, "project") {
        c.non_empty_string(project, "project", "name");
        c.non_empty_string(project, "project", "description");
    }

    if let Some(repo) = c.object(root, "repo") {
        if let Some(layout) = c.non_empty_string(repo, "repo", "layout") {
            if !RepoLayout::ALL.contains(&layout) {
                c.error(format!(
                    "repo.layout: '{layout}' is not one of {}",
                    RepoLayout::ALL.join(", ")
                ));
            }
        }
        c.non_empty_string(repo, "repo", "language");
        c.non_empty_string(repo, "repo", "packageManager");
    }

    match root.get("capabilities") {
        None => {}
        Some(Value::Object(caps)) => {
            for (key, val) in caps {
                if !Capabilities::KEYS.contains(&key.as_str()) {
                    c.warn(format!("capabilities.{key}: unknown capability (ignored)"));
                    continue;
                }
                match val.as_object().map(|o| o.get("enabled")) {
                    Some(Some(Value::Bool(b))) => {
                        parsed.capabilities.insert(key.clone(), *b);
                    }
                    Some(None) => {
                        parsed.capabilities.insert(key.clone(), false);
                    }
                    Some(Some(_)) => c.error(format!("capabilities.{key}.enabled: must be a boolean")),
                    None => c.error(format!("capabilities.{key}: must be an object")),
                }
            }
            parsed.db_capability = parsed.capabilities.get("database").copied();
        }
        Some(_) => c.error("capabilities: must be an object"),
    }

    match root.get("features") {
        None => parsed.features = Some(BTreeMap::new()),
        Some(Value::Object(map)) => {
            let mut flags = BTreeMap::new();
            let mut well_typed = true;
            for (key, val) in map {
                match val {
                    Value::Bool(b) => {
                        if !features::is_known_key(key) {
                            c.warn(format!("features.{key}: unknown feature (ignored)"));
                        }
                        flags.insert(key.clone(), *b);
                    }
                    _ => {
                        well_typed = false;
                        c.error(format!("features.{key}: must be a boolean"));
                    }
                }
            }
            if well_typed {
                parsed.features = Some(flags);
            }
        }
        Some(_) => c.error("features: must be an object of featureKey -> boolean"),
    }

    match root.get("db") {
        None => {
            parsed.ssot = Some(DbSsot::None);
        }
        Some(Value::Object(db)) => {
            match db.get("enabled") {
                None => {}
                Some(Value::Bool(b)) => parsed.db_enabled = Some(*b),
                Some(_) => c.error("db.enabled: must be a boolean"),
            }
            match db.get("ssot") {
                None => parsed.ssot = Some(DbSsot::None),
                Some(Value::String(s)) => match DbSsot::parse(s) {
                    Some(ssot) => parsed.ssot = Some(ssot),
                    None => c.error(format!(
                        "db.ssot: '{s}' is not one of {}",
                        DbSsot::ALL.join(", ")
                    )),
                },
                Some(_) => c.error("db.ssot: must be a string"),
            }
        }
        Some(_) => c.error("db: must be an object"),
    }

    match root.get("skills") {
        None => {}
        Some(Value::Object(skills)) => match skills.get("packs") {
            None => {}
            Some(Value::Array(items)) => {
                let mut seen = BTreeSet::new();
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(name) if packs::pack(name).is_some() => {
                            if !seen.insert(name.to_string()) {
                                c.warn(format!("skills.packs: duplicate pack '{name}'"));
                            }
                            parsed.packs.push(name.to_string());
                        }
                        Some(name) => c.error(format!(
                            "skills.packs[{i}]: unknown pack '{name}'; known packs: {}",
                            packs::PACKS
                                .iter()
                                .map(|p| p.name)
                                .collect::<Vec<_>>()
                                .join(", ")
                        )),
                        None => c.error(format!("skills.packs[{i}]: must be a string")),
                    }
                }
            }
            Some(_) => c.error("skills.packs: must be an array of strings"),
        },
        Some(_) => c.error("skills: must be an object"),
    }

    parsed
}

// ---------------------------------------------------------------------------
// Pass 2: cross-field invariants
// ---------------------------------------------------------------------------

fn check_invariants(c: &mut Checker, p: &Parsed) {
    if let (Some(flags), Some(ssot)) = (&p.features, p.ssot) {
        let database = flags.get("database").copied().unwrap_or(false);
        if ssot.is_managed() && !database {
            c.error(format!(
                "db.ssot/features.database: db.ssot is '{ssot}' but features.database is not true \
                 (db.ssot != none if and only if features.database == true)"
            ));
        }
        if !ssot.is_managed() && database {
            c.error(
                "db.ssot/features.database: features.database is true but db.ssot is 'none' \
                 (db.ssot != none if and only if features.database == true); \
                 set db.ssot to 'repo-prisma' or 'database'",
            );
        }
    }

    if let Some(flags) = &p.features {
        for unmet in features::unmet_requirements(flags) {
            c.error(format!(
                "features.{}: requires features.{} to be true",
                unmet.feature, unmet.requires
            ));
        }
    }

    if let Some(ssot) = p.ssot {
        if ssot.is_managed() && p.db_enabled == Some(false) {
            c.warn(format!(
                "db.enabled is false but db.ssot is '{ssot}'; schema sync will still be configured"
            ));
        }
    }
    if let (Some(cap), Some(enabled)) = (p.db_capability, p.db_enabled) {
        if cap != enabled {
            c.warn(format!(
                "capabilities.database.enabled ({cap}) disagrees with db.enabled ({enabled})"
            ));
        }
    }

    // Recommended packs, computed from the same signals as packs::recommended_packs
    // but tolerant of a partially invalid document.
    let cap = |k: &str| p.capabilities.get(k).copied().unwrap_or(false);
    let mut recommended = vec!["workflow"];
    if cap("backend") {
        recommended.push("backend");
    }
    if cap("frontend") {
        recommended.push("frontend");
    }
    if cap("database") || p.ssot.map(|s| s.is_managed()).unwrap_or(false) {
        recommended.push("data");
    }
    if cap("bpmn") {
        recommended.push("diagrams");
    }
    if p
        .features
        .as_ref()
        .and_then(|f| f.get("contextAwareness").copied())
        .unwrap_or(false)
    {
        recommended.push("context-core");
    }
    for name in recommended {
        if !p.packs.iter().any(|x| x == name) {
            c.warn(format!("skills.packs: recommended pack '{name}' is not requested"));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
