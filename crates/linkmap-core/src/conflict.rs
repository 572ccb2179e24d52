//! Cross-environment conflict detection for a single project's variables.
//!
//! Records are grouped by `(key_name, service_id)`. A service-scoped variable
//! is only ever compared with variables of the same service, and project-wide
//! variables only with each other. Each group yields at most one [`Conflict`].
//!
//! Raw values are used for equality checks only. The produced conflicts carry
//! value groups and flags, never the values themselves.

use crate::types::{EnvVarRecord, Environment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The key exists in some environments but not in others.
    MissingValue,
    /// The key exists in several environments with differing values.
    ValueMismatch,
}

/// Per-environment snapshot sufficient to render a diff without the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub var_id: Uuid,
    /// Environments of one conflict share a group exactly when their values
    /// are equal. Numbered from 0 in canonical environment order.
    pub value_group: usize,
    pub is_empty: bool,
    pub is_placeholder: bool,
    pub is_secret: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub key_name: String,
    pub service_id: Option<Uuid>,
    pub service_name: Option<String>,
    pub kinds: Vec<ConflictKind>,
    pub severity: ConflictSeverity,
    pub environments_involved: Vec<Environment>,
    pub missing_environments: Vec<Environment>,
    pub description: String,
    pub environments: BTreeMap<Environment, Option<ConflictEntry>>,
}

impl Conflict {
    pub fn has_kind(&self, kind: ConflictKind) -> bool {
        self.kinds.contains(&kind)
    }
}

type Scope<'a> = (&'a str, Option<Uuid>);

/// Scan a project's decrypted variables for cross-environment inconsistencies.
///
/// The result depends only on the set of records, not their order, and is
/// sorted by severity (critical first), key name, then scope.
pub fn detect_conflicts(records: &[EnvVarRecord]) -> Vec<Conflict> {
    let mut groups: BTreeMap<Scope<'_>, BTreeMap<Environment, &EnvVarRecord>> = BTreeMap::new();

    for record in records {
        let by_env = groups
            .entry((record.key_name.as_str(), record.service_id))
            .or_default();
        match by_env.entry(record.environment) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if supersedes(record, slot.get()) {
                    slot.insert(record);
                }
            }
        }
    }

    let mut conflicts: Vec<Conflict> = groups
        .into_iter()
        .filter_map(|((key_name, service_id), by_env)| {
            evaluate_group(key_name, service_id, &by_env)
        })
        .collect();

    conflicts.sort_by(|a, b| {
        (Reverse(a.severity), &a.key_name, a.service_id).cmp(&(
            Reverse(b.severity),
            &b.key_name,
            b.service_id,
        ))
    });
    conflicts
}

/// Duplicate rows for one environment resolve to the most recently updated,
/// then the greatest id, so the choice never depends on input order.
fn supersedes(candidate: &EnvVarRecord, current: &EnvVarRecord) -> bool {
    (candidate.updated_at, candidate.id) > (current.updated_at, current.id)
}

fn evaluate_group(
    key_name: &str,
    service_id: Option<Uuid>,
    by_env: &BTreeMap<Environment, &EnvVarRecord>,
) -> Option<Conflict> {
    if by_env.len() < 2 {
        return None;
    }

    let present: Vec<Environment> = by_env.keys().copied().collect();
    let missing: Vec<Environment> = Environment::ALL
        .into_iter()
        .filter(|env| !by_env.contains_key(env))
        .collect();

    let mut distinct_values: Vec<&str> = Vec::new();
    let mut environments: BTreeMap<Environment, Option<ConflictEntry>> =
        Environment::ALL.into_iter().map(|env| (env, None)).collect();

    for (env, record) in by_env {
        let value = record.decrypted_value.as_str();
        let value_group = match distinct_values.iter().position(|seen| *seen == value) {
            Some(index) => index,
            None => {
                distinct_values.push(value);
                distinct_values.len() - 1
            }
        };
        environments.insert(
            *env,
            Some(ConflictEntry {
                var_id: record.id,
                value_group,
                is_empty: value.trim().is_empty(),
                is_placeholder: is_placeholder(value),
                is_secret: record.is_secret,
                updated_at: record.updated_at,
            }),
        );
    }

    let mismatch = distinct_values.len() > 1;
    if missing.is_empty() && !mismatch {
        return None;
    }

    let mut kinds = Vec::with_capacity(2);
    let mut severity = ConflictSeverity::Info;
    let mut details = Vec::with_capacity(2);

    if !missing.is_empty() {
        kinds.push(ConflictKind::MissingValue);
        severity = severity.max(missing_severity(&missing));
        details.push(format!(
            "{} is missing in {} (present in {})",
            key_name,
            join_envs(&missing),
            join_envs(&present)
        ));
    }

    if mismatch {
        kinds.push(ConflictKind::ValueMismatch);
        let involved: Vec<&EnvVarRecord> = by_env.values().copied().collect();
        severity = severity.max(mismatch_severity(&involved));
        details.push(format!(
            "{} has {} different values across {}",
            key_name,
            distinct_values.len(),
            join_envs(&present)
        ));
    }

    let mut environments_involved = missing.clone();
    if mismatch {
        environments_involved.extend(present.iter().copied());
    }
    environments_involved.sort();
    environments_involved.dedup();

    let service_name = by_env
        .values()
        .find_map(|record| record.service_name.clone());

    Some(Conflict {
        id: conflict_id(key_name, service_id),
        key_name: key_name.to_string(),
        service_id,
        service_name,
        kinds,
        severity,
        environments_involved,
        missing_environments: missing,
        description: details.join("; "),
        environments,
    })
}

fn conflict_id(key_name: &str, service_id: Option<Uuid>) -> String {
    match service_id {
        Some(service_id) => format!("{}@{}", key_name, service_id),
        None => key_name.to_string(),
    }
}

fn missing_severity(missing: &[Environment]) -> ConflictSeverity {
    if missing.contains(&Environment::Production) {
        ConflictSeverity::Warning
    } else {
        ConflictSeverity::Info
    }
}

/// Never decreases as records join the comparison: the secret flag and the
/// number of distinct real values can only grow.
fn mismatch_severity(involved: &[&EnvVarRecord]) -> ConflictSeverity {
    if involved.iter().any(|record| record.is_secret) {
        return ConflictSeverity::Critical;
    }

    let mut real_values: Vec<&str> = involved
        .iter()
        .map(|record| record.decrypted_value.as_str())
        .filter(|value| !is_placeholder(value))
        .collect();
    real_values.sort_unstable();
    real_values.dedup();

    if real_values.len() >= 2 {
        ConflictSeverity::Warning
    } else {
        ConflictSeverity::Info
    }
}

fn join_envs(envs: &[Environment]) -> String {
    envs.iter()
        .map(Environment::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

const PLACEHOLDER_WORDS: &[&str] = &[
    "changeme",
    "change_me",
    "change-me",
    "todo",
    "tbd",
    "placeholder",
    "none",
    "null",
    "undefined",
];

/// Whether a value looks unset: blank, a filler word, `xxx`, `...`,
/// `your_...` or `<...>`.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }

    let lower = trimmed.to_ascii_lowercase();
    if PLACEHOLDER_WORDS.contains(&lower.as_str()) {
        return true;
    }
    if lower.len() >= 3 && lower.chars().all(|c| c == 'x') {
        return true;
    }
    if lower.chars().all(|c| c == '.') || lower == "…" {
        return true;
    }
    if lower.starts_with("your_") || lower.starts_with("your-") {
        return true;
    }
    lower.len() >= 2 && lower.starts_with('<') && lower.ends_with('>')
}
