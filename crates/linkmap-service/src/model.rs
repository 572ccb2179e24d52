//! Persisted rows owned by the service.

use chrono::{DateTime, Utc};
use linkmap_core::Environment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A third-party integration a variable may be scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: Uuid,
    pub name: String,
}

/// Environment variable as stored: the value only ever exists encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEnvVar {
    pub id: Uuid,
    pub project_id: Uuid,
    pub service_id: Option<Uuid>,
    pub key_name: String,
    pub encrypted_value: String,
    pub environment: Environment,
    pub is_secret: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEnvVar {
    /// Whether `other` occupies the same unique slot
    /// `(project_id, key_name, environment, service_id)`.
    pub fn same_slot(&self, other: &StoredEnvVar) -> bool {
        self.project_id == other.project_id
            && self.key_name == other.key_name
            && self.environment == other.environment
            && self.service_id == other.service_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "project.create")]
    ProjectCreate,
    #[serde(rename = "env_var.create")]
    EnvVarCreate,
    #[serde(rename = "env_var.delete")]
    EnvVarDelete,
    #[serde(rename = "env_var.import")]
    EnvVarImport,
    #[serde(rename = "env_var.conflict_scan")]
    EnvVarConflictScan,
    #[serde(rename = "env_var.conflict_resolve")]
    EnvVarConflictResolve,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreate => "project.create",
            Self::EnvVarCreate => "env_var.create",
            Self::EnvVarDelete => "env_var.delete",
            Self::EnvVarImport => "env_var.import",
            Self::EnvVarConflictScan => "env_var.conflict_scan",
            Self::EnvVarConflictResolve => "env_var.conflict_resolve",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::ProjectCreate,
            Self::EnvVarCreate,
            Self::EnvVarDelete,
            Self::EnvVarImport,
            Self::EnvVarConflictScan,
            Self::EnvVarConflictResolve,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
