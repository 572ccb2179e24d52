//! Storage trait definitions

use crate::error::StorageError;
use crate::model::{AuditEvent, Project, ServiceRecord, StoredEnvVar};
use async_trait::async_trait;
use linkmap_core::Environment;
use std::collections::HashMap;
use uuid::Uuid;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Combined storage trait
pub trait Storage:
    ProjectStorage + EnvVarStorage + ServiceStorage + AuditStorage + SessionStorage + Send + Sync
{
    /// Backend name reported by the health endpoint
    fn backend_label(&self) -> &'static str;
}

/// Storage for projects
#[async_trait]
pub trait ProjectStorage: Send + Sync {
    /// Get a project only if `owner_id` owns it
    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> StorageResult<Option<Project>>;

    /// List projects owned by a user, oldest first
    async fn list_projects_for_owner(&self, owner_id: Uuid) -> StorageResult<Vec<Project>>;

    /// Create a project
    async fn insert_project(&self, project: Project) -> StorageResult<()>;
}

/// Storage for encrypted environment variables
#[async_trait]
pub trait EnvVarStorage: Send + Sync {
    /// All variables of a project ordered by key name, then environment
    async fn list_env_vars(&self, project_id: Uuid) -> StorageResult<Vec<StoredEnvVar>>;

    /// Get a variable by id
    async fn get_env_var(&self, id: Uuid) -> StorageResult<Option<StoredEnvVar>>;

    /// Get the variable occupying a unique slot
    async fn find_env_var(
        &self,
        project_id: Uuid,
        key_name: &str,
        environment: Environment,
        service_id: Option<Uuid>,
    ) -> StorageResult<Option<StoredEnvVar>>;

    /// Insert a variable; `StorageError::Conflict` when the slot is taken
    async fn insert_env_var(&self, var: StoredEnvVar) -> StorageResult<()>;

    /// Replace a variable by id; `StorageError::NotFound` when absent
    async fn update_env_var(&self, var: StoredEnvVar) -> StorageResult<()>;

    /// Delete a variable by id
    async fn delete_env_var(&self, id: Uuid) -> StorageResult<bool>;

    /// Delete the variable occupying a unique slot, returning rows removed
    async fn delete_env_var_slot(
        &self,
        project_id: Uuid,
        key_name: &str,
        environment: Environment,
        service_id: Option<Uuid>,
    ) -> StorageResult<u64>;
}

/// Storage for service integrations
#[async_trait]
pub trait ServiceStorage: Send + Sync {
    /// Create or rename a service
    async fn upsert_service(&self, service: ServiceRecord) -> StorageResult<()>;

    /// Names of the given services; unknown ids are omitted
    async fn service_names(&self, ids: &[Uuid]) -> StorageResult<HashMap<Uuid, String>>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditStorage: Send + Sync {
    async fn append_audit(&self, event: AuditEvent) -> StorageResult<()>;

    /// Most recent events of a user, newest first
    async fn list_audit_for_user(&self, user_id: Uuid, limit: usize)
        -> StorageResult<Vec<AuditEvent>>;
}

/// Bearer token sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Register a token for a user; tokens are stored hashed
    async fn upsert_session(&self, token: &str, user_id: Uuid) -> StorageResult<()>;

    /// Resolve a presented token to its user
    async fn resolve_session(&self, token: &str) -> StorageResult<Option<Uuid>>;
}

/// Digest under which a session token is stored.
pub fn session_token_digest(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}
