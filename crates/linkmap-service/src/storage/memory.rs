//! In-memory storage implementation

use super::traits::*;
use crate::error::StorageError;
use crate::model::{AuditEvent, Project, ServiceRecord, StoredEnvVar};
use async_trait::async_trait;
use linkmap_core::Environment;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory storage for development and testing
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    projects: RwLock<HashMap<Uuid, Project>>,
    env_vars: RwLock<HashMap<Uuid, StoredEnvVar>>,
    services: RwLock<HashMap<Uuid, ServiceRecord>>,
    audit: RwLock<Vec<AuditEvent>>,
    sessions: RwLock<HashMap<String, Uuid>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn backend_label(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ProjectStorage for InMemoryStorage {
    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> StorageResult<Option<Project>> {
        let projects = self.projects.read().await;
        Ok(projects
            .get(&id)
            .filter(|project| project.owner_id == owner_id)
            .cloned())
    }

    async fn list_projects_for_owner(&self, owner_id: Uuid) -> StorageResult<Vec<Project>> {
        let projects = self.projects.read().await;
        let mut owned: Vec<Project> = projects
            .values()
            .filter(|project| project.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(owned)
    }

    async fn insert_project(&self, project: Project) -> StorageResult<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(StorageError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }
        projects.insert(project.id, project);
        Ok(())
    }
}

#[async_trait]
impl EnvVarStorage for InMemoryStorage {
    async fn list_env_vars(&self, project_id: Uuid) -> StorageResult<Vec<StoredEnvVar>> {
        let env_vars = self.env_vars.read().await;
        let mut vars: Vec<StoredEnvVar> = env_vars
            .values()
            .filter(|var| var.project_id == project_id)
            .cloned()
            .collect();
        vars.sort_by(|a, b| {
            (&a.key_name, a.environment, a.service_id).cmp(&(
                &b.key_name,
                b.environment,
                b.service_id,
            ))
        });
        Ok(vars)
    }

    async fn get_env_var(&self, id: Uuid) -> StorageResult<Option<StoredEnvVar>> {
        let env_vars = self.env_vars.read().await;
        Ok(env_vars.get(&id).cloned())
    }

    async fn find_env_var(
        &self,
        project_id: Uuid,
        key_name: &str,
        environment: Environment,
        service_id: Option<Uuid>,
    ) -> StorageResult<Option<StoredEnvVar>> {
        let env_vars = self.env_vars.read().await;
        Ok(env_vars
            .values()
            .find(|var| {
                var.project_id == project_id
                    && var.key_name == key_name
                    && var.environment == environment
                    && var.service_id == service_id
            })
            .cloned())
    }

    async fn insert_env_var(&self, var: StoredEnvVar) -> StorageResult<()> {
        let mut env_vars = self.env_vars.write().await;
        if env_vars.values().any(|existing| existing.same_slot(&var)) {
            return Err(StorageError::Conflict(format!(
                "{} already exists in {}",
                var.key_name, var.environment
            )));
        }
        env_vars.insert(var.id, var);
        Ok(())
    }

    async fn update_env_var(&self, var: StoredEnvVar) -> StorageResult<()> {
        let mut env_vars = self.env_vars.write().await;
        if env_vars
            .values()
            .any(|existing| existing.id != var.id && existing.same_slot(&var))
        {
            return Err(StorageError::Conflict(format!(
                "{} already exists in {}",
                var.key_name, var.environment
            )));
        }
        match env_vars.get_mut(&var.id) {
            Some(slot) => {
                *slot = var;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!(
                "environment variable {}",
                var.id
            ))),
        }
    }

    async fn delete_env_var(&self, id: Uuid) -> StorageResult<bool> {
        let mut env_vars = self.env_vars.write().await;
        Ok(env_vars.remove(&id).is_some())
    }

    async fn delete_env_var_slot(
        &self,
        project_id: Uuid,
        key_name: &str,
        environment: Environment,
        service_id: Option<Uuid>,
    ) -> StorageResult<u64> {
        let mut env_vars = self.env_vars.write().await;
        let before = env_vars.len();
        env_vars.retain(|_, var| {
            !(var.project_id == project_id
                && var.key_name == key_name
                && var.environment == environment
                && var.service_id == service_id)
        });
        Ok((before - env_vars.len()) as u64)
    }
}

#[async_trait]
impl ServiceStorage for InMemoryStorage {
    async fn upsert_service(&self, service: ServiceRecord) -> StorageResult<()> {
        let mut services = self.services.write().await;
        services.insert(service.id, service);
        Ok(())
    }

    async fn service_names(&self, ids: &[Uuid]) -> StorageResult<HashMap<Uuid, String>> {
        let services = self.services.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| services.get(id).map(|s| (*id, s.name.clone())))
            .collect())
    }
}

#[async_trait]
impl AuditStorage for InMemoryStorage {
    async fn append_audit(&self, event: AuditEvent) -> StorageResult<()> {
        let mut audit = self.audit.write().await;
        audit.push(event);
        Ok(())
    }

    async fn list_audit_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StorageResult<Vec<AuditEvent>> {
        let audit = self.audit.read().await;
        Ok(audit
            .iter()
            .rev()
            .filter(|event| event.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionStorage for InMemoryStorage {
    async fn upsert_session(&self, token: &str, user_id: Uuid) -> StorageResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_token_digest(token), user_id);
        Ok(())
    }

    async fn resolve_session(&self, token: &str) -> StorageResult<Option<Uuid>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_token_digest(token)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn env_var(project_id: Uuid, key: &str, environment: Environment) -> StoredEnvVar {
        StoredEnvVar {
            id: Uuid::new_v4(),
            project_id,
            service_id: None,
            key_name: key.to_string(),
            encrypted_value: "00:00:00".to_string(),
            environment,
            is_secret: true,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ownership_is_enforced_on_lookup() {
        let storage = InMemoryStorage::new();
        let owner = Uuid::new_v4();
        let project = Project::new(owner, "site");
        storage.insert_project(project.clone()).await.unwrap();

        assert_eq!(
            storage.find_owned_project(project.id, owner).await.unwrap(),
            Some(project.clone())
        );
        assert_eq!(
            storage
                .find_owned_project(project.id, Uuid::new_v4())
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn duplicate_slot_is_rejected() {
        let storage = InMemoryStorage::new();
        let project_id = Uuid::new_v4();
        storage
            .insert_env_var(env_var(project_id, "API_URL", Environment::Staging))
            .await
            .unwrap();

        let err = storage
            .insert_env_var(env_var(project_id, "API_URL", Environment::Staging))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        storage
            .insert_env_var(env_var(project_id, "API_URL", Environment::Production))
            .await
            .unwrap();
        assert_eq!(storage.list_env_vars(project_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn slot_delete_respects_service_scope() {
        let storage = InMemoryStorage::new();
        let project_id = Uuid::new_v4();
        let mut scoped = env_var(project_id, "URL", Environment::Staging);
        scoped.service_id = Some(Uuid::new_v4());
        storage.insert_env_var(scoped.clone()).await.unwrap();
        storage
            .insert_env_var(env_var(project_id, "URL", Environment::Staging))
            .await
            .unwrap();

        let removed = storage
            .delete_env_var_slot(project_id, "URL", Environment::Staging, None)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            storage.list_env_vars(project_id).await.unwrap(),
            vec![scoped]
        );
    }

    #[tokio::test]
    async fn sessions_resolve_by_token() {
        let storage = InMemoryStorage::new();
        let user = Uuid::new_v4();
        storage.upsert_session("token-a", user).await.unwrap();

        assert_eq!(storage.resolve_session("token-a").await.unwrap(), Some(user));
        assert_eq!(storage.resolve_session("token-b").await.unwrap(), None);
    }
}
