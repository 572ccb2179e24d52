//! PostgreSQL storage implementation

use super::traits::*;
use crate::error::StorageError;
use crate::model::{AuditAction, AuditEvent, Project, ServiceRecord, StoredEnvVar};
use async_trait::async_trait;
use linkmap_core::Environment;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// PostgreSQL-backed storage
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

const ENV_VAR_COLUMNS: &str = "id, project_id, service_id, key_name, encrypted_value, environment, \
     is_secret, description, created_at, updated_at";

impl PostgresStorage {
    /// Connect to PostgreSQL and initialize schema
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS linkmap_projects (
                id UUID PRIMARY KEY,
                owner_id UUID NOT NULL,
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS linkmap_projects_owner ON linkmap_projects(owner_id);"#,
            r#"
            CREATE TABLE IF NOT EXISTS linkmap_services (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS linkmap_env_vars (
                id UUID PRIMARY KEY,
                project_id UUID NOT NULL REFERENCES linkmap_projects(id) ON DELETE CASCADE,
                service_id UUID NULL,
                key_name TEXT NOT NULL,
                encrypted_value TEXT NOT NULL,
                environment TEXT NOT NULL,
                is_secret BOOLEAN NOT NULL DEFAULT TRUE,
                description TEXT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS linkmap_env_vars_slot ON linkmap_env_vars (
                project_id,
                key_name,
                environment,
                COALESCE(service_id, '00000000-0000-0000-0000-000000000000'::uuid)
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS linkmap_audit_logs (
                sequence BIGSERIAL PRIMARY KEY,
                id UUID NOT NULL UNIQUE,
                user_id UUID NOT NULL,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT NULL,
                details JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS linkmap_audit_logs_user ON linkmap_audit_logs(user_id, sequence DESC);"#,
            r#"
            CREATE TABLE IF NOT EXISTS linkmap_sessions (
                token_digest TEXT PRIMARY KEY,
                user_id UUID NOT NULL,
                expires_at TIMESTAMPTZ NULL
            );
            "#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        Ok(())
    }
}

impl Storage for PostgresStorage {
    fn backend_label(&self) -> &'static str {
        "postgres"
    }
}

fn query_error(e: sqlx::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn write_error(e: sqlx::Error, slot: &StoredEnvVar) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict(format!(
                "{} already exists in {}",
                slot.key_name, slot.environment
            ));
        }
    }
    query_error(e)
}

fn decode<T>(row: &PgRow, column: &str) -> Result<T, StorageError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::InvalidData(format!("decode {column} failed: {e}")))
}

fn row_to_project(row: &PgRow) -> Result<Project, StorageError> {
    Ok(Project {
        id: decode(row, "id")?,
        owner_id: decode(row, "owner_id")?,
        name: decode(row, "name")?,
        created_at: decode(row, "created_at")?,
    })
}

fn row_to_env_var(row: &PgRow) -> Result<StoredEnvVar, StorageError> {
    let environment: String = decode(row, "environment")?;
    Ok(StoredEnvVar {
        id: decode(row, "id")?,
        project_id: decode(row, "project_id")?,
        service_id: decode(row, "service_id")?,
        key_name: decode(row, "key_name")?,
        encrypted_value: decode(row, "encrypted_value")?,
        environment: environment
            .parse()
            .map_err(|e: linkmap_core::LinkmapError| StorageError::InvalidData(e.to_string()))?,
        is_secret: decode(row, "is_secret")?,
        description: decode(row, "description")?,
        created_at: decode(row, "created_at")?,
        updated_at: decode(row, "updated_at")?,
    })
}

fn row_to_audit(row: &PgRow) -> Result<AuditEvent, StorageError> {
    let action: String = decode(row, "action")?;
    Ok(AuditEvent {
        id: decode(row, "id")?,
        user_id: decode(row, "user_id")?,
        action: AuditAction::parse(&action)
            .ok_or_else(|| StorageError::InvalidData(format!("unknown audit action '{action}'")))?,
        resource_type: decode(row, "resource_type")?,
        resource_id: decode(row, "resource_id")?,
        details: decode(row, "details")?,
        created_at: decode(row, "created_at")?,
    })
}

#[async_trait]
impl ProjectStorage for PostgresStorage {
    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> StorageResult<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, created_at FROM linkmap_projects WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn list_projects_for_owner(&self, owner_id: Uuid) -> StorageResult<Vec<Project>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, name, created_at FROM linkmap_projects WHERE owner_id = $1 ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.iter().map(row_to_project).collect()
    }

    async fn insert_project(&self, project: Project) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO linkmap_projects (id, owner_id, name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(project.id)
        .bind(project.owner_id)
        .bind(&project.name)
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }
}

#[async_trait]
impl EnvVarStorage for PostgresStorage {
    async fn list_env_vars(&self, project_id: Uuid) -> StorageResult<Vec<StoredEnvVar>> {
        let sql = format!(
            "SELECT {ENV_VAR_COLUMNS} FROM linkmap_env_vars WHERE project_id = $1 \
             ORDER BY key_name, CASE environment WHEN 'development' THEN 0 WHEN 'staging' THEN 1 ELSE 2 END, service_id NULLS FIRST"
        );
        let rows = sqlx::query(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_env_var).collect()
    }

    async fn get_env_var(&self, id: Uuid) -> StorageResult<Option<StoredEnvVar>> {
        let sql = format!("SELECT {ENV_VAR_COLUMNS} FROM linkmap_env_vars WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.as_ref().map(row_to_env_var).transpose()
    }

    async fn find_env_var(
        &self,
        project_id: Uuid,
        key_name: &str,
        environment: Environment,
        service_id: Option<Uuid>,
    ) -> StorageResult<Option<StoredEnvVar>> {
        let sql = format!(
            "SELECT {ENV_VAR_COLUMNS} FROM linkmap_env_vars \
             WHERE project_id = $1 AND key_name = $2 AND environment = $3 \
             AND service_id IS NOT DISTINCT FROM $4"
        );
        let row = sqlx::query(&sql)
            .bind(project_id)
            .bind(key_name)
            .bind(environment.as_str())
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.as_ref().map(row_to_env_var).transpose()
    }

    async fn insert_env_var(&self, var: StoredEnvVar) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO linkmap_env_vars (
                id, project_id, service_id, key_name, encrypted_value, environment,
                is_secret, description, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(var.id)
        .bind(var.project_id)
        .bind(var.service_id)
        .bind(&var.key_name)
        .bind(&var.encrypted_value)
        .bind(var.environment.as_str())
        .bind(var.is_secret)
        .bind(&var.description)
        .bind(var.created_at)
        .bind(var.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &var))?;
        Ok(())
    }

    async fn update_env_var(&self, var: StoredEnvVar) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE linkmap_env_vars
            SET service_id = $2,
                key_name = $3,
                encrypted_value = $4,
                environment = $5,
                is_secret = $6,
                description = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(var.id)
        .bind(var.service_id)
        .bind(&var.key_name)
        .bind(&var.encrypted_value)
        .bind(var.environment.as_str())
        .bind(var.is_secret)
        .bind(&var.description)
        .bind(var.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &var))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "environment variable {}",
                var.id
            )));
        }
        Ok(())
    }

    async fn delete_env_var(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM linkmap_env_vars WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_env_var_slot(
        &self,
        project_id: Uuid,
        key_name: &str,
        environment: Environment,
        service_id: Option<Uuid>,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM linkmap_env_vars
            WHERE project_id = $1 AND key_name = $2 AND environment = $3
              AND service_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(project_id)
        .bind(key_name)
        .bind(environment.as_str())
        .bind(service_id)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ServiceStorage for PostgresStorage {
    async fn upsert_service(&self, service: ServiceRecord) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO linkmap_services (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(service.id)
        .bind(&service.name)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn service_names(&self, ids: &[Uuid]) -> StorageResult<HashMap<Uuid, String>> {
        let rows = sqlx::query("SELECT id, name FROM linkmap_services WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| -> StorageResult<(Uuid, String)> {
                Ok((decode(row, "id")?, decode(row, "name")?))
            })
            .collect()
    }
}

#[async_trait]
impl AuditStorage for PostgresStorage {
    async fn append_audit(&self, event: AuditEvent) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO linkmap_audit_logs (
                id, user_id, action, resource_type, resource_id, details, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.action.as_str())
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.details)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn list_audit_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StorageResult<Vec<AuditEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, resource_type, resource_id, details, created_at
            FROM linkmap_audit_logs
            WHERE user_id = $1
            ORDER BY sequence DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.iter().map(row_to_audit).collect()
    }
}

#[async_trait]
impl SessionStorage for PostgresStorage {
    async fn upsert_session(&self, token: &str, user_id: Uuid) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO linkmap_sessions (token_digest, user_id) VALUES ($1, $2) \
             ON CONFLICT (token_digest) DO UPDATE SET user_id = EXCLUDED.user_id",
        )
        .bind(session_token_digest(token))
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn resolve_session(&self, token: &str) -> StorageResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT user_id FROM linkmap_sessions \
             WHERE token_digest = $1 AND (expires_at IS NULL OR expires_at > NOW())",
        )
        .bind(session_token_digest(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.as_ref().map(|row| decode(row, "user_id")).transpose()
    }
}
