//! Conflict scan and resolution handlers

use super::{parse_project_id, require_owned_project};
use crate::api::state::AppState;
use crate::audit::log_audit;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::model::{AuditAction, StoredEnvVar};
use crate::storage::{EnvVarStorage, ServiceStorage};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use linkmap_core::{detect_conflicts, Conflict, EnvVarRecord, Environment, KeyName};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::env_vars::ProjectQuery;

/// Conflict scan response
#[derive(Debug, Serialize)]
pub struct ConflictScanResponse {
    pub conflicts: Vec<Conflict>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
    /// Copy the source environment's value into each target
    Copy,
    /// Remove the key from each target
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct ResolveConflictRequest {
    pub project_id: Uuid,
    pub key_name: String,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    pub source_env: Environment,
    pub target_envs: Vec<Environment>,
    pub action: ResolveAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOutcome {
    Created,
    Updated,
    Deleted,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct TargetResult {
    pub env: Environment,
    pub action: TargetOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveConflictResponse {
    pub success: bool,
    pub results: Vec<TargetResult>,
}

/// Scan a project's variables for cross-environment conflicts
pub async fn scan_conflicts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<ConflictScanResponse>> {
    let project_id = parse_project_id(query.project_id.as_deref())?;
    require_owned_project(&state, project_id, user.user_id).await?;

    let vars = state
        .storage
        .list_env_vars(project_id)
        .await
        .map_err(|e| {
            tracing::error!(project_id = %project_id, error = %e, "failed to load variables for conflict scan");
            ApiError::Internal("conflict scan failed".to_string())
        })?;

    let service_ids: Vec<Uuid> = vars
        .iter()
        .filter_map(|var| var.service_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let service_names = if service_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .storage
            .service_names(&service_ids)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(project_id = %project_id, error = %e, "failed to resolve service names");
                HashMap::new()
            })
    };

    let records: Vec<EnvVarRecord> = vars
        .into_iter()
        .map(|var| {
            let decrypted_value = state
                .secrets
                .decrypt(&var.encrypted_value)
                .unwrap_or_else(|e| {
                    tracing::warn!(var_id = %var.id, error = %e, "failed to decrypt variable during conflict scan");
                    String::new()
                });
            EnvVarRecord {
                id: var.id,
                service_name: var.service_id.and_then(|id| service_names.get(&id).cloned()),
                key_name: var.key_name,
                environment: var.environment,
                decrypted_value,
                service_id: var.service_id,
                is_secret: var.is_secret,
                updated_at: var.updated_at,
            }
        })
        .collect();

    let conflicts = detect_conflicts(&records);

    tracing::info!(
        project_id = %project_id,
        scanned = records.len(),
        conflict_count = conflicts.len(),
        "conflict scan complete"
    );
    log_audit(
        state.storage.as_ref(),
        user.user_id,
        AuditAction::EnvVarConflictScan,
        "project",
        Some(project_id.to_string()),
        json!({ "conflict_count": conflicts.len() }),
    )
    .await;

    Ok(Json(ConflictScanResponse {
        conflicts,
        scanned_at: Utc::now(),
    }))
}

/// Resolve a conflict by copying or deleting a key across environments
pub async fn resolve_conflict(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ResolveConflictRequest>,
) -> ApiResult<Json<ResolveConflictResponse>> {
    if request.target_envs.is_empty() {
        return Err(ApiError::BadRequest(
            "target_envs must not be empty".to_string(),
        ));
    }
    let key_name = KeyName::parse(request.key_name.trim())?;
    require_owned_project(&state, request.project_id, user.user_id).await?;

    let mut targets = Vec::with_capacity(request.target_envs.len());
    for env in &request.target_envs {
        if !targets.contains(env) {
            targets.push(*env);
        }
    }

    let results = match request.action {
        ResolveAction::Copy => copy_to_targets(&state, &request, &key_name, &targets).await?,
        ResolveAction::Delete => delete_from_targets(&state, &request, &key_name, &targets).await,
    };

    log_audit(
        state.storage.as_ref(),
        user.user_id,
        AuditAction::EnvVarConflictResolve,
        "project",
        Some(request.project_id.to_string()),
        json!({
            "key_name": key_name.as_str(),
            "service_id": request.service_id,
            "action": request.action,
            "source_env": request.source_env,
            "target_envs": targets,
        }),
    )
    .await;

    Ok(Json(ResolveConflictResponse {
        success: true,
        results,
    }))
}

async fn copy_to_targets(
    state: &AppState,
    request: &ResolveConflictRequest,
    key_name: &KeyName,
    targets: &[Environment],
) -> ApiResult<Vec<TargetResult>> {
    let source = state
        .storage
        .find_env_var(
            request.project_id,
            key_name.as_str(),
            request.source_env,
            request.service_id,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("source variable not found".to_string()))?;

    let value = state.secrets.decrypt(&source.encrypted_value).map_err(|e| {
        tracing::error!(var_id = %source.id, error = %e, "failed to decrypt source variable");
        ApiError::Internal("failed to read source variable".to_string())
    })?;

    let mut results = Vec::with_capacity(targets.len());
    for &env in targets {
        if env == request.source_env {
            results.push(TargetResult {
                env,
                action: TargetOutcome::Skipped,
                error: None,
            });
            continue;
        }

        let (action, error) = match copy_into(state, &source, &value, env).await {
            Ok(action) => (action, None),
            Err((action, e)) => {
                tracing::error!(
                    var_id = %source.id,
                    environment = %env,
                    error = %e,
                    "failed to copy variable"
                );
                (action, Some("copy failed".to_string()))
            }
        };
        results.push(TargetResult { env, action, error });
    }

    Ok(results)
}

async fn copy_into(
    state: &AppState,
    source: &StoredEnvVar,
    value: &str,
    env: Environment,
) -> Result<TargetOutcome, (TargetOutcome, ApiError)> {
    let existing = state
        .storage
        .find_env_var(source.project_id, &source.key_name, env, source.service_id)
        .await
        .map_err(|e| (TargetOutcome::Skipped, ApiError::from(e)))?;
    let action = if existing.is_some() {
        TargetOutcome::Updated
    } else {
        TargetOutcome::Created
    };

    let encrypted_value = state
        .secrets
        .encrypt(value)
        .map_err(|e| (action, ApiError::from(e)))?;
    let now = Utc::now();

    let written = match existing {
        Some(mut var) => {
            var.encrypted_value = encrypted_value;
            var.is_secret = source.is_secret;
            var.description = source.description.clone();
            var.updated_at = now;
            state.storage.update_env_var(var).await
        }
        None => {
            state
                .storage
                .insert_env_var(StoredEnvVar {
                    id: Uuid::new_v4(),
                    project_id: source.project_id,
                    service_id: source.service_id,
                    key_name: source.key_name.clone(),
                    encrypted_value,
                    environment: env,
                    is_secret: source.is_secret,
                    description: source.description.clone(),
                    created_at: now,
                    updated_at: now,
                })
                .await
        }
    };

    written.map(|()| action).map_err(|e| (action, ApiError::from(e)))
}

async fn delete_from_targets(
    state: &AppState,
    request: &ResolveConflictRequest,
    key_name: &KeyName,
    targets: &[Environment],
) -> Vec<TargetResult> {
    let mut results = Vec::with_capacity(targets.len());
    for &env in targets {
        let result = match state
            .storage
            .delete_env_var_slot(
                request.project_id,
                key_name.as_str(),
                env,
                request.service_id,
            )
            .await
        {
            Ok(0) => TargetResult {
                env,
                action: TargetOutcome::Skipped,
                error: None,
            },
            Ok(_) => TargetResult {
                env,
                action: TargetOutcome::Deleted,
                error: None,
            },
            Err(e) => {
                tracing::error!(environment = %env, error = %e, "failed to delete variable");
                TargetResult {
                    env,
                    action: TargetOutcome::Deleted,
                    error: Some("delete failed".to_string()),
                }
            }
        };
        results.push(result);
    }
    results
}
