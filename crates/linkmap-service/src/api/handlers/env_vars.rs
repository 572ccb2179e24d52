//! Environment variable handlers

use super::{parse_project_id, require_owned_project};
use crate::api::state::AppState;
use crate::audit::log_audit;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::model::{AuditAction, StoredEnvVar};
use crate::storage::EnvVarStorage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use linkmap_core::{mask_value, parse_content, Environment, KeyName};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const DESCRIPTION_MAX_LEN: usize = 500;

/// Query string carrying the project scope
#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

/// Variable as returned to clients; secrets are masked
#[derive(Debug, Serialize)]
pub struct EnvVarView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub service_id: Option<Uuid>,
    pub key_name: String,
    pub value: String,
    pub environment: Environment,
    pub is_secret: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEnvVarRequest {
    pub project_id: Uuid,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    pub key_name: String,
    pub value: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_secret")]
    pub is_secret: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportEnvRequest {
    pub project_id: Uuid,
    #[serde(default)]
    pub environment: Environment,
    pub content: String,
    #[serde(default = "default_secret")]
    pub is_secret: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportEnvResponse {
    pub created: usize,
    pub updated: usize,
}

fn default_secret() -> bool {
    true
}

fn view(state: &AppState, var: StoredEnvVar) -> EnvVarView {
    let plain = state
        .secrets
        .decrypt(&var.encrypted_value)
        .unwrap_or_else(|e| {
            tracing::warn!(var_id = %var.id, error = %e, "failed to decrypt variable");
            String::new()
        });
    let value = if var.is_secret {
        mask_value(&plain)
    } else {
        plain
    };

    EnvVarView {
        id: var.id,
        project_id: var.project_id,
        service_id: var.service_id,
        key_name: var.key_name,
        value,
        environment: var.environment,
        is_secret: var.is_secret,
        description: var.description,
        created_at: var.created_at,
        updated_at: var.updated_at,
    }
}

/// List variables of a project
pub async fn list_env_vars(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Vec<EnvVarView>>> {
    let project_id = parse_project_id(query.project_id.as_deref())?;
    require_owned_project(&state, project_id, user.user_id).await?;

    let vars = state.storage.list_env_vars(project_id).await?;
    Ok(Json(vars.into_iter().map(|var| view(&state, var)).collect()))
}

/// Create a variable
pub async fn create_env_var(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateEnvVarRequest>,
) -> ApiResult<(StatusCode, Json<EnvVarView>)> {
    let key_name = KeyName::parse(request.key_name.trim())?;
    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if description
        .as_ref()
        .is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_LEN)
    {
        return Err(ApiError::BadRequest(format!(
            "description must be at most {DESCRIPTION_MAX_LEN} characters"
        )));
    }

    require_owned_project(&state, request.project_id, user.user_id).await?;

    let now = Utc::now();
    let var = StoredEnvVar {
        id: Uuid::new_v4(),
        project_id: request.project_id,
        service_id: request.service_id,
        key_name: key_name.into(),
        encrypted_value: state.secrets.encrypt(&request.value)?,
        environment: request.environment,
        is_secret: request.is_secret,
        description,
        created_at: now,
        updated_at: now,
    };
    state.storage.insert_env_var(var.clone()).await?;

    log_audit(
        state.storage.as_ref(),
        user.user_id,
        AuditAction::EnvVarCreate,
        "env_var",
        Some(var.id.to_string()),
        json!({
            "project_id": var.project_id,
            "key_name": var.key_name,
            "environment": var.environment,
        }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(view(&state, var))))
}

/// Delete a variable
pub async fn delete_env_var(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let not_found = || ApiError::NotFound("environment variable not found".to_string());
    let var = state.storage.get_env_var(id).await?.ok_or_else(not_found)?;
    require_owned_project(&state, var.project_id, user.user_id)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => not_found(),
            other => other,
        })?;

    if !state.storage.delete_env_var(id).await? {
        return Err(not_found());
    }

    log_audit(
        state.storage.as_ref(),
        user.user_id,
        AuditAction::EnvVarDelete,
        "env_var",
        Some(id.to_string()),
        json!({
            "project_id": var.project_id,
            "key_name": var.key_name,
            "environment": var.environment,
        }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Import dotenv content into one environment, updating existing keys
pub async fn import_env_vars(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ImportEnvRequest>,
) -> ApiResult<Json<ImportEnvResponse>> {
    require_owned_project(&state, request.project_id, user.user_id).await?;

    let parsed = parse_content(&request.content);
    if parsed.is_empty() {
        return Err(ApiError::BadRequest(
            "no valid environment variables found".to_string(),
        ));
    }

    let mut created = 0;
    let mut updated = 0;
    for entry in parsed {
        let encrypted_value = state.secrets.encrypt(&entry.value)?;
        let now = Utc::now();
        let existing = state
            .storage
            .find_env_var(request.project_id, &entry.key, request.environment, None)
            .await?;

        match existing {
            Some(mut var) => {
                var.encrypted_value = encrypted_value;
                var.is_secret = request.is_secret;
                var.updated_at = now;
                state.storage.update_env_var(var).await?;
                updated += 1;
            }
            None => {
                state
                    .storage
                    .insert_env_var(StoredEnvVar {
                        id: Uuid::new_v4(),
                        project_id: request.project_id,
                        service_id: None,
                        key_name: entry.key,
                        encrypted_value,
                        environment: request.environment,
                        is_secret: request.is_secret,
                        description: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                created += 1;
            }
        }
    }

    tracing::info!(
        project_id = %request.project_id,
        environment = %request.environment,
        created,
        updated,
        "imported environment variables"
    );
    log_audit(
        state.storage.as_ref(),
        user.user_id,
        AuditAction::EnvVarImport,
        "project",
        Some(request.project_id.to_string()),
        json!({
            "environment": request.environment,
            "created": created,
            "updated": updated,
        }),
    )
    .await;

    Ok(Json(ImportEnvResponse { created, updated }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{TestApp, OTHER_TOKEN, TOKEN};
    use crate::storage::EnvVarStorage;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn create_masks_secret_and_shows_plain_value() {
        let app = TestApp::new().await;
        let project = app.project(app.user_id).await;

        let (status, secret) = app
            .send(
                "POST",
                "/api/env",
                Some(TOKEN),
                Some(json!({
                    "project_id": project.id,
                    "key_name": "STRIPE_KEY",
                    "value": "sk_live_abcdefgh",
                    "environment": "production",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(secret["value"], "sk_l••••••••••••");

        app.send(
            "POST",
            "/api/env",
            Some(TOKEN),
            Some(json!({
                "project_id": project.id,
                "key_name": "API_URL",
                "value": "https://api.example.com",
                "is_secret": false,
            })),
        )
        .await;

        let (status, listed) = app
            .send(
                "GET",
                &format!("/api/env?project_id={}", project.id),
                Some(TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["key_name"], "API_URL");
        assert_eq!(listed[0]["value"], "https://api.example.com");
        assert_eq!(listed[0]["environment"], "development");
        assert_eq!(listed[1]["value"], "sk_l••••••••••••");
    }

    #[tokio::test]
    async fn undecryptable_values_list_as_empty() {
        let app = TestApp::new().await;
        let project = app.project(app.user_id).await;
        let now = chrono::Utc::now();
        for (key, is_secret) in [("BROKEN_SECRET", true), ("BROKEN_PLAIN", false)] {
            app.storage
                .insert_env_var(crate::model::StoredEnvVar {
                    id: uuid::Uuid::new_v4(),
                    project_id: project.id,
                    service_id: None,
                    key_name: key.to_string(),
                    encrypted_value: "not-an-envelope".to_string(),
                    environment: linkmap_core::Environment::Staging,
                    is_secret,
                    description: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let (status, listed) = app
            .send(
                "GET",
                &format!("/api/env?project_id={}", project.id),
                Some(TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed[0]["key_name"], "BROKEN_PLAIN");
        assert_eq!(listed[0]["value"], "");
        assert_eq!(listed[1]["key_name"], "BROKEN_SECRET");
        assert_eq!(listed[1]["value"], "••••");
    }

    #[tokio::test]
    async fn duplicate_slot_is_a_conflict() {
        let app = TestApp::new().await;
        let project = app.project(app.user_id).await;
        let body = json!({
            "project_id": project.id,
            "key_name": "PORT",
            "value": "8080",
        });

        let (status, _) = app
            .send("POST", "/api/env", Some(TOKEN), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, error) = app.send("POST", "/api/env", Some(TOKEN), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn invalid_key_name_is_rejected() {
        let app = TestApp::new().await;
        let project = app.project(app.user_id).await;
        let (status, _) = app
            .send(
                "POST",
                "/api/env",
                Some(TOKEN),
                Some(json!({
                    "project_id": project.id,
                    "key_name": "lower-case",
                    "value": "x",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let app = TestApp::new().await;
        let project = app.project(app.user_id).await;
        let (_, created) = app
            .send(
                "POST",
                "/api/env",
                Some(TOKEN),
                Some(json!({
                    "project_id": project.id,
                    "key_name": "PORT",
                    "value": "8080",
                })),
            )
            .await;
        let uri = format!("/api/env/{}", created["id"].as_str().unwrap());

        let (status, _) = app.send("DELETE", &uri, Some(OTHER_TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.send("DELETE", &uri, Some(TOKEN), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.send("DELETE", &uri, Some(TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn import_creates_then_updates() {
        let app = TestApp::new().await;
        let project = app.project(app.user_id).await;
        let content = "# comment\nDATABASE_URL=\"postgres://db\"\napi-key=abc\n\n1BAD=x\n";

        let (status, body) = app
            .send(
                "POST",
                "/api/env/import",
                Some(TOKEN),
                Some(json!({
                    "project_id": project.id,
                    "environment": "staging",
                    "content": content,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "created": 2, "updated": 0 }));

        let (_, body) = app
            .send(
                "POST",
                "/api/env/import",
                Some(TOKEN),
                Some(json!({
                    "project_id": project.id,
                    "environment": "staging",
                    "content": "API_KEY=def",
                })),
            )
            .await;
        assert_eq!(body, json!({ "created": 0, "updated": 1 }));

        let (status, _) = app
            .send(
                "POST",
                "/api/env/import",
                Some(TOKEN),
                Some(json!({
                    "project_id": project.id,
                    "content": "# nothing here",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
