//! Project handlers

use crate::api::state::AppState;
use crate::audit::log_audit;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::model::{AuditAction, Project};
use crate::storage::ProjectStorage;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::json;

const PROJECT_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// List projects owned by the caller
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = state.storage.list_projects_for_owner(user.user_id).await?;
    Ok(Json(projects))
}

/// Create a project
pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("project name is required".to_string()));
    }
    if name.chars().count() > PROJECT_NAME_MAX_LEN {
        return Err(ApiError::BadRequest(format!(
            "project name must be at most {PROJECT_NAME_MAX_LEN} characters"
        )));
    }

    let project = Project::new(user.user_id, name);
    state.storage.insert_project(project.clone()).await?;

    tracing::info!(project_id = %project.id, user_id = %user.user_id, "created project");
    log_audit(
        state.storage.as_ref(),
        user.user_id,
        AuditAction::ProjectCreate,
        "project",
        Some(project.id.to_string()),
        json!({ "name": project.name }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(project)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{TestApp, OTHER_TOKEN, TOKEN};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn create_then_list_only_own_projects() {
        let app = TestApp::new().await;

        let (status, created) = app
            .send(
                "POST",
                "/api/projects",
                Some(TOKEN),
                Some(json!({ "name": "  storefront " })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "storefront");

        let (_, mine) = app.send("GET", "/api/projects", Some(TOKEN), None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);

        let (_, theirs) = app
            .send("GET", "/api/projects", Some(OTHER_TOKEN), None)
            .await;
        assert!(theirs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(
                "POST",
                "/api/projects",
                Some(TOKEN),
                Some(json!({ "name": "   " })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}
