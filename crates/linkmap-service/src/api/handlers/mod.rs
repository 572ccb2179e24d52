//! API request handlers

mod conflicts;
mod env_vars;
mod health;
mod projects;

pub use conflicts::*;
pub use env_vars::*;
pub use health::*;
pub use projects::*;

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::Project;
use crate::storage::ProjectStorage;
use uuid::Uuid;

/// Parse a project id supplied by the client.
pub(crate) fn parse_project_id(raw: Option<&str>) -> ApiResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ApiError::BadRequest("project_id is required".to_string()))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid project_id".to_string()))
}

/// Load a project the caller owns; anything else is reported as not found.
pub(crate) async fn require_owned_project(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Project> {
    state
        .storage
        .find_owned_project(project_id, user_id)
        .await?
        .ok_or_else(ApiError::project_not_found)
}
