//! Health handler

use crate::api::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: String,
    pub storage_backend: &'static str,
    pub uptime_secs: i64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok",
        service: "linkmap",
        version: state.version.clone(),
        storage_backend: state.storage.backend_label(),
        uptime_secs: state.uptime_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = TestApp::new().await;
        let (status, body) = app.send("GET", "/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage_backend"], "memory");
    }
}
