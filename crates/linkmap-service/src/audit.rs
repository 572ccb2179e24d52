//! Audit trail helper

use crate::model::{AuditAction, AuditEvent};
use crate::storage::{AuditStorage, Storage};
use chrono::Utc;
use uuid::Uuid;

/// Append an audit event. Failures are logged and never reach the caller.
pub async fn log_audit(
    storage: &dyn Storage,
    user_id: Uuid,
    action: AuditAction,
    resource_type: &str,
    resource_id: Option<String>,
    details: serde_json::Value,
) {
    let event = AuditEvent {
        id: Uuid::new_v4(),
        user_id,
        action,
        resource_type: resource_type.to_string(),
        resource_id,
        details,
        created_at: Utc::now(),
    };

    if let Err(e) = storage.append_audit(event).await {
        tracing::error!(
            error = %e,
            action = action.as_str(),
            user_id = %user_id,
            "failed to record audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    #[tokio::test]
    async fn records_event_for_user() {
        let storage = InMemoryStorage::new();
        let user = Uuid::new_v4();

        log_audit(
            &storage,
            user,
            AuditAction::EnvVarConflictScan,
            "project",
            Some("p1".to_string()),
            json!({ "conflict_count": 2 }),
        )
        .await;

        let events = storage.list_audit_for_user(user, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::EnvVarConflictScan);
        assert_eq!(events[0].details["conflict_count"], 2);
    }
}
