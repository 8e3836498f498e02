//! Audit trail for session mutations

use async_trait::async_trait;
use serde::Serialize;

/// One audited change with the state before and after it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub actor: String,
    pub project_id: String,
    pub resource_type: &'static str,
    pub resource_id: String,
    pub action: &'static str,
    pub before: Option<serde_json::Value>,
    pub after: serde_json::Value,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Writes audit records as structured `info` events
#[derive(Debug, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, record: AuditRecord) {
        let before = record
            .before
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        tracing::info!(
            target: "sessionscope::audit",
            actor = %record.actor,
            project_id = %record.project_id,
            resource_type = record.resource_type,
            resource_id = %record.resource_id,
            action = record.action,
            before = %before,
            after = %record.after,
            "Audit"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_audit_log_accepts_records() {
        TracingAuditLog
            .record(AuditRecord {
                actor: "alice".to_string(),
                project_id: "p".to_string(),
                resource_type: "session",
                resource_id: "s-1".to_string(),
                action: "bookmark",
                before: None,
                after: serde_json::json!({"bookmarked": true}),
            })
            .await;
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = AuditRecord {
            actor: "alice".to_string(),
            project_id: "p".to_string(),
            resource_type: "session",
            resource_id: "s-1".to_string(),
            action: "publish",
            before: Some(serde_json::json!({"public": false})),
            after: serde_json::json!({"public": true}),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["resourceId"], "s-1");
        assert_eq!(json["before"]["public"], false);
    }
}
