use serde::Serialize;
use tracing::{info, info_span};

/// Domain event for audit logging.
/// Structured for JSON serialization to enable machine-readable audit trails.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Engine process started.
    SystemStartup {
        /// Component name.
        component: String,
    },
    /// Engine process shutting down.
    SystemShutdown {
        /// Shutdown reason.
        reason: String,
    },
    /// A batch task was admitted.
    TaskSubmitted {
        /// Task ID.
        task_id: String,
        /// Number of items in the batch.
        file_count: usize,
    },
    /// Retention cleanup removed terminal tasks.
    TasksPurged {
        /// Number of purged tasks.
        purged: usize,
        /// Age threshold used, in hours.
        max_age_hours: i64,
    },
}

/// Logs an audit event to the dedicated audit channel as structured JSON.
/// This uses a specific `target` which can be filtered by the subscriber to redirect to a secure file.
pub fn log_audit(event: &AuditEvent) {
    let span = info_span!(target: "audit", "audit_event");
    let _enter = span.enter();

    // Serialize to JSON for machine-readable audit logs
    let json = serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
    info!(target: "audit", audit_json = %json, "Audit Event");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_audit_variants() {
        // These calls should not panic
        log_audit(&AuditEvent::SystemStartup {
            component: "Test".into(),
        });
        log_audit(&AuditEvent::SystemShutdown {
            reason: "Testing".into(),
        });
        log_audit(&AuditEvent::TaskSubmitted {
            task_id: "task-1".into(),
            file_count: 3,
        });
        log_audit(&AuditEvent::TasksPurged {
            purged: 2,
            max_age_hours: 24,
        });
    }
}
