use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::domain::{AuditLog, LogId};
use super::repository::{AuditLogRepository, RepositoryError};

/// Default cap for the limited audit queries.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// Action tags written by the intake workflow.
pub mod actions {
    pub const SUBMIT_REQUEST: &str = "SUBMIT_REQUEST";
    pub const SUBMIT_REQUEST_ERROR: &str = "SUBMIT_REQUEST_ERROR";
    pub const UPDATE_STATUS: &str = "UPDATE_STATUS";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub user_id: String,
    pub action: String,
    pub details: String,
    pub ip_address: Option<String>,
}

impl AuditEvent {
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            details: details.into(),
            ip_address: None,
        }
    }

    pub fn from_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    logs: Arc<dyn AuditLogRepository>,
}

impl AuditRecorder {
    pub fn new(logs: Arc<dyn AuditLogRepository>) -> Self {
        Self { logs }
    }

    /// Append one entry. Never fails: a storage error is logged and dropped so the
    /// triggering operation carries on.
    pub async fn log_event(&self, event: AuditEvent) {
        let entry = AuditLog {
            log_id: LogId::generate(),
            user_id: event.user_id,
            action: event.action,
            timestamp: Utc::now(),
            details: event.details,
            ip_address: event.ip_address,
        };
        let log_id = entry.log_id.clone();
        let action = entry.action.clone();

        match self.logs.append_log(entry).await {
            Ok(()) => info!(%log_id, %action, "audit log recorded"),
            Err(err) => error!(%log_id, %action, error = %err, "error recording audit log"),
        }
    }

    pub async fn logs_by_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT);
        self.logs.logs_for_user(user_id, limit).await.map_err(|err| {
            error!(user_id, error = %err, "error fetching audit logs by user");
            err
        })
    }

    pub async fn logs_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        self.logs.logs_between(start, end).await.map_err(|err| {
            error!(%start, %end, error = %err, "error fetching audit logs by date range");
            err
        })
    }

    pub async fn logs_by_action(
        &self,
        action: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT);
        self.logs.logs_for_action(action, limit).await.map_err(|err| {
            error!(action, error = %err, "error fetching audit logs by action");
            err
        })
    }
}
