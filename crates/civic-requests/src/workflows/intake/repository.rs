use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    AuditLog, Notification, RequestId, RequestStatus, ServiceRequest, StatusChange,
};

/// Storage for service request rows.
#[async_trait]
pub trait ServiceRequestRepository: Send + Sync {
    async fn insert_request(&self, record: ServiceRequest)
        -> Result<ServiceRequest, RepositoryError>;

    async fn fetch_request(&self, id: &RequestId)
        -> Result<Option<ServiceRequest>, RepositoryError>;

    /// All requests owned by `user_id`, newest submission first.
    async fn requests_for_user(&self, user_id: &str)
        -> Result<Vec<ServiceRequest>, RepositoryError>;

    /// Writes `status` and `resolution_date` together and reports the status the row held
    /// right before this write, read under the same row lock. `None` when the row is missing.
    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        resolution_date: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusChange>, RepositoryError>;
}

/// Contact details and bookkeeping for users (citizens and staff).
#[async_trait]
pub trait CitizenDirectory: Send + Sync {
    async fn contact_email(&self, user_id: &str) -> Result<Option<String>, RepositoryError>;

    async fn increment_resolved(&self, user_id: &str) -> Result<(), RepositoryError>;
}

/// Append-only audit trail. Queries return newest entries first.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append_log(&self, entry: AuditLog) -> Result<(), RepositoryError>;

    async fn logs_for_user(&self, user_id: &str, limit: usize)
        -> Result<Vec<AuditLog>, RepositoryError>;

    async fn logs_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditLog>, RepositoryError>;

    async fn logs_for_action(&self, action: &str, limit: usize)
        -> Result<Vec<AuditLog>, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: Notification)
        -> Result<(), RepositoryError>;

    /// Unread notifications for a recipient, newest first.
    async fn unread_notifications(&self, recipient_id: &str)
        -> Result<Vec<Notification>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Pool exhausted or connection lost; callers may retry.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("stored row could not be decoded: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}
