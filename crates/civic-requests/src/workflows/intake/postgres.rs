//! PostgreSQL-backed implementation of the intake repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{error, info};

use super::domain::{
    AuditLog, Category, LogId, Notification, NotificationId, NotificationKind, Priority,
    RequestId, RequestStatus, ServiceRequest, StatusChange,
};
use super::repository::{
    AuditLogRepository, CitizenDirectory, NotificationRepository, RepositoryError,
    ServiceRequestRepository,
};
use crate::config::DatabaseConfig;

/// Single store over a bounded pool; cheap to clone.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open the pool and verify one connection can be acquired.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|err| {
                error!(error = %err, host = %config.host, "error connecting to PostgreSQL");
                err
            })?;

        info!(host = %config.host, database = %config.name, "connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => RepositoryError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepositoryError::Corrupt(err.to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceRequestRow {
    request_id: String,
    title: String,
    description: String,
    category: String,
    status: String,
    priority: String,
    location: String,
    image_path: Option<String>,
    user_id: String,
    submission_date: DateTime<Utc>,
    resolution_date: Option<DateTime<Utc>>,
}

impl TryFrom<ServiceRequestRow> for ServiceRequest {
    type Error = RepositoryError;

    fn try_from(row: ServiceRequestRow) -> Result<Self, Self::Error> {
        Ok(ServiceRequest {
            category: Category::parse(&row.category)
                .ok_or_else(|| corrupt("category", &row.category))?,
            status: RequestStatus::parse(&row.status)
                .ok_or_else(|| corrupt("status", &row.status))?,
            priority: Priority::parse(&row.priority)
                .ok_or_else(|| corrupt("priority", &row.priority))?,
            request_id: RequestId(row.request_id),
            title: row.title,
            description: row.description,
            location: row.location,
            image_path: row.image_path,
            user_id: row.user_id,
            submission_date: row.submission_date,
            resolution_date: row.resolution_date,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusUpdateRow {
    previous_status: String,
    #[sqlx(flatten)]
    request: ServiceRequestRow,
}

impl TryFrom<StatusUpdateRow> for StatusChange {
    type Error = RepositoryError;

    fn try_from(row: StatusUpdateRow) -> Result<Self, Self::Error> {
        Ok(StatusChange {
            previous: RequestStatus::parse(&row.previous_status)
                .ok_or_else(|| corrupt("status", &row.previous_status))?,
            record: row.request.try_into()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    log_id: String,
    user_id: String,
    action: String,
    timestamp: DateTime<Utc>,
    details: String,
    ip_address: Option<String>,
}

impl From<AuditLogRow> for AuditLog {
    fn from(row: AuditLogRow) -> Self {
        AuditLog {
            log_id: LogId(row.log_id),
            user_id: row.user_id,
            action: row.action,
            timestamp: row.timestamp,
            details: row.details,
            ip_address: row.ip_address,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    notification_id: String,
    recipient_id: String,
    message: String,
    kind: String,
    sent_date: DateTime<Utc>,
    is_read: bool,
    request_id: Option<String>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            kind: NotificationKind::parse(&row.kind).ok_or_else(|| corrupt("type", &row.kind))?,
            notification_id: NotificationId(row.notification_id),
            recipient_id: row.recipient_id,
            message: row.message,
            sent_date: row.sent_date,
            is_read: row.is_read,
            request_id: row.request_id.map(RequestId),
        })
    }
}

fn corrupt(column: &str, value: &str) -> RepositoryError {
    RepositoryError::Corrupt(format!("unexpected {column} value '{value}'"))
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

const REQUEST_COLUMNS: &str = "request_id, title, description, category, status, priority, \
     location, image_path, user_id, submission_date, resolution_date";

#[async_trait]
impl ServiceRequestRepository for PgStore {
    async fn insert_request(
        &self,
        record: ServiceRequest,
    ) -> Result<ServiceRequest, RepositoryError> {
        let row = sqlx::query_as::<_, ServiceRequestRow>(&format!(
            r#"
            INSERT INTO service_requests
                (request_id, title, description, category, status, priority,
                 submission_date, location, image_path, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(record.request_id.as_str())
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.category.label())
        .bind(record.status.label())
        .bind(record.priority.label())
        .bind(record.submission_date)
        .bind(&record.location)
        .bind(&record.image_path)
        .bind(&record.user_id)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn fetch_request(
        &self,
        id: &RequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError> {
        sqlx::query_as::<_, ServiceRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests WHERE request_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(ServiceRequest::try_from)
        .transpose()
    }

    async fn requests_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        sqlx::query_as::<_, ServiceRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests \
             WHERE user_id = $1 ORDER BY submission_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ServiceRequest::try_from)
        .collect()
    }

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        resolution_date: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusChange>, RepositoryError> {
        // The row lock makes a concurrent writer wait and then read the committed status.
        sqlx::query_as::<_, StatusUpdateRow>(&format!(
            r#"
            UPDATE service_requests SET status = $1, resolution_date = $2
            FROM (
                SELECT request_id AS prior_id, status AS previous_status
                FROM service_requests WHERE request_id = $3
                FOR UPDATE
            ) AS prior
            WHERE service_requests.request_id = prior.prior_id
            RETURNING prior.previous_status, {REQUEST_COLUMNS}
            "#
        ))
        .bind(status.label())
        .bind(resolution_date)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(StatusChange::try_from)
        .transpose()
    }
}

#[async_trait]
impl CitizenDirectory for PgStore {
    async fn contact_email(&self, user_id: &str) -> Result<Option<String>, RepositoryError> {
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(email)
    }

    async fn increment_resolved(&self, user_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE citizens SET total_requests_resolved = total_requests_resolved + 1 \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for PgStore {
    async fn append_log(&self, entry: AuditLog) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (log_id, user_id, action, timestamp, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.log_id.as_str())
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(entry.timestamp)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn logs_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE user_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLog::from).collect())
    }

    async fn logs_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE timestamp >= $1 AND timestamp <= $2 \
             ORDER BY timestamp DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLog::from).collect())
    }

    async fn logs_for_action(
        &self,
        action: &str,
        limit: usize,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE action = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(action)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLog::from).collect())
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, notification: Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (notification_id, recipient_id, message, kind, sent_date, is_read, request_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.notification_id.as_str())
        .bind(&notification.recipient_id)
        .bind(&notification.message)
        .bind(notification.kind.label())
        .bind(notification.sent_date)
        .bind(notification.is_read)
        .bind(notification.request_id.as_ref().map(RequestId::as_str))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unread_notifications(
        &self,
        recipient_id: &str,
    ) -> Result<Vec<Notification>, RepositoryError> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE recipient_id = $1 AND is_read = false \
             ORDER BY sent_date DESC",
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }
}
