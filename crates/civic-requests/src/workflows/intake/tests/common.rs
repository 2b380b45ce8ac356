use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::workflows::intake::domain::{
    AuditLog, ImageMetadata, Notification, RequestId, RequestStatus, RequestSubmission,
    ServiceRequest, StatusChange,
};
use crate::workflows::intake::mailer::{MailError, MailTransport, OutgoingEmail};
use crate::workflows::intake::repository::{
    AuditLogRepository, CitizenDirectory, NotificationRepository, RepositoryError,
    ServiceRequestRepository,
};
use crate::workflows::intake::service::{IntakeDependencies, ServiceRequestWorkflow};

pub(super) const CITIZEN: &str = "citizen-17";
pub(super) const CITIZEN_EMAIL: &str = "abebe@example.org";
pub(super) const STAFF: &str = "admin";
pub(super) const STAFF_EMAIL: &str = "desk@city.example.org";

pub(super) fn submission() -> RequestSubmission {
    RequestSubmission {
        title: "Pothole on Main St".to_string(),
        description: None,
        category: "Road Maintenance".to_string(),
        region: "Addis Ababa Region".to_string(),
        city: "Bole".to_string(),
        house_number: None,
        user_id: CITIZEN.to_string(),
        image: None,
    }
}

pub(super) fn png_image(size_bytes: u64) -> ImageMetadata {
    ImageMetadata {
        content_type: "image/png".to_string(),
        size_bytes,
        path: "/uploads/image-1-2.png".to_string(),
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

/// In-memory stand-in for every intake repository, with per-table outage switches.
#[derive(Default)]
pub(super) struct MemoryStore {
    pub(super) requests: Mutex<HashMap<RequestId, ServiceRequest>>,
    pub(super) emails: Mutex<HashMap<String, String>>,
    pub(super) resolved: Mutex<HashMap<String, i64>>,
    pub(super) logs: Mutex<Vec<AuditLog>>,
    pub(super) notifications: Mutex<Vec<Notification>>,
    pub(super) requests_offline: AtomicBool,
    pub(super) audit_offline: AtomicBool,
    pub(super) notifications_offline: AtomicBool,
    pub(super) directory_offline: AtomicBool,
    pub(super) counter_offline: AtomicBool,
    pub(super) status_writes: Mutex<usize>,
}

impl MemoryStore {
    pub(super) fn with_people() -> Self {
        let store = Self::default();
        store.add_citizen(CITIZEN, CITIZEN_EMAIL);
        store.add_user(STAFF, STAFF_EMAIL);
        store
    }

    pub(super) fn add_user(&self, user_id: &str, email: &str) {
        self.emails
            .lock()
            .expect("email mutex poisoned")
            .insert(user_id.to_string(), email.to_string());
    }

    pub(super) fn add_citizen(&self, user_id: &str, email: &str) {
        self.add_user(user_id, email);
        self.resolved
            .lock()
            .expect("counter mutex poisoned")
            .insert(user_id.to_string(), 0);
    }

    pub(super) fn resolved_count(&self, user_id: &str) -> i64 {
        self.resolved
            .lock()
            .expect("counter mutex poisoned")
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }

    pub(super) fn audit_actions(&self) -> Vec<String> {
        self.logs
            .lock()
            .expect("log mutex poisoned")
            .iter()
            .map(|log| log.action.clone())
            .collect()
    }

    pub(super) fn audit_entries(&self) -> Vec<AuditLog> {
        self.logs.lock().expect("log mutex poisoned").clone()
    }

    pub(super) fn stored_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }

    pub(super) fn request_count(&self) -> usize {
        self.requests.lock().expect("request mutex poisoned").len()
    }

    pub(super) fn status_write_count(&self) -> usize {
        *self.status_writes.lock().expect("write mutex poisoned")
    }

    pub(super) fn seed_request(&self, record: ServiceRequest) {
        self.requests
            .lock()
            .expect("request mutex poisoned")
            .insert(record.request_id.clone(), record);
    }

    pub(super) fn seed_log(&self, entry: AuditLog) {
        self.logs.lock().expect("log mutex poisoned").push(entry);
    }

    pub(super) fn take_offline(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn is_offline(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

fn newest_first_logs(mut logs: Vec<AuditLog>) -> Vec<AuditLog> {
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    logs
}

#[async_trait]
impl ServiceRequestRepository for MemoryStore {
    async fn insert_request(
        &self,
        record: ServiceRequest,
    ) -> Result<ServiceRequest, RepositoryError> {
        if Self::is_offline(&self.requests_offline) {
            return Err(offline());
        }
        self.seed_request(record.clone());
        Ok(record)
    }

    async fn fetch_request(
        &self,
        id: &RequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError> {
        if Self::is_offline(&self.requests_offline) {
            return Err(offline());
        }
        Ok(self
            .requests
            .lock()
            .expect("request mutex poisoned")
            .get(id)
            .cloned())
    }

    async fn requests_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        if Self::is_offline(&self.requests_offline) {
            return Err(offline());
        }
        let mut records: Vec<_> = self
            .requests
            .lock()
            .expect("request mutex poisoned")
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.submission_date.cmp(&a.submission_date));
        Ok(records)
    }

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        resolution_date: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusChange>, RepositoryError> {
        // Suspend first so concurrent callers interleave before either one writes.
        tokio::task::yield_now().await;
        if Self::is_offline(&self.requests_offline) {
            return Err(offline());
        }
        let mut guard = self.requests.lock().expect("request mutex poisoned");
        let Some(record) = guard.get_mut(id) else {
            return Ok(None);
        };
        *self.status_writes.lock().expect("write mutex poisoned") += 1;
        let previous = record.status;
        record.status = status;
        record.resolution_date = resolution_date;
        Ok(Some(StatusChange {
            previous,
            record: record.clone(),
        }))
    }
}

#[async_trait]
impl CitizenDirectory for MemoryStore {
    async fn contact_email(&self, user_id: &str) -> Result<Option<String>, RepositoryError> {
        if Self::is_offline(&self.directory_offline) {
            return Err(offline());
        }
        Ok(self
            .emails
            .lock()
            .expect("email mutex poisoned")
            .get(user_id)
            .cloned())
    }

    async fn increment_resolved(&self, user_id: &str) -> Result<(), RepositoryError> {
        if Self::is_offline(&self.counter_offline) {
            return Err(offline());
        }
        if let Some(count) = self
            .resolved
            .lock()
            .expect("counter mutex poisoned")
            .get_mut(user_id)
        {
            *count += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for MemoryStore {
    async fn append_log(&self, entry: AuditLog) -> Result<(), RepositoryError> {
        if Self::is_offline(&self.audit_offline) {
            return Err(offline());
        }
        self.seed_log(entry);
        Ok(())
    }

    async fn logs_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        if Self::is_offline(&self.audit_offline) {
            return Err(offline());
        }
        let logs = self
            .audit_entries()
            .into_iter()
            .filter(|log| log.user_id == user_id)
            .collect();
        Ok(newest_first_logs(logs).into_iter().take(limit).collect())
    }

    async fn logs_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        if Self::is_offline(&self.audit_offline) {
            return Err(offline());
        }
        let logs = self
            .audit_entries()
            .into_iter()
            .filter(|log| log.timestamp >= start && log.timestamp <= end)
            .collect();
        Ok(newest_first_logs(logs))
    }

    async fn logs_for_action(
        &self,
        action: &str,
        limit: usize,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        if Self::is_offline(&self.audit_offline) {
            return Err(offline());
        }
        let logs = self
            .audit_entries()
            .into_iter()
            .filter(|log| log.action == action)
            .collect();
        Ok(newest_first_logs(logs).into_iter().take(limit).collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<(), RepositoryError> {
        if Self::is_offline(&self.notifications_offline) {
            return Err(offline());
        }
        self.notifications
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }

    async fn unread_notifications(
        &self,
        recipient_id: &str,
    ) -> Result<Vec<Notification>, RepositoryError> {
        if Self::is_offline(&self.notifications_offline) {
            return Err(offline());
        }
        let mut unread: Vec<_> = self
            .stored_notifications()
            .into_iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .collect();
        unread.sort_by(|a, b| b.sent_date.cmp(&a.sent_date));
        Ok(unread)
    }
}

/// Mail transport that keeps every message, or refuses them all when `failing`.
#[derive(Default)]
pub(super) struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub(super) fn failing() -> Self {
        let mailer = Self::default();
        mailer.failing.store(true, Ordering::SeqCst);
        mailer
    }

    pub(super) fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("mail mutex poisoned").clone()
    }
}

#[async_trait]
impl MailTransport for MemoryMailer {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            let source = "relay refused"
                .parse::<lettre::Address>()
                .expect_err("not a mail address");
            return Err(MailError::Address {
                address: email.to,
                source,
            });
        }
        self.sent.lock().expect("mail mutex poisoned").push(email);
        Ok(())
    }
}

pub(super) fn build_workflow() -> (ServiceRequestWorkflow, Arc<MemoryStore>, Arc<MemoryMailer>) {
    build_workflow_with(MemoryStore::with_people(), MemoryMailer::default())
}

pub(super) fn build_workflow_with(
    store: MemoryStore,
    mailer: MemoryMailer,
) -> (ServiceRequestWorkflow, Arc<MemoryStore>, Arc<MemoryMailer>) {
    let store = Arc::new(store);
    let mailer = Arc::new(mailer);
    let deps = IntakeDependencies::from_store(store.clone(), mailer.clone());
    (ServiceRequestWorkflow::new(deps, STAFF), store, mailer)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
