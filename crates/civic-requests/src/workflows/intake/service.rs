use std::sync::Arc;

use tracing::{error, info};

use super::audit::{actions, AuditEvent, AuditRecorder};
use super::domain::{
    Category, Location, NewServiceRequest, Notification, NotificationKind, RequestId,
    RequestSubmission, ServiceRequest, StatusChange,
};
use super::ledger::{LedgerError, RequestLedger};
use super::mailer::MailTransport;
use super::notifier::{NotificationRequest, Notifier};
use super::repository::{
    AuditLogRepository, CitizenDirectory, NotificationRepository, RepositoryError,
    ServiceRequestRepository,
};
use super::validation::{validate_submission, ValidationReport};

/// External resources the intake workflow is built from.
#[derive(Clone)]
pub struct IntakeDependencies {
    pub requests: Arc<dyn ServiceRequestRepository>,
    pub citizens: Arc<dyn CitizenDirectory>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub mailer: Arc<dyn MailTransport>,
}

impl IntakeDependencies {
    /// Wire every repository to one store implementing all of them.
    pub fn from_store<S>(store: Arc<S>, mailer: Arc<dyn MailTransport>) -> Self
    where
        S: ServiceRequestRepository
            + CitizenDirectory
            + AuditLogRepository
            + NotificationRepository
            + 'static,
    {
        Self {
            requests: store.clone(),
            citizens: store.clone(),
            audit_logs: store.clone(),
            notifications: store,
            mailer,
        }
    }
}

/// Orchestrates validate -> persist -> audit -> notify for citizen submissions.
pub struct ServiceRequestWorkflow {
    ledger: RequestLedger,
    audit: AuditRecorder,
    notifier: Notifier,
    staff_recipient_id: String,
}

impl ServiceRequestWorkflow {
    pub fn new(deps: IntakeDependencies, staff_recipient_id: impl Into<String>) -> Self {
        let ledger = RequestLedger::new(deps.requests, deps.citizens.clone());
        let audit = AuditRecorder::new(deps.audit_logs);
        let notifier = Notifier::new(deps.citizens, deps.notifications, deps.mailer);

        Self {
            ledger,
            audit,
            notifier,
            staff_recipient_id: staff_recipient_id.into(),
        }
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Validate and persist a submission, then record it and alert staff.
    ///
    /// Audit and staff notification run after the request is stored and cannot fail the
    /// submission. A storage failure is audited as `SUBMIT_REQUEST_ERROR` before returning.
    pub async fn submit(
        &self,
        submission: RequestSubmission,
        client_ip: Option<String>,
    ) -> Result<ServiceRequest, WorkflowError> {
        let report = validate_submission(&submission);
        if !report.is_valid() {
            return Err(WorkflowError::Validation(report));
        }

        let user_id = submission.user_id.clone();
        let draft = match draft_from_submission(submission) {
            Some(draft) => draft,
            None => return Err(WorkflowError::Validation(report)),
        };
        let title = draft.title.clone();

        let record = match self.ledger.create_service_request(draft).await {
            Ok(record) => record,
            Err(err) => {
                error!(user_id = %user_id, error = %err, "error submitting service request");
                if !user_id.trim().is_empty() {
                    self.audit
                        .log_event(
                            AuditEvent::new(
                                &user_id,
                                actions::SUBMIT_REQUEST_ERROR,
                                format!("Error: {err}"),
                            )
                            .from_ip(client_ip),
                        )
                        .await;
                }
                return Err(WorkflowError::Repository(err));
            }
        };

        self.audit
            .log_event(
                AuditEvent::new(
                    &user_id,
                    actions::SUBMIT_REQUEST,
                    format!("Service request submitted: {title}"),
                )
                .from_ip(client_ip),
            )
            .await;

        self.notifier
            .send_notification(NotificationRequest {
                recipient_id: self.staff_recipient_id.clone(),
                message: format!("New service request submitted: {title}"),
                kind: NotificationKind::System,
                request_id: Some(record.request_id.clone()),
            })
            .await;

        info!(request_id = %record.request_id, %user_id, "service request submitted");
        Ok(record)
    }

    pub async fn get(&self, request_id: &RequestId) -> Result<ServiceRequest, WorkflowError> {
        self.ledger
            .get_request_by_id(request_id)
            .await
            .map_err(|err| {
                error!(%request_id, error = %err, "error fetching service request");
                WorkflowError::Repository(err)
            })?
            .ok_or_else(|| WorkflowError::NotFound(request_id.clone()))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ServiceRequest>, WorkflowError> {
        self.ledger.get_requests_by_user(user_id).await.map_err(|err| {
            error!(user_id, error = %err, "error fetching user requests");
            WorkflowError::Repository(err)
        })
    }

    /// Apply a staff status change, audit it and email the request owner.
    pub async fn update_status(
        &self,
        request_id: &RequestId,
        status: &str,
        acting_user: &str,
        client_ip: Option<String>,
    ) -> Result<StatusChange, WorkflowError> {
        let change = self
            .ledger
            .update_request_status(request_id, status, acting_user)
            .await?;

        self.audit
            .log_event(
                AuditEvent::new(
                    acting_user,
                    actions::UPDATE_STATUS,
                    format!(
                        "Status of {request_id} changed from {} to {}",
                        change.previous, change.record.status
                    ),
                )
                .from_ip(client_ip),
            )
            .await;

        self.notifier
            .send_notification(NotificationRequest {
                recipient_id: change.record.user_id.clone(),
                message: format!(
                    "Your service request status has been updated to: {}",
                    change.record.status
                ),
                kind: NotificationKind::Email,
                request_id: Some(request_id.clone()),
            })
            .await;

        Ok(change)
    }

    pub async fn unread_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, WorkflowError> {
        self.notifier
            .unread_notifications(user_id)
            .await
            .map_err(WorkflowError::Repository)
    }
}

fn draft_from_submission(submission: RequestSubmission) -> Option<NewServiceRequest> {
    let category = Category::parse(&submission.category)?;
    let house_number = submission
        .house_number
        .map(|house| house.trim().to_string())
        .filter(|house| !house.is_empty());

    Some(NewServiceRequest {
        title: submission.title,
        description: submission.description.unwrap_or_default(),
        category,
        location: Location {
            region: submission.region,
            city: submission.city,
            house_number,
        },
        image_path: submission.image.map(|image| image.path),
        user_id: submission.user_id,
        status: None,
        priority: None,
    })
}

/// Error raised by the intake workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation failed")]
    Validation(ValidationReport),
    #[error("service request {0} not found")]
    NotFound(RequestId),
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LedgerError> for WorkflowError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InvalidStatus(status) => WorkflowError::InvalidStatus(status),
            LedgerError::NotFound(id) => WorkflowError::NotFound(id),
            LedgerError::Repository(err) => WorkflowError::Repository(err),
        }
    }
}
