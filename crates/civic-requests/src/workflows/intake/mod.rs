//! Citizen service request intake.
//!
//! Submissions are validated, persisted through [`RequestLedger`], then recorded by the
//! [`AuditRecorder`] and announced by the [`Notifier`]. Only persistence failures reach
//! the caller; audit and notification problems are logged and swallowed.

pub mod audit;
pub mod domain;
pub mod ids;
pub mod ledger;
pub mod mailer;
pub mod notifier;
pub mod postgres;
pub mod repository;
pub mod router;
pub mod service;
pub mod uploads;
pub mod validation;

#[cfg(test)]
mod tests;

pub use audit::{actions, AuditEvent, AuditRecorder, DEFAULT_LOG_LIMIT};
pub use domain::{
    AuditLog, Category, Citizen, ImageMetadata, Location, LogId, NewServiceRequest,
    Notification, NotificationId, NotificationKind, Priority, RequestId, RequestStatus,
    RequestSubmission, ServiceRequest, StatusChange, SubmissionReceipt,
};
pub use ledger::{LedgerError, RequestLedger};
pub use mailer::{MailError, MailTransport, OutgoingEmail, SmtpMailer};
pub use notifier::{NotificationOutcome, NotificationRequest, Notifier};
pub use postgres::PgStore;
pub use repository::{
    AuditLogRepository, CitizenDirectory, NotificationRepository, RepositoryError,
    ServiceRequestRepository,
};
pub use router::{intake_router, IntakeState, StatusUpdateRequest};
pub use service::{IntakeDependencies, ServiceRequestWorkflow, WorkflowError};
pub use uploads::{ImageUpload, StagedImage, UploadDirectory, UploadRejection};
pub use validation::{
    is_valid_priority, is_valid_request_id, is_valid_status, validate_submission,
    ValidationIssue, ValidationReport,
};
