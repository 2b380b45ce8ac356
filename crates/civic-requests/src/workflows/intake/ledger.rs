use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::domain::{
    NewServiceRequest, RequestId, RequestStatus, ServiceRequest, StatusChange,
};
use super::repository::{CitizenDirectory, RepositoryError, ServiceRequestRepository};

/// Persistence rules for service requests: creation defaults, status transitions and the
/// citizen resolved counter.
#[derive(Clone)]
pub struct RequestLedger {
    requests: Arc<dyn ServiceRequestRepository>,
    citizens: Arc<dyn CitizenDirectory>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),
    #[error("service request {0} not found")]
    NotFound(RequestId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RequestLedger {
    pub fn new(
        requests: Arc<dyn ServiceRequestRepository>,
        citizens: Arc<dyn CitizenDirectory>,
    ) -> Self {
        Self { requests, citizens }
    }

    /// Insert a new request under a fresh id. Status defaults to Pending and priority to
    /// Medium; the location is flattened to its display string.
    pub async fn create_service_request(
        &self,
        data: NewServiceRequest,
    ) -> Result<ServiceRequest, RepositoryError> {
        let record = ServiceRequest {
            request_id: RequestId::generate(),
            title: data.title,
            description: data.description,
            category: data.category,
            status: data.status.unwrap_or(RequestStatus::Pending),
            priority: data.priority.unwrap_or_default(),
            location: data.location.summary(),
            image_path: data.image_path,
            user_id: data.user_id,
            submission_date: Utc::now(),
            resolution_date: None,
        };

        let stored = self.requests.insert_request(record).await.map_err(|err| {
            warn!(error = %err, "database error creating service request");
            err
        })?;
        debug!(request_id = %stored.request_id, "service request persisted");
        Ok(stored)
    }

    pub async fn get_request_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError> {
        self.requests.fetch_request(id).await
    }

    pub async fn get_requests_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        self.requests.requests_for_user(user_id).await
    }

    /// Move a request to `status`. Unknown labels are rejected before storage is touched.
    ///
    /// Entering Resolved or Closed stamps `resolution_date`; any other status clears it.
    /// The prior status comes back from the same write, so the owner's resolved counter is
    /// bumped once per open -> terminal transition even when updates race. The counter is a
    /// separate best-effort write.
    pub async fn update_request_status(
        &self,
        id: &RequestId,
        status: &str,
        acting_user: &str,
    ) -> Result<StatusChange, LedgerError> {
        let status =
            RequestStatus::parse(status).ok_or_else(|| LedgerError::InvalidStatus(status.into()))?;

        let resolution_date = status.is_terminal().then(Utc::now);
        let change = self
            .requests
            .update_status(id, status, resolution_date)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;

        debug!(
            request_id = %id,
            from = %change.previous,
            to = %change.record.status,
            acting_user,
            "service request status updated"
        );

        if change.entered_terminal() {
            self.increment_resolved_count(&change.record.user_id).await;
        }

        Ok(change)
    }

    /// Best-effort: failures are logged and never reach the caller.
    pub async fn increment_resolved_count(&self, user_id: &str) {
        if let Err(err) = self.citizens.increment_resolved(user_id).await {
            warn!(user_id, error = %err, "error updating resolved count");
        }
    }
}
