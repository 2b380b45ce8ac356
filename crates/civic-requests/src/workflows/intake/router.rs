use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, ConnectInfo, DefaultBodyLimit,
        Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{RequestId, RequestSubmission, SubmissionReceipt};
use super::service::{ServiceRequestWorkflow, WorkflowError};
use super::uploads::{ImageUpload, UploadDirectory, UploadRejection};
use super::validation::validate_submission;

/// Multipart bodies carry at most one 5MB image plus a handful of text fields.
pub const MAX_SUBMISSION_BODY_BYTES: usize = 6 * 1024 * 1024;

#[derive(Clone)]
pub struct IntakeState {
    pub workflow: Arc<ServiceRequestWorkflow>,
    pub uploads: Arc<UploadDirectory>,
}

/// Router builder exposing the citizen intake endpoints.
pub fn intake_router(
    workflow: Arc<ServiceRequestWorkflow>,
    uploads: Arc<UploadDirectory>,
) -> Router {
    Router::new()
        .route(
            "/submit-request",
            post(submit_handler).layer(DefaultBodyLimit::max(MAX_SUBMISSION_BODY_BYTES)),
        )
        .route("/request/:request_id", get(request_handler))
        .route("/request/:request_id/status", put(status_update_handler))
        .route("/user/:user_id/requests", get(user_requests_handler))
        .route(
            "/user/:user_id/notifications",
            get(unread_notifications_handler),
        )
        .with_state(IntakeState { workflow, uploads })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    pub user_id: String,
}

pub(crate) async fn submit_handler(
    State(state): State<IntakeState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    multipart: Multipart,
) -> Response {
    let client_ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());

    let (mut submission, upload) = match read_submission(multipart).await {
        Ok(parts) => parts,
        Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return rejection(
                StatusCode::BAD_REQUEST,
                "Image rejected",
                vec![UploadRejection::TooLarge.to_string()],
            )
        }
        Err(err) => {
            return rejection(
                StatusCode::BAD_REQUEST,
                "Malformed submission",
                vec![err.body_text()],
            )
        }
    };

    let staged = match upload {
        Some(upload) => {
            if let Err(reason) = state.uploads.screen(&upload) {
                return rejection(
                    StatusCode::BAD_REQUEST,
                    "Image rejected",
                    vec![reason.to_string()],
                );
            }
            let staged = state.uploads.stage(upload);
            submission.image = Some(staged.metadata().clone());
            Some(staged)
        }
        None => None,
    };

    // Nothing reaches the upload directory until the submission itself is acceptable.
    let report = validate_submission(&submission);
    if !report.is_valid() {
        return workflow_error_response(WorkflowError::Validation(report));
    }

    if let Some(staged) = &staged {
        if let Err(err) = staged.write().await {
            warn!(error = %err, "failed to store uploaded image");
            return internal_error(&err.to_string());
        }
    }

    match state.workflow.submit(submission, client_ip).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Service request submitted successfully",
                "data": SubmissionReceipt::from(&record),
            })),
        )
            .into_response(),
        Err(err) => {
            if let Some(staged) = &staged {
                staged.discard().await;
            }
            workflow_error_response(err)
        }
    }
}

pub(crate) async fn request_handler(
    State(state): State<IntakeState>,
    Path(request_id): Path<String>,
) -> Response {
    match state.workflow.get(&RequestId(request_id)).await {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": record })),
        )
            .into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn user_requests_handler(
    State(state): State<IntakeState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.workflow.list_for_user(&user_id).await {
        Ok(records) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": records.len(),
                "data": records,
            })),
        )
            .into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn status_update_handler(
    State(state): State<IntakeState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Path(request_id): Path<String>,
    update: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Response {
    let update = match update {
        Ok(Json(update)) => update,
        Err(rejected) => {
            return rejection(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                vec![rejected.body_text()],
            )
        }
    };
    let client_ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    let request_id = RequestId(request_id);

    match state
        .workflow
        .update_status(&request_id, &update.status, &update.user_id, client_ip)
        .await
    {
        Ok(change) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "previousStatus": change.previous,
                "data": change.record,
            })),
        )
            .into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn unread_notifications_handler(
    State(state): State<IntakeState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.workflow.unread_notifications(&user_id).await {
        Ok(notifications) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": notifications.len(),
                "data": notifications,
            })),
        )
            .into_response(),
        Err(err) => workflow_error_response(err),
    }
}

async fn read_submission(
    mut multipart: Multipart,
) -> Result<(RequestSubmission, Option<ImageUpload>), MultipartError> {
    let mut submission = RequestSubmission::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await?.to_vec();
            // Browsers send an empty part when no file was chosen.
            if !file_name.is_empty() || !bytes.is_empty() {
                upload = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => submission.title = value,
            "category" => submission.category = value,
            "region" => submission.region = value,
            "city" => submission.city = value,
            "houseNumber" => submission.house_number = Some(value),
            "description" => submission.description = Some(value),
            "userId" => submission.user_id = value,
            _ => {}
        }
    }

    Ok((submission, upload))
}

pub(crate) fn workflow_error_response(err: WorkflowError) -> Response {
    match err {
        WorkflowError::Validation(report) => {
            rejection(StatusCode::BAD_REQUEST, "Validation failed", report.messages())
        }
        WorkflowError::InvalidStatus(status) => rejection(
            StatusCode::BAD_REQUEST,
            "Invalid status value",
            vec![format!("Invalid status value: {status}")],
        ),
        WorkflowError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": "Service request not found",
            })),
        )
            .into_response(),
        WorkflowError::Repository(err) if err.is_transient() => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "Service temporarily unavailable",
                "error": err.to_string(),
            })),
        )
            .into_response(),
        WorkflowError::Repository(err) => internal_error(&err.to_string()),
    }
}

fn rejection(status: StatusCode, message: &str, errors: Vec<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "message": message,
            "errors": errors,
        })),
    )
        .into_response()
}

fn internal_error(detail: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": "Internal server error",
            "error": detail,
        })),
    )
        .into_response()
}
