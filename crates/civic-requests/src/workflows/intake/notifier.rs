use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::domain::{Notification, NotificationId, NotificationKind, RequestId};
use super::mailer::{MailTransport, OutgoingEmail};
use super::repository::{CitizenDirectory, NotificationRepository, RepositoryError};

pub const EMAIL_SUBJECT: &str = "Service Request Update";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub recipient_id: String,
    pub message: String,
    pub kind: NotificationKind,
    pub request_id: Option<RequestId>,
}

/// How a notification attempt ended. None of these are raised as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Delivered,
    RecipientNotFound,
    LookupFailed,
    DispatchFailed,
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotificationOutcome::Delivered)
    }
}

#[derive(Clone)]
pub struct Notifier {
    directory: Arc<dyn CitizenDirectory>,
    notifications: Arc<dyn NotificationRepository>,
    mailer: Arc<dyn MailTransport>,
}

impl Notifier {
    pub fn new(
        directory: Arc<dyn CitizenDirectory>,
        notifications: Arc<dyn NotificationRepository>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            directory,
            notifications,
            mailer,
        }
    }

    /// Resolve the recipient, record the notification and, for email notifications,
    /// dispatch the rendered message. Mail failures are reported, not retried.
    pub async fn send_notification(&self, request: NotificationRequest) -> NotificationOutcome {
        let email = match self.directory.contact_email(&request.recipient_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                error!(recipient_id = %request.recipient_id, "recipient not found");
                return NotificationOutcome::RecipientNotFound;
            }
            Err(err) => {
                error!(
                    recipient_id = %request.recipient_id,
                    error = %err,
                    "error resolving notification recipient"
                );
                return NotificationOutcome::LookupFailed;
            }
        };

        self.save_notification(&request).await;

        if request.kind != NotificationKind::Email {
            return NotificationOutcome::Delivered;
        }

        let outgoing = OutgoingEmail {
            to: email,
            subject: EMAIL_SUBJECT.to_string(),
            html_body: render_email_body(&request.message, request.request_id.as_ref()),
        };

        match self.mailer.deliver(outgoing).await {
            Ok(()) => NotificationOutcome::Delivered,
            Err(err) => {
                warn!(
                    recipient_id = %request.recipient_id,
                    error = %err,
                    "failed to send email notification"
                );
                NotificationOutcome::DispatchFailed
            }
        }
    }

    pub async fn unread_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, RepositoryError> {
        self.notifications
            .unread_notifications(user_id)
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "error fetching unread notifications");
                err
            })
    }

    async fn save_notification(&self, request: &NotificationRequest) {
        let notification = Notification {
            notification_id: NotificationId::generate(),
            recipient_id: request.recipient_id.clone(),
            message: request.message.clone(),
            kind: request.kind,
            sent_date: Utc::now(),
            is_read: false,
            request_id: request.request_id.clone(),
        };
        let notification_id = notification.notification_id.clone();

        match self.notifications.insert_notification(notification).await {
            Ok(()) => info!(%notification_id, "notification saved"),
            Err(err) => error!(%notification_id, error = %err, "error saving notification"),
        }
    }
}

/// HTML body for update emails. The message text is escaped before embedding.
pub fn render_email_body(message: &str, request_id: Option<&RequestId>) -> String {
    let request_line = request_id
        .map(|id| format!("<p><strong>Request ID:</strong> {}</p>", escape_html(id.as_str())))
        .unwrap_or_default();

    format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">",
            "<h2 style=\"color: #2b5db7;\">Community Service Request Update</h2>",
            "<p>{message}</p>",
            "{request_line}",
            "<hr style=\"border: none; border-top: 1px solid #eee; margin: 20px 0;\">",
            "<p style=\"color: #666; font-size: 12px;\">",
            "This is an automated message from the Community Service Request and Management System.",
            "</p>",
            "</div>"
        ),
        message = escape_html(message),
        request_line = request_line,
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
