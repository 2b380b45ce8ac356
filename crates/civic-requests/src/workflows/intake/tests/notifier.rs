use std::sync::Arc;

use super::common::*;
use crate::workflows::intake::domain::{NotificationKind, RequestId};
use crate::workflows::intake::notifier::{
    render_email_body, NotificationOutcome, NotificationRequest, Notifier, EMAIL_SUBJECT,
};

fn notifier_over(store: &Arc<MemoryStore>, mailer: &Arc<MemoryMailer>) -> Notifier {
    Notifier::new(store.clone(), store.clone(), mailer.clone())
}

fn email_to(recipient_id: &str) -> NotificationRequest {
    NotificationRequest {
        recipient_id: recipient_id.to_string(),
        message: "Your service request status has been updated to: Resolved".to_string(),
        kind: NotificationKind::Email,
        request_id: Some(RequestId("REQ1A2B3C4D".to_string())),
    }
}

#[tokio::test]
async fn email_notification_is_saved_and_sent() {
    let store = Arc::new(MemoryStore::with_people());
    let mailer = Arc::new(MemoryMailer::default());

    let outcome = notifier_over(&store, &mailer)
        .send_notification(email_to(CITIZEN))
        .await;

    assert_eq!(outcome, NotificationOutcome::Delivered);
    assert!(outcome.is_delivered());

    let saved = store.stored_notifications();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].notification_id.is_well_formed());
    assert!(!saved[0].is_read);
    assert_eq!(saved[0].kind, NotificationKind::Email);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, CITIZEN_EMAIL);
    assert_eq!(sent[0].subject, EMAIL_SUBJECT);
    assert!(sent[0].html_body.contains("REQ1A2B3C4D"));
}

#[tokio::test]
async fn unknown_recipient_is_reported_without_side_effects() {
    let store = Arc::new(MemoryStore::with_people());
    let mailer = Arc::new(MemoryMailer::default());

    let outcome = notifier_over(&store, &mailer)
        .send_notification(email_to("nonexistent"))
        .await;

    assert_eq!(outcome, NotificationOutcome::RecipientNotFound);
    assert!(store.stored_notifications().is_empty());
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn directory_outage_is_reported_as_lookup_failure() {
    let store = Arc::new(MemoryStore::with_people());
    MemoryStore::take_offline(&store.directory_offline);
    let mailer = Arc::new(MemoryMailer::default());

    let outcome = notifier_over(&store, &mailer)
        .send_notification(email_to(CITIZEN))
        .await;

    assert_eq!(outcome, NotificationOutcome::LookupFailed);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn system_notification_is_saved_but_not_emailed() {
    let store = Arc::new(MemoryStore::with_people());
    let mailer = Arc::new(MemoryMailer::default());

    let outcome = notifier_over(&store, &mailer)
        .send_notification(NotificationRequest {
            recipient_id: STAFF.to_string(),
            message: "New service request submitted: Pothole on Main St".to_string(),
            kind: NotificationKind::System,
            request_id: None,
        })
        .await;

    assert!(outcome.is_delivered());
    assert_eq!(store.stored_notifications().len(), 1);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn dispatch_failure_is_reported_after_saving() {
    let store = Arc::new(MemoryStore::with_people());
    let mailer = Arc::new(MemoryMailer::failing());

    let outcome = notifier_over(&store, &mailer)
        .send_notification(email_to(CITIZEN))
        .await;

    assert_eq!(outcome, NotificationOutcome::DispatchFailed);
    assert_eq!(store.stored_notifications().len(), 1);
}

#[tokio::test]
async fn save_failure_does_not_block_email() {
    let store = Arc::new(MemoryStore::with_people());
    MemoryStore::take_offline(&store.notifications_offline);
    let mailer = Arc::new(MemoryMailer::default());

    let outcome = notifier_over(&store, &mailer)
        .send_notification(email_to(CITIZEN))
        .await;

    assert!(outcome.is_delivered());
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn unread_notifications_are_scoped_to_recipient() {
    let store = Arc::new(MemoryStore::with_people());
    let mailer = Arc::new(MemoryMailer::default());
    let notifier = notifier_over(&store, &mailer);

    notifier.send_notification(email_to(CITIZEN)).await;
    notifier
        .send_notification(NotificationRequest {
            recipient_id: STAFF.to_string(),
            message: "New service request submitted: X".to_string(),
            kind: NotificationKind::System,
            request_id: None,
        })
        .await;

    let unread = notifier
        .unread_notifications(CITIZEN)
        .await
        .expect("query succeeds");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].recipient_id, CITIZEN);
}

#[test]
fn email_body_escapes_message_and_includes_request_line() {
    let id = RequestId("REQ1A2B3C4D".to_string());
    let body = render_email_body("<b>Fixed</b> & done", Some(&id));

    assert!(body.contains("&lt;b&gt;Fixed&lt;/b&gt; &amp; done"));
    assert!(!body.contains("<b>Fixed</b>"));
    assert!(body.contains("<strong>Request ID:</strong> REQ1A2B3C4D"));
    assert!(body.contains("Community Service Request Update"));
}

#[test]
fn email_body_omits_request_line_without_id() {
    let body = render_email_body("Hello", None);
    assert!(!body.contains("Request ID"));
    assert!(body.contains("<p>Hello</p>"));
}
