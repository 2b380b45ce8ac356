use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;

pub const SENDER_NAME: &str = "Community Service System";

/// A rendered message ready for the mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound mail hook so the notifier can be exercised without an SMTP relay.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address '{address}'")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("message could not be built: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("mail transport unavailable: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

fn parse_address(raw: &str) -> Result<Address, MailError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|source| MailError::Address {
            address: raw.to_string(),
            source,
        })
}

/// SMTP relay with STARTTLS, built once at startup and shared.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);

        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let sender = Mailbox::new(
            Some(SENDER_NAME.to_string()),
            parse_address(&config.sender_address())?,
        );

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let recipient = Mailbox::new(None, parse_address(&email.to)?);
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)?;

        let response = self.transport.send(message).await?;
        info!(code = %response.code(), "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_config(username: Option<&str>) -> MailConfig {
        MailConfig {
            host: "smtp.example.org".to_string(),
            port: 587,
            username: username.map(str::to_string),
            password: Some("secret".to_string()),
        }
    }

    #[test]
    fn builds_with_configured_sender() {
        let mailer = SmtpMailer::from_config(&mail_config(Some("desk@example.org")))
            .expect("mailer builds");
        assert_eq!(mailer.sender.email.to_string(), "desk@example.org");
        assert_eq!(mailer.sender.name.as_deref(), Some(SENDER_NAME));
    }

    #[test]
    fn rejects_malformed_sender() {
        match SmtpMailer::from_config(&mail_config(Some("not an address"))) {
            Err(MailError::Address { address, .. }) => assert_eq!(address, "not an address"),
            Err(other) => panic!("expected address error, got {other}"),
            Ok(_) => panic!("expected address error"),
        }
    }
}
