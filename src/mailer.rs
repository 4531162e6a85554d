#![cfg(feature = "web")]

use crate::config::NotifyConfig;
use crate::error::{ConfigError, NotificationError};
use crate::notify::Notifier;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const SUBJECT: &str = "New production request";

/// E-mail delivery over SMTPS. Recipients are e-mail addresses.
pub struct EmailNotifier {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self, ConfigError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid notify.from address: {e}")))?;

        let tls_parameters = TlsParameters::new(config.smtp_host.clone())
            .map_err(|e| ConfigError::Invalid(format!("invalid SMTP TLS settings: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ConfigError::Invalid(format!("invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .tls(Tls::Wrapper(tls_parameters))
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(user), Some(password)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(EmailNotifier {
            smtp: builder.build(),
            from,
        })
    }

    async fn deliver(&self, recipient: &str, subject: &str, body: String) -> Result<(), NotificationError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| NotificationError::InvalidRecipient(recipient.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .map_err(|e| NotificationError::Delivery {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        self.smtp
            .send(email)
            .await
            .map_err(|e| NotificationError::Delivery {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), NotificationError> {
        self.deliver(recipient, SUBJECT, text.replace('*', "")).await
    }

    async fn send_image(&self, recipient: &str, image_url: &str, caption: &str) -> Result<(), NotificationError> {
        let body = if caption.is_empty() {
            format!("Attached image: {image_url}")
        } else {
            format!("{caption}\n{image_url}")
        };
        self.deliver(recipient, &format!("{SUBJECT} (image)"), body).await
    }
}
