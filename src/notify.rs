use crate::error::NotificationError;
use async_trait::async_trait;
use serde::Serialize;

/// Outbound message channel to opaque recipient ids.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), NotificationError>;

    async fn send_image(&self, recipient: &str, image_url: &str, caption: &str) -> Result<(), NotificationError>;
}

/// Delivery outcome for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub recipient: String,
    pub message_sent: bool,
    /// `None` when no image was attached.
    pub image_sent: Option<bool>,
}

/// Send `text` (and then `image_url`, as a separate call) to every recipient.
///
/// Failures are logged and reported per recipient; nothing is propagated.
pub async fn notify_all(
    notifier: &dyn Notifier,
    recipients: &[String],
    text: &str,
    image_url: Option<&str>,
) -> Vec<Delivery> {
    let mut deliveries = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let message_sent = match notifier.send_message(recipient, text).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to send message to {}: {}", recipient, e);
                false
            }
        };

        let image_sent = match image_url {
            Some(url) => Some(match notifier.send_image(recipient, url, "").await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Failed to send image to {}: {}", recipient, e);
                    false
                }
            }),
            None => None,
        };

        deliveries.push(Delivery {
            recipient: recipient.clone(),
            message_sent,
            image_sent,
        });
    }

    deliveries
}

#[cfg(feature = "web")]
pub use telegram::TelegramNotifier;

#[cfg(feature = "web")]
mod telegram {
    use super::Notifier;
    use crate::config::NotifyConfig;
    use crate::error::{ConfigError, NotificationError};
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;

    /// Telegram bot delivery via `sendMessage` / `sendPhoto`.
    pub struct TelegramNotifier {
        client: Client,
        api_base: String,
        token: String,
    }

    impl TelegramNotifier {
        /// Build a bot client from the `[notify]` section.
        ///
        /// Every call is bounded by `timeout_secs`, so a stalled bot API
        /// cannot hold a submission response open.
        pub fn new(config: &NotifyConfig) -> Result<Self, ConfigError> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| ConfigError::Invalid(format!("could not build Telegram client: {e}")))?;

            Ok(Self {
                client,
                api_base: config.telegram_api_base.trim_end_matches('/').to_string(),
                token: config.telegram_token.clone().unwrap_or_default(),
            })
        }

        fn method_url(&self, method: &str) -> String {
            format!("{}/bot{}/{}", self.api_base, self.token, method)
        }

        async fn post(&self, recipient: &str, method: &str, form: &[(&str, &str)]) -> Result<(), NotificationError> {
            let response = self
                .client
                .post(self.method_url(method))
                .form(form)
                .send()
                .await
                .map_err(|e| NotificationError::Delivery {
                    recipient: recipient.to_string(),
                    reason: e.without_url().to_string(),
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(NotificationError::Rejected {
                    recipient: recipient.to_string(),
                    status: response.status().as_u16(),
                })
            }
        }
    }

    #[async_trait]
    impl Notifier for TelegramNotifier {
        async fn send_message(&self, recipient: &str, text: &str) -> Result<(), NotificationError> {
            self.post(
                recipient,
                "sendMessage",
                &[("chat_id", recipient), ("text", text), ("parse_mode", "Markdown")],
            )
            .await
        }

        async fn send_image(&self, recipient: &str, image_url: &str, caption: &str) -> Result<(), NotificationError> {
            self.post(
                recipient,
                "sendPhoto",
                &[("chat_id", recipient), ("photo", image_url), ("caption", caption)],
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Flaky {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Flaky {
        async fn send_message(&self, recipient: &str, _text: &str) -> Result<(), NotificationError> {
            self.calls.lock().unwrap().push(format!("msg:{recipient}"));
            if recipient == "bad" {
                return Err(NotificationError::Rejected {
                    recipient: recipient.to_string(),
                    status: 400,
                });
            }
            Ok(())
        }

        async fn send_image(&self, recipient: &str, _url: &str, _caption: &str) -> Result<(), NotificationError> {
            self.calls.lock().unwrap().push(format!("img:{recipient}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn each_recipient_is_reported_independently() {
        let notifier = Flaky::default();
        let recipients = vec!["1001".to_string(), "bad".to_string()];
        let deliveries = notify_all(&notifier, &recipients, "hello", Some("https://img")).await;

        assert_eq!(deliveries.len(), 2);
        assert!(deliveries[0].message_sent);
        assert!(!deliveries[1].message_sent);
        // The image is a second call and goes out even when the text failed.
        assert_eq!(deliveries[1].image_sent, Some(true));
        assert_eq!(
            *notifier.calls.lock().unwrap(),
            vec!["msg:1001", "img:1001", "msg:bad", "img:bad"]
        );
    }

    #[cfg(feature = "web")]
    #[tokio::test]
    async fn telegram_client_honours_the_configured_timeout() {
        use crate::config::NotifyConfig;
        use tokio::net::TcpListener;

        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = NotifyConfig {
            timeout_secs: 1,
            telegram_api_base: format!("http://{addr}/"),
            telegram_token: Some("123:abc".to_string()),
            ..NotifyConfig::default()
        };
        let notifier = TelegramNotifier::new(&config).unwrap();

        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            notifier.send_message("1001", "hello"),
        )
        .await
        .expect("the client timeout fires first");
        assert!(sent.is_err());
    }

    #[tokio::test]
    async fn no_image_means_no_second_call() {
        let notifier = Flaky::default();
        let deliveries = notify_all(&notifier, &["7".to_string()], "hi", None).await;
        assert_eq!(deliveries[0].image_sent, None);
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);
    }
}
