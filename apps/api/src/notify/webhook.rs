use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{Notification, NotifyError, Notifier};

/// Posts alerts as JSON (`{subject, body, recipients}`) to a relay endpoint that
/// handles actual delivery (mail gateway, chat bridge, …).
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Alert '{}' relayed to {} recipient(s)",
            notification.subject,
            notification.recipients.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_recipient_list_is_refused_without_a_request() {
        // Port 9 (discard) is never contacted because validation runs first.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/alerts".to_string()).unwrap();
        let err = notifier
            .send(&Notification {
                subject: "s".to_string(),
                body: "b".to_string(),
                recipients: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NoRecipients));
    }
}
