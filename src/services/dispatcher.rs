// src/services/dispatcher.rs

//! Notification dispatcher.
//!
//! Renders a resource descriptor for its destination and sends it, retrying
//! on rate limits up to the configured number of attempts.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Config, Destination, ResourceDescriptor, ResourceKind};
use crate::services::channel::{Channel, ChannelError};
use crate::services::session::{AuthSession, DownloadedArtifact};
use crate::utils::text::{escape_markdown, sanitize_filename};

/// Result of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The resource (or its download-failed notice) reached the destination
    Delivered,
    /// Delivery failed for good; recorded so it is not retried forever
    Failed,
    /// Still rate limited after every attempt; retried next cycle
    Deferred,
}

impl DeliveryOutcome {
    /// Whether the outcome should be written to the ledger.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Deferred)
    }
}

enum Message {
    Text(String),
    Document {
        filename: String,
        bytes: Vec<u8>,
        caption: String,
        // Keeps the scratch file alive until the upload is done.
        _artifact: DownloadedArtifact,
    },
}

/// Sends descriptors through a channel.
pub struct Dispatcher {
    config: Arc<Config>,
    channel: Arc<dyn Channel>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, channel: Arc<dyn Channel>) -> Self {
        Self { config, channel }
    }

    /// Deliver one resource to one destination.
    pub async fn deliver(
        &self,
        session: &AuthSession,
        to: &Destination,
        descriptor: &ResourceDescriptor,
    ) -> DeliveryOutcome {
        let message = match self.prepare(session, descriptor).await {
            Ok(message) => message,
            Err(e) => {
                self.report_error(to, descriptor, &e).await;
                return DeliveryOutcome::Failed;
            }
        };

        match self.send(to, &message).await {
            Ok(()) => {
                log::info!("Sent '{}' ({}) to {}", descriptor.name, descriptor.kind, to);
                DeliveryOutcome::Delivered
            }
            Err(ChannelError::RateLimited { retry_after }) => {
                log::warn!(
                    "Still rate limited after {} attempts for '{}' (retry after {}s). Deferring.",
                    self.config.delivery.max_send_attempts,
                    descriptor.name,
                    retry_after
                );
                DeliveryOutcome::Deferred
            }
            Err(e) => {
                self.report_error(to, descriptor, &AppError::from(e)).await;
                DeliveryOutcome::Failed
            }
        }
    }

    /// Send a plain administrative notice.
    pub async fn notify(&self, to: &Destination, text: &str) -> std::result::Result<(), ChannelError> {
        self.send(to, &Message::Text(text.to_string())).await
    }

    /// Filename for a downloaded resource.
    pub fn filename(&self, name: &str) -> String {
        let stem = self.config.cleaning.strip_suffixes(name);
        format!(
            "{}{}",
            sanitize_filename(&stem),
            self.config.classifier.document_extension
        )
    }

    async fn prepare(&self, session: &AuthSession, descriptor: &ResourceDescriptor) -> Result<Message> {
        let caption = caption(descriptor);

        if descriptor.kind == ResourceKind::Video {
            return Ok(Message::Text(format!(
                "{caption}\n\n🎬 Video: {}",
                escape_markdown(&descriptor.final_url)
            )));
        }

        match session.download(&descriptor.final_url).await {
            Ok(artifact) => {
                log::debug!(
                    "Uploading {} ({} bytes) for '{}'",
                    artifact.path().display(),
                    artifact.size(),
                    descriptor.name
                );
                let bytes = artifact.read().await?;
                Ok(Message::Document {
                    filename: self.filename(&descriptor.name),
                    bytes,
                    caption,
                    _artifact: artifact,
                })
            }
            Err(e) => {
                log::warn!("Download failed for '{}': {}", descriptor.name, e);
                Ok(Message::Text(format!(
                    "{caption}\n\n⚠️ Couldn't download the file. Access it directly: {}",
                    escape_markdown(&descriptor.final_url)
                )))
            }
        }
    }

    async fn send(&self, to: &Destination, message: &Message) -> std::result::Result<(), ChannelError> {
        let delivery = &self.config.delivery;
        let attempts = delivery.max_send_attempts.max(1);

        let mut attempt = 1;
        loop {
            let result = match message {
                Message::Text(text) => self.channel.send_text(to, text).await,
                Message::Document {
                    filename,
                    bytes,
                    caption,
                    ..
                } => {
                    self.channel
                        .send_document(to, filename, bytes.clone(), caption)
                        .await
                }
            };

            let retry_after = match &result {
                Err(e) if attempt < attempts => e.retry_after(),
                _ => None,
            };
            let Some(retry_after) = retry_after else {
                return result;
            };

            let wait = retry_after.min(delivery.max_retry_after_secs);
            log::warn!("Rate limited. Waiting {} seconds", wait);
            tokio::time::sleep(Duration::from_secs(wait)).await;
            attempt += 1;
        }
    }

    /// Best-effort error notice; failures are only logged.
    async fn report_error(&self, to: &Destination, descriptor: &ResourceDescriptor, error: &AppError) {
        log::error!("Error delivering '{}' to {}: {}", descriptor.name, to, error);
        let text = format!(
            "{}\n\n⚠️ Error processing file. Access it directly: {}\n\nError: {}",
            caption(descriptor),
            escape_markdown(&descriptor.final_url),
            escape_markdown(&error.to_string())
        );
        if let Err(e) = self.channel.send_text(to, &text).await {
            log::warn!("Could not send error notice to {}: {}", to, e);
        }
    }
}

fn caption(descriptor: &ResourceDescriptor) -> String {
    format!("📄 *{}*", escape_markdown(&descriptor.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_terminal() {
        assert!(DeliveryOutcome::Delivered.is_terminal());
        assert!(DeliveryOutcome::Failed.is_terminal());
        assert!(!DeliveryOutcome::Deferred.is_terminal());
    }

    #[test]
    fn test_caption_escapes_name() {
        let descriptor = ResourceDescriptor {
            source_url: "https://x/view.php?id=1".into(),
            final_url: "https://x/a.pdf".into(),
            name: "TP_1".into(),
            kind: ResourceKind::Document,
        };
        assert_eq!(caption(&descriptor), "📄 *TP\\_1*");
    }
}
