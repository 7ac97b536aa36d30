//! Messaging channel abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Destination;

/// Why a channel refused a send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel asked us to wait before sending again
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// The channel rejected the request
    #[error("rejected ({code}): {description}")]
    Rejected { code: u16, description: String },

    /// The request never got a usable answer
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChannelError {
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Something that can deliver text and documents to a destination.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send_text(&self, to: &Destination, text: &str) -> Result<(), ChannelError>;

    async fn send_document(
        &self,
        to: &Destination,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), ChannelError>;
}
