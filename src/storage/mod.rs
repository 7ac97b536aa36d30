//! Storage abstractions for monitor state.
//!
//! Three small JSON documents make up all durable state:
//!
//! ```text
//! data/
//! ├── modules.json      # Module registry: {id: {name, url, destination, added_at}}
//! ├── sent_links.json   # Delivery ledger: {id: {destination: [url, ...]}}
//! ├── cookies.json      # Session cookies: [{name, value, domain}]
//! └── downloads/        # Scratch space for artifacts in flight
//! ```
//!
//! Loading never fails: a missing or empty document becomes the empty value
//! (and is written back), a malformed one is logged and replaced in memory.

pub mod ledger;
pub mod local;
pub mod registry;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};

// Re-export for convenience
pub use ledger::DeliveryLedger;
pub use local::LocalStorage;
pub use registry::ModuleRegistry;

pub const MODULES_DOCUMENT: &str = "modules.json";
pub const LEDGER_DOCUMENT: &str = "sent_links.json";
pub const COOKIES_DOCUMENT: &str = "cookies.json";

/// Trait for document storage backends.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Read a document, returning `None` if it does not exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace a document.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Load a document, falling back to its empty value.
pub async fn load_document<T>(storage: &dyn DocumentStorage, key: &str) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    match read_document(storage, key).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            let value = T::default();
            if let Err(e) = save_document(storage, key, &value).await {
                log::warn!("Could not initialize {}: {}", key, e);
            }
            value
        }
        Err(e) => {
            log::error!("{}. Starting empty.", e);
            T::default()
        }
    }
}

/// Read a document, returning `None` if it is missing or blank.
pub async fn read_document<T>(storage: &dyn DocumentStorage, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let bytes = storage
        .read_bytes(key)
        .await
        .map_err(|e| AppError::persistence(key, e))?;
    match bytes {
        Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::persistence(key, e)),
        _ => Ok(None),
    }
}

/// Serialize and write a document.
pub async fn save_document<T>(storage: &dyn DocumentStorage, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| AppError::persistence(key, e))?;
    storage
        .write_bytes(key, &bytes)
        .await
        .map_err(|e| AppError::persistence(key, e))
}
