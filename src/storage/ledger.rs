//! Delivery ledger backed by `sent_links.json`.
//!
//! The ledger is the de-duplication authority: a URL recorded for
//! `(module, destination)` is never delivered to that destination again.
//! History is destination-scoped, so one module can fan out to several
//! destinations independently.
//!
//! Other processes (one-off checks, `add`, `remove`) write the same
//! document, so unsaved changes are kept as a change log and replayed onto
//! the stored copy on every refresh and save.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::Destination;
use crate::storage::{
    DocumentStorage, LEDGER_DOCUMENT, load_document, read_document, save_document,
};

type SentLinks = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// One unsaved ledger mutation.
#[derive(Debug, Clone)]
enum Change {
    Ensure {
        module: String,
        destination: String,
    },
    Record {
        module: String,
        destination: String,
        url: String,
    },
    Purge {
        module: String,
    },
}

impl Change {
    /// Apply to a ledger document. Returns whether anything changed.
    fn apply(&self, sent: &mut SentLinks) -> bool {
        match self {
            Self::Ensure {
                module,
                destination,
            } => {
                let links = sent.entry(module.clone()).or_default();
                if links.contains_key(destination) {
                    return false;
                }
                links.insert(destination.clone(), Vec::new());
                true
            }
            Self::Record {
                module,
                destination,
                url,
            } => {
                let urls = sent
                    .entry(module.clone())
                    .or_default()
                    .entry(destination.clone())
                    .or_default();
                if urls.iter().any(|sent| sent == url) {
                    return false;
                }
                urls.push(url.clone());
                true
            }
            Self::Purge { module } => sent.remove(module).is_some(),
        }
    }
}

/// Per-module, per-destination record of delivered resource URLs.
#[derive(Debug, Clone, Default)]
pub struct DeliveryLedger {
    sent: SentLinks,
    pending: Vec<Change>,
}

impl DeliveryLedger {
    pub async fn load(storage: &dyn DocumentStorage) -> Self {
        let sent: SentLinks = load_document(storage, LEDGER_DOCUMENT).await;
        Self {
            sent,
            pending: Vec::new(),
        }
    }

    /// Re-read the stored ledger and replay changes not yet saved.
    ///
    /// If the stored copy cannot be read the in-memory ledger is kept.
    pub async fn refresh(&mut self, storage: &dyn DocumentStorage) {
        let mut sent: SentLinks = match read_document(storage, LEDGER_DOCUMENT).await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                log::warn!("Keeping in-memory delivery ledger: {}", e);
                return;
            }
        };
        for change in &self.pending {
            change.apply(&mut sent);
        }
        self.sent = sent;
    }

    /// Merge pending changes into the stored ledger and write it back.
    ///
    /// On failure the changes stay pending so the next flush tries again.
    pub async fn save(&mut self, storage: &dyn DocumentStorage) -> Result<()> {
        self.refresh(storage).await;
        save_document(storage, LEDGER_DOCUMENT, &self.sent).await?;
        self.pending.clear();
        Ok(())
    }

    /// Whether there are changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Create the empty set for `(module, destination)` if missing.
    pub fn ensure(&mut self, module_id: &str, destination: &Destination) {
        self.change(Change::Ensure {
            module: module_id.to_string(),
            destination: destination.key(),
        });
    }

    pub fn contains(&self, module_id: &str, destination: &Destination, url: &str) -> bool {
        self.sent_to(module_id, destination)
            .iter()
            .any(|sent| sent == url)
    }

    /// URLs already delivered for `(module, destination)`, in delivery order.
    pub fn sent_to(&self, module_id: &str, destination: &Destination) -> &[String] {
        self.sent
            .get(module_id)
            .and_then(|links| links.get(&destination.key()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Record a delivery. Returns false if the URL was already present.
    pub fn record(&mut self, module_id: &str, destination: &Destination, url: &str) -> bool {
        self.change(Change::Record {
            module: module_id.to_string(),
            destination: destination.key(),
            url: url.to_string(),
        })
    }

    /// Drop all history for a module. Returns whether any existed.
    pub fn purge_module(&mut self, module_id: &str) -> bool {
        self.change(Change::Purge {
            module: module_id.to_string(),
        })
    }

    fn change(&mut self, change: Change) -> bool {
        let changed = change.apply(&mut self.sent);
        if changed {
            self.pending.push(change);
        }
        changed
    }
}
