//! Module registry backed by `modules.json`.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{Module, ModuleEntry};
use crate::storage::{
    DocumentStorage, MODULES_DOCUMENT, load_document, read_document, save_document,
};

/// Durable mapping from module id to its monitoring configuration.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    entries: BTreeMap<String, ModuleEntry>,
}

impl ModuleRegistry {
    pub async fn load(storage: &dyn DocumentStorage) -> Self {
        let entries: BTreeMap<String, ModuleEntry> =
            load_document(storage, MODULES_DOCUMENT).await;
        log::debug!("Loaded {} registered modules", entries.len());
        Self { entries }
    }

    /// Re-read the stored registry, keeping the current one if it cannot
    /// be read.
    pub async fn refresh(&mut self, storage: &dyn DocumentStorage) {
        match read_document(storage, MODULES_DOCUMENT).await {
            Ok(stored) => self.entries = stored.unwrap_or_default(),
            Err(e) => log::warn!("Keeping in-memory module registry: {}", e),
        }
    }

    pub async fn save(&self, storage: &dyn DocumentStorage) -> Result<()> {
        save_document(storage, MODULES_DOCUMENT, &self.entries).await
    }

    /// Insert or replace a module. Returns the module it replaced.
    pub fn register(&mut self, module: Module) -> Option<Module> {
        let previous = self.entries.insert(module.id.clone(), module.to_entry());
        previous.map(|entry| Module::from_entry(&module.id, &entry))
    }

    pub fn remove(&mut self, id: &str) -> Option<Module> {
        self.entries
            .remove(id)
            .map(|entry| Module::from_entry(id, &entry))
    }

    /// All modules, ordered by id.
    pub fn modules(&self) -> Vec<Module> {
        self.entries
            .iter()
            .map(|(id, entry)| Module::from_entry(id, entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
