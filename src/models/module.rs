//! Monitored course module.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::Destination;

/// Persisted record of one monitored course page.
///
/// The module id is the key of the modules document, so it is not repeated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Display name
    pub name: String,

    /// Course page URL
    pub url: String,

    /// Where new resources are sent
    #[serde(alias = "chat_id")]
    pub destination: Destination,

    /// Local time of registration
    #[serde(alias = "addedAt")]
    pub added_at: NaiveDateTime,
}

/// A module together with its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub url: String,
    pub destination: Destination,
    pub added_at: NaiveDateTime,
}

impl Module {
    /// Build a new module stamped with the current local time.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        destination: Destination,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            destination,
            added_at: Local::now().naive_local(),
        }
    }

    pub fn from_entry(id: &str, entry: &ModuleEntry) -> Self {
        Self {
            id: id.to_string(),
            name: entry.name.clone(),
            url: entry.url.clone(),
            destination: entry.destination,
            added_at: entry.added_at,
        }
    }

    pub fn to_entry(&self) -> ModuleEntry {
        ModuleEntry {
            name: self.name.clone(),
            url: self.url.clone(),
            destination: self.destination,
            added_at: self.added_at,
        }
    }

    /// Derive a module id from its course URL.
    ///
    /// Uses the `id` query parameter when present, otherwise a
    /// timestamp-based fallback.
    pub fn derive_id(course_url: &str) -> String {
        url::Url::parse(course_url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(key, value)| key == "id" && !value.is_empty())
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_else(|| format!("module_{}", Local::now().timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_from_query() {
        let id = Module::derive_id(
            "https://elearning.univ-constantine2.dz/elearning/course/view.php?id=123",
        );
        assert_eq!(id, "123");
    }

    #[test]
    fn test_derive_id_fallback() {
        let id = Module::derive_id("https://portal.example/course/algorithms");
        assert!(id.starts_with("module_"));
        assert!(id["module_".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_entry_accepts_legacy_fields() {
        let json = r#"{
            "name": "Algorithms",
            "url": "https://portal.example/course/view.php?id=7",
            "chat_id": -1002612777381,
            "added_at": "2025-03-01T10:20:30.123456"
        }"#;
        let entry: ModuleEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.destination, Destination::chat(-1002612777381));

        let module = Module::from_entry("7", &entry);
        assert_eq!(module.to_entry(), entry);
    }
}
