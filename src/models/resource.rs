//! Resource candidates and classified descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a page node turned out to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A document fetched directly from the portal or a plain file link
    Document,
    /// A file hosted on the external drive provider
    ExternalDrive,
    /// A link to a video host, delivered as text
    Video,
}

impl ResourceKind {
    /// Whether delivery requires downloading the file.
    pub fn is_downloadable(self) -> bool {
        matches!(self, Self::Document | Self::ExternalDrive)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::ExternalDrive => "drive",
            Self::Video => "video",
        };
        f.write_str(name)
    }
}

/// Which activity shape a candidate was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    /// Downloadable resource activity
    Resource,
    /// External URL activity
    Link,
}

/// A resource link extracted from a course page, not yet classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Scheme-normalized link found on the page
    pub url: String,
    /// Display name without accessibility decoration
    pub name: String,
    pub shape: NodeShape,
}

/// A classified resource that has not been delivered to its destination yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Link as found on the page; the de-duplication identity
    pub source_url: String,
    /// Resolved target used for retrieval and display
    pub final_url: String,
    pub name: String,
    pub kind: ResourceKind,
}
