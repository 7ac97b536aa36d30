// src/models/mod.rs

//! Domain models for the course monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod destination;
mod module;
mod resource;

// Re-export all public types
pub use config::{
    CleaningConfig, ClassifierConfig, Config, Credentials, DeliveryConfig, PathsConfig,
    PortalConfig, ScheduleConfig, TelegramConfig,
};
pub use destination::Destination;
pub use module::{Module, ModuleEntry};
pub use resource::{Candidate, NodeShape, ResourceDescriptor, ResourceKind};
