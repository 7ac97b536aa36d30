//! Service layer for the course monitor.
//!
//! This module contains the business logic for:
//! - The authenticated portal session (`AuthSession`, `SessionCookies`)
//! - Resource classification (`ResourceClassifier`)
//! - Module page monitoring (`ChangeMonitor`)
//! - Notification delivery (`Dispatcher` over a `Channel`)

pub mod channel;
pub mod classifier;
pub mod cookies;
pub mod dispatcher;
pub mod monitor;
pub mod session;
pub mod telegram;

pub use channel::{Channel, ChannelError};
pub use classifier::ResourceClassifier;
pub use cookies::{SessionCookies, StoredCookie};
pub use dispatcher::{DeliveryOutcome, Dispatcher};
pub use monitor::ChangeMonitor;
pub use session::{AuthSession, DownloadedArtifact};
pub use telegram::TelegramChannel;
