// src/models/destination.rs

//! Notification destinations.
//!
//! A destination is a chat, optionally narrowed to one forum topic. It is
//! stored as `"chat"` or `"chat_thread"` and parsed exactly once when it
//! enters the system.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A chat (and optional sub-thread) that receives notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawDestination", into = "String")]
pub struct Destination {
    pub chat: i64,
    pub thread: Option<i64>,
}

impl Destination {
    pub fn chat(chat: i64) -> Self {
        Self { chat, thread: None }
    }

    pub fn thread(chat: i64, thread: i64) -> Self {
        Self {
            chat,
            thread: Some(thread),
        }
    }

    /// Ledger key for this destination.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread {
            Some(thread) => write!(f, "{}_{}", self.chat, thread),
            None => write!(f, "{}", self.chat),
        }
    }
}

impl FromStr for Destination {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || {
            AppError::validation(format!(
                "invalid destination '{s}', expected a chat id or chat_thread"
            ))
        };

        match s.split_once('_') {
            Some((chat, thread)) => Ok(Self::thread(
                chat.parse().map_err(|_| invalid())?,
                thread.parse().map_err(|_| invalid())?,
            )),
            None => Ok(Self::chat(s.parse().map_err(|_| invalid())?)),
        }
    }
}

impl From<Destination> for String {
    fn from(destination: Destination) -> Self {
        destination.to_string()
    }
}

/// Older module documents store plain chats as JSON integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDestination {
    Number(i64),
    Text(String),
}

impl TryFrom<RawDestination> for Destination {
    type Error = AppError;

    fn try_from(raw: RawDestination) -> Result<Self, Self::Error> {
        match raw {
            RawDestination::Number(chat) => Ok(Self::chat(chat)),
            RawDestination::Text(text) => text.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_chat() {
        let dest: Destination = "-1001234567890".parse().unwrap();
        assert_eq!(dest, Destination::chat(-1001234567890));
        assert_eq!(dest.key(), "-1001234567890");
    }

    #[test]
    fn test_parse_topic() {
        let dest: Destination = "100_2".parse().unwrap();
        assert_eq!(dest, Destination::thread(100, 2));
        assert_eq!(dest.to_string(), "100_2");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("general".parse::<Destination>().is_err());
        assert!("100_".parse::<Destination>().is_err());
        assert!("100_2_3".parse::<Destination>().is_err());
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let plain: Destination = serde_json::from_str("-1002612777381").unwrap();
        assert_eq!(plain, Destination::chat(-1002612777381));

        let topic: Destination = serde_json::from_str("\"-1002612777381_1\"").unwrap();
        assert_eq!(topic, Destination::thread(-1002612777381, 1));
        assert_eq!(
            serde_json::to_string(&topic).unwrap(),
            "\"-1002612777381_1\""
        );
    }
}
