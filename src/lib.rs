// src/lib.rs

//! Course Monitor Library
//!
//! Watches e-learning course pages and forwards newly published resources
//! to Telegram chats, remembering what each chat has already received.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
