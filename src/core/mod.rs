//! # Core Module
//!
//! Configuration, error taxonomy and message helpers shared by every feature.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod config;
pub mod error;
pub mod response;

pub use config::Config;
pub use error::{BotError, BotResult};
pub use response::{chunk_for_message, chunk_text, mention, MESSAGE_LIMIT};
