//! cairn-ai: chat-completions client and message types
//!
//! This crate holds the wire-level pieces shared by the agent core and the
//! CLI: role/content messages, token usage with cost, and a client for
//! OpenAI-compatible chat-completions endpoints (OpenRouter and friends).

pub mod error;
pub mod providers;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
