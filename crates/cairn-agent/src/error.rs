//! Error types for cairn-agent

use thiserror::Error;

/// Result type alias using cairn-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or driving an agent
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the LLM client layer
    #[error(transparent)]
    Ai(#[from] cairn_ai::Error),

    /// A scripted reply file could not be used
    #[error("Invalid scripted responses: {0}")]
    Script(String),

    /// A generic agent error
    #[error("{0}")]
    Other(String),
}
