//! Error type shared by every component of the orchestration core.

use std::error::Error;
use std::fmt;

/// Boxed, thread-safe error returned by [`CompletionProvider`](crate::CompletionProvider)
/// implementations. Provider failures are opaque to the core (network, quota,
/// malformed response) so they are carried as trait objects.
pub type ProviderError = Box<dyn Error + Send + Sync>;

/// Errors that can occur while validating a request, generating agent
/// responses, streaming turns, or touching storage.
///
/// # Examples
///
/// ```
/// use trio::TrioError;
///
/// let err = TrioError::ChatNotFound(42);
/// assert_eq!(err.to_string(), "Chat not found: 42");
/// ```
#[derive(Debug, Clone)]
pub enum TrioError {
    /// No chat with the given identity exists in the store.
    ChatNotFound(u64),

    /// A chat, agent or message violates a data-model rule (agent count per
    /// chat type, trait list length, empty message content, ...).
    Validation(String),

    /// The operation needs at least one agent and the chat has none.
    NoAgents,

    /// A completion call failed in a mode where provider failures are fatal.
    Provider {
        /// Display name of the agent whose turn failed.
        agent: String,
        /// Rendered provider error.
        message: String,
    },

    /// Reading from or writing to the chat store failed.
    Storage(String),

    /// The event transport failed or the producer task could not be joined.
    Stream(String),
}

impl fmt::Display for TrioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrioError::ChatNotFound(id) => write!(f, "Chat not found: {}", id),
            TrioError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            TrioError::NoAgents => write!(f, "Chat must have at least one agent"),
            TrioError::Provider { agent, message } => {
                write!(f, "Failed to generate response for {}: {}", agent, message)
            }
            TrioError::Storage(msg) => write!(f, "Storage error: {}", msg),
            TrioError::Stream(msg) => write!(f, "Stream error: {}", msg),
        }
    }
}

impl Error for TrioError {}

impl From<std::io::Error> for TrioError {
    fn from(err: std::io::Error) -> Self {
        TrioError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TrioError {
    fn from(err: serde_json::Error) -> Self {
        TrioError::Storage(err.to_string())
    }
}
