//! Error types for the soulfriend-pwa library.

use thiserror::Error;

/// Errors that can occur while serving, caching or replaying requests.
#[derive(Error, Debug)]
pub enum Error {
    /// The network could not be reached or the request did not complete.
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request URL could not be parsed.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Pre-caching a manifest resource failed during install.
    #[error("Install failed for {resource}: {reason}")]
    Install {
        /// Resource that could not be cached.
        resource: String,
        /// Why it failed.
        reason: String,
    },

    /// A lifecycle event arrived in a state that cannot accept it.
    #[error("Cannot {event} a worker that is {state}")]
    Lifecycle {
        /// The rejected event.
        event: &'static str,
        /// The state the worker was in.
        state: String,
    },

    /// The pending submission queue could not be read or written.
    #[error("Submission queue error: {0}")]
    Queue(String),

    /// Configuration could not be loaded or saved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error during cache or queue persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this error means the network was unreachable.
    ///
    /// Only these errors trigger the cache and offline fallbacks; everything
    /// else is a local fault.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http(_))
    }
}

/// A specialized `Result` type for soulfriend-pwa operations.
pub type Result<T> = std::result::Result<T, Error>;
