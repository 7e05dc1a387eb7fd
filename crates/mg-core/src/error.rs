//! Unified error type for mediaglyph.
//!
//! Library crates funnel their failures into [`Error`]. Each variant maps to
//! one class of failure so callers can decide whether a problem aborts a run
//! (validation, configuration) or only the current item (everything else).

use std::fmt;

/// Unified error type covering all failure modes in mediaglyph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied input failed validation (e.g. a scan root that does
    /// not exist).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg) returned an error, timed out or could not
    /// be spawned.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A metadata lookup service failed.
    #[error("Lookup error [{provider}]: {message}")]
    Lookup {
        /// Provider that was queried.
        provider: String,
        /// Human-readable error description.
        message: String,
    },

    /// Image download, decode or encode failed.
    #[error("Image error: {0}")]
    Image(String),

    /// The artifact cache could not persist or read an entry.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl fmt::Display) -> Self {
        Error::Validation(message.to_string())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Lookup`].
    pub fn lookup(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Lookup {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error should abort a whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Config(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
