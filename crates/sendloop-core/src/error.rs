//! SendLoop error type.

use thiserror::Error;

/// Unified error type for the SendLoop workspace.
#[derive(Error, Debug)]
pub enum SendLoopError {
    /// Configuration file missing, unreadable, or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// Record store (Google Sheets) read or write failed.
    #[error("Record store error: {0}")]
    Store(String),

    /// Messaging gateway (WhatsApp Cloud API) call failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Credentials rejected by an external API.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Record contents failed validation (e.g. malformed phone number).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, SendLoopError>;
