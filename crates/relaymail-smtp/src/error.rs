//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Server refusals are split per verb so callers can tell a rejected sender
/// from a rejected recipient, a rejected message body or failed credentials
/// without inspecting the text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The byte stream failed (connect, write or read).
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// The server sent a line that is not a well-formed reply.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A command argument would break the line framing (embedded CR or LF).
    ///
    /// Raised before anything is written; the connection stays usable.
    #[error("invalid command argument: {0:?}")]
    InvalidArgument(String),

    /// MAIL FROM was refused.
    #[error("sender {address} refused: {code} {}", .lines.join(" "))]
    SenderRefused {
        /// Reply code.
        code: ReplyCode,
        /// Reply text, one entry per line.
        lines: Vec<String>,
        /// The refused sender address.
        address: String,
    },

    /// RCPT TO was refused.
    #[error("recipient {address} refused: {code} {}", .lines.join(" "))]
    RecipientRefused {
        /// Reply code.
        code: ReplyCode,
        /// Reply text, one entry per line.
        lines: Vec<String>,
        /// The refused recipient address.
        address: String,
    },

    /// DATA or the message body was refused.
    #[error("message data refused: {code} {}", .lines.join(" "))]
    DataRefused {
        /// Reply code.
        code: ReplyCode,
        /// Reply text, one entry per line.
        lines: Vec<String>,
    },

    /// AUTH was rejected.
    #[error("authentication failed: {code} {}", .lines.join(" "))]
    Authentication {
        /// Reply code.
        code: ReplyCode,
        /// Reply text, one entry per line.
        lines: Vec<String>,
    },

    /// The client has no open connection.
    #[error("not connected")]
    NotConnected,

    /// An exchange did not finish in time; the connection has been closed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Returns the server reply code carried by a refusal.
    #[must_use]
    pub const fn code(&self) -> Option<ReplyCode> {
        match self {
            Self::SenderRefused { code, .. }
            | Self::RecipientRefused { code, .. }
            | Self::DataRefused { code, .. }
            | Self::Authentication { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the server reply text carried by a refusal.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        match self {
            Self::SenderRefused { lines, .. }
            | Self::RecipientRefused { lines, .. }
            | Self::DataRefused { lines, .. }
            | Self::Authentication { lines, .. } => lines,
            _ => &[],
        }
    }

    /// Returns true if the server announced it is shutting down (421).
    ///
    /// The client closes its connection before such an error is returned.
    #[must_use]
    pub fn is_service_shutdown(&self) -> bool {
        self.code() == Some(ReplyCode::SERVICE_UNAVAILABLE)
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.code().is_some_and(ReplyCode::is_permanent)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.code().is_some_and(ReplyCode::is_transient)
    }
}
