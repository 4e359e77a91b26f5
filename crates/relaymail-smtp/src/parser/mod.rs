//! SMTP reply parser.
//!
//! Replies can be single-line or multi-line:
//! - Single: `250 OK\r\n`
//! - Multi: `250-SIZE 35882577\r\n250 AUTH LOGIN PLAIN\r\n`
//!
//! A line is final when its fourth character is a space or the line ends
//! after the code; any other separator marks a continuation.

use crate::connection::Transport;
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Line terminator on the wire.
pub const CRLF: &[u8] = b"\r\n";

/// One decoded reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// The three-digit code.
    pub code: ReplyCode,
    /// True if more lines follow for the same reply.
    pub continuation: bool,
    /// Text after the separator, without the line terminator.
    pub text: String,
}

/// Decodes a single reply line.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line does not start with three digits.
pub fn decode_reply_line(line: &str) -> Result<ReplyLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let code = ReplyCode::parse(line)
        .ok_or_else(|| Error::Protocol(format!("Invalid reply line: {line:?}")))?;

    Ok(ReplyLine {
        code,
        continuation: !matches!(line.as_bytes().get(3), None | Some(b' ')),
        text: line.get(4..).unwrap_or_default().to_string(),
    })
}

/// Accumulates decoded lines into a [`Reply`].
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    lines: Vec<String>,
}

impl ReplyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Feeds one raw line.
    ///
    /// Returns the finished reply once a non-continuation line is fed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line is malformed.
    pub fn push(&mut self, raw: &str) -> Result<Option<Reply>> {
        let line = decode_reply_line(raw)?;
        self.lines.push(line.text);
        if line.continuation {
            return Ok(None);
        }
        Ok(Some(Reply::new(line.code, std::mem::take(&mut self.lines))))
    }
}

/// Parses a complete reply from already-split lines.
///
/// # Errors
///
/// Returns an error if a line is malformed or the last line is a
/// continuation line.
pub fn parse_reply<S: AsRef<str>>(lines: &[S]) -> Result<Reply> {
    let mut builder = ReplyBuilder::new();
    for line in lines {
        if let Some(reply) = builder.push(line.as_ref())? {
            return Ok(reply);
        }
    }
    Err(Error::Protocol("Incomplete reply".into()))
}

/// Reads one complete reply from the transport.
///
/// # Errors
///
/// Returns [`Error::Transport`] if reading fails part-way and
/// [`Error::Protocol`] for a malformed line.
pub async fn read_reply<T: Transport>(transport: &mut T) -> Result<Reply> {
    let mut builder = ReplyBuilder::new();
    loop {
        let raw = transport.read_until(CRLF).await?;
        let line = String::from_utf8_lossy(&raw);
        tracing::trace!(line = %line.trim_end(), "S:");
        if let Some(reply) = builder.push(&line)? {
            return Ok(reply);
        }
    }
}
