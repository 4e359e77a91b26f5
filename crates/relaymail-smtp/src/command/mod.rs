//! SMTP command builder.
//!
//! Verbs are sent in the lower-case form most relays log (`mail FROM:<..>`),
//! except `AUTH`, which is conventionally upper-case.

use crate::error::{Error, Result};
use crate::types::{AuthMechanism, quote_address};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname, sent as an address literal `[hostname]`
        hostname: String,
    },
    /// AUTH - Authenticate with an initial response
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Base64 initial response
        initial_response: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address (quoted on serialization)
        from: String,
        /// ESMTP parameters, e.g. `size=1024`
        options: Vec<String>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address (quoted on serialization)
        to: String,
        /// ESMTP parameters
        options: Vec<String>,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Returns the verb, for logging.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "ehlo",
            Self::Auth { .. } => "AUTH",
            Self::MailFrom { .. } => "mail",
            Self::RcptTo { .. } => "rcpt",
            Self::Data => "data",
            Self::Rset => "rset",
            Self::Noop => "noop",
            Self::Quit => "quit",
        }
    }

    /// Serializes the command to bytes, CRLF included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if an address, option or other
    /// argument contains a line break.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            Self::Ehlo { hostname } => {
                let literal = format!("[{}]", strip_brackets(hostname));
                encode_command(self.verb(), &[literal.as_str()])
            }
            Self::Auth {
                mechanism,
                initial_response,
            } => encode_command(
                self.verb(),
                &[mechanism.as_str(), initial_response.as_str()],
            ),
            Self::MailFrom { from, options } => {
                let path = format!("FROM:{}", quote_address(from));
                encode_command(self.verb(), &with_options(&path, options))
            }
            Self::RcptTo { to, options } => {
                let path = format!("TO:{}", quote_address(to));
                encode_command(self.verb(), &with_options(&path, options))
            }
            Self::Data | Self::Rset | Self::Noop | Self::Quit => {
                encode_command(self.verb(), &[])
            }
        }
    }

    /// Returns the command line as logged: credentials are redacted.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth { mechanism, .. } => format!("AUTH {} ****", mechanism.as_str()),
            _ => match self.serialize() {
                Ok(line) => String::from_utf8_lossy(&line).trim_end().to_string(),
                Err(_) => format!("{} <invalid>", self.verb()),
            },
        }
    }
}

/// Joins a verb and its arguments with single spaces and appends CRLF.
///
/// Empty arguments are skipped, surrounding whitespace is trimmed, and a CRLF
/// already ending the text is not doubled.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if a CR or LF remains inside the line,
/// since it would put a second command on the wire.
pub fn encode_command(verb: &str, args: &[&str]) -> Result<Vec<u8>> {
    let mut line = String::from(verb);
    for arg in args.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        line.push(' ');
        line.push_str(arg);
    }
    let line = line.trim_end_matches(['\r', '\n']).trim();
    if line.contains(['\r', '\n']) {
        return Err(Error::InvalidArgument(line.to_string()));
    }

    let mut buf = Vec::with_capacity(line.len() + 2);
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(b"\r\n");
    Ok(buf)
}

fn with_options<'a>(path: &'a str, options: &'a [String]) -> Vec<&'a str> {
    std::iter::once(path)
        .chain(options.iter().map(String::as_str))
        .collect()
}

fn strip_brackets(hostname: &str) -> &str {
    hostname
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
}
