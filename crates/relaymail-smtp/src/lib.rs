//! # relaymail-smtp
//!
//! An asynchronous SMTP submission client for relays speaking RFC 5321.
//!
//! ## Features
//!
//! - **Lazy negotiation**: EHLO is sent on demand before AUTH and before a
//!   size-aware MAIL FROM
//! - **AUTH PLAIN** with a single initial response
//! - **Reply-code recovery**: `421` closes the connection, other MAIL/RCPT
//!   refusals reset the session with a best-effort RSET
//! - **Typed failures**: sender, recipient, data and authentication refusals
//!   are distinct [`Error`] variants carrying the code and reply text
//! - **Pluggable transport**: [`Connector`] / [`Transport`] traits, TCP by
//!   default
//!
//! ## Quick Start
//!
//! ```no_run
//! use relaymail_smtp::SmtpClient;
//!
//! # async fn run() -> relaymail_smtp::Result<()> {
//! let mut client = SmtpClient::new();
//! client.connect("smtp.example.com", 25).await?;
//! client.login("user@example.com", "password").await?;
//!
//! let body = "Subject: Test\r\n\r\nHello, World!\r\n";
//! client
//!     .send_mail("user@example.com", "friend@example.com", body, &[], &[])
//!     .await?;
//!
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── connect() ──→ Connected ── ehlo() ──→ Greeted ── login() ──→ Authenticated
//! Greeted | Authenticated ── mail() ──→ InTransaction ── rcpt() ──→ RecipientsAccepted
//! RecipientsAccepted ── data() ──→ Greeted
//! any state ── close() | 421 | transport failure | timeout ──→ Closed
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Transport, configuration and the client itself
//! - [`message`]: DATA payload preparation
//! - [`parser`]: Reply parser
//! - [`types`]: Core SMTP types (replies, capabilities, recipients)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod message;
pub mod parser;
pub mod types;

pub use connection::{
    ClientId, Config, ConfigBuilder, Connector, SmtpClient, StreamTransport, TcpConnector,
    Transport,
};
pub use error::{Error, Result};
pub use message::MailBody;
pub use types::{Capabilities, Recipients, Reply, ReplyCode};
