//! SMTP connection management.

mod client;
mod config;
mod session;
mod stream;

pub use client::{AUTH_LOGIN_PLAIN, SmtpClient, plain_credentials};
pub use config::{ClientId, Config, ConfigBuilder, DEFAULT_PORT};
pub use stream::{Connector, StreamTransport, TcpConnector, TcpTransport, Transport};
