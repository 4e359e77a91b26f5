//! Client configuration types.

use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;

/// Name the client announces in EHLO.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientId {
    /// Ask the operating system for the local hostname.
    #[default]
    System,
    /// Use a fixed name or address literal.
    Domain(String),
}

impl ClientId {
    /// Resolves the name to put inside the EHLO address literal.
    ///
    /// A system hostname without a domain part is replaced by the first IPv4
    /// address it resolves to, bracketed, when it resolves at all. That
    /// lookup blocks, so [`SmtpClient`](super::SmtpClient) runs it on the
    /// blocking pool and caches the result.
    #[must_use]
    pub fn resolve(&self) -> String {
        match self {
            Self::Domain(name) => name.clone(),
            Self::System => {
                let name = hostname::get()
                    .map(|h| h.to_string_lossy().to_string())
                    .unwrap_or_else(|_| "localhost".to_string());
                qualify(name)
            }
        }
    }
}

fn qualify(name: String) -> String {
    if name.contains('.') {
        return name;
    }
    let ipv4 = (name.as_str(), 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .map(|a| a.ip());
    match ipv4 {
        Some(IpAddr::V4(ip)) => format!("[{ip}]"),
        _ => name,
    }
}

/// SMTP client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Limit for one command/reply exchange.
    pub io_timeout: Duration,
    /// Name announced in EHLO.
    pub client_id: ClientId,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            client_id: ClientId::System,
        }
    }
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for client configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the per-exchange timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Announces `name` in EHLO instead of the system hostname.
    #[must_use]
    pub fn client_id(mut self, name: impl Into<String>) -> Self {
        self.config.client_id = ClientId::Domain(name.into());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}
