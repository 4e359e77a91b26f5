//! SMTP protocol engine.

use std::fmt;

use base64::Engine;
use tokio::time::timeout;

use super::config::{ClientId, Config, DEFAULT_PORT};
use super::stream::{Connector, TcpConnector, Transport};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::message::prepare_data;
use crate::parser::read_reply;
use crate::types::{AuthMechanism, Capabilities, Reply, ReplyCode};

/// Capability line whose absence is worth a warning after EHLO.
pub const AUTH_LOGIN_PLAIN: &str = "AUTH LOGIN PLAIN";

/// Asynchronous SMTP client for one connection at a time.
///
/// Every operation takes `&mut self`, so exactly one command/reply exchange
/// is in flight. Use one client per connection; clients share no state.
///
/// A `421` reply, a transport failure, a malformed reply or an expired
/// timeout closes the connection. After that every operation fails with
/// [`Error::NotConnected`] until [`connect`](Self::connect) is called again.
pub struct SmtpClient<C: Connector = TcpConnector> {
    connector: C,
    config: Config,
    stream: Option<C::Transport>,
    host: Option<String>,
    port: u16,
    ehlo_done: bool,
    capabilities: Capabilities,
    // EHLO name, resolved once per client.
    local_name: Option<String>,
    // Set while a command is awaiting its reply; still set on the next call
    // if the caller dropped the previous future mid-exchange.
    exchange_pending: bool,
}

impl SmtpClient<TcpConnector> {
    /// Creates a TCP client with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(TcpConnector, Config::default())
    }
}

impl Default for SmtpClient<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> fmt::Debug for SmtpClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.stream.is_some())
            .field("ehlo_done", &self.ehlo_done)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> SmtpClient<C> {
    /// Creates a client that opens connections through `connector`.
    pub fn with_connector(connector: C, config: Config) -> Self {
        Self {
            connector,
            config,
            stream: None,
            host: None,
            port: DEFAULT_PORT,
            ehlo_done: false,
            capabilities: Capabilities::default(),
            local_name: None,
            exchange_pending: false,
        }
    }

    /// Returns true while a connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns true once EHLO has completed on the current connection.
    #[must_use]
    pub const fn ehlo_done(&self) -> bool {
        self.ehlo_done
    }

    /// Returns the capabilities negotiated by the last EHLO.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns the host of the last connection.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the port of the last connection.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Connects and reads the server greeting.
    ///
    /// Any previous connection is closed first. The greeting is returned
    /// whatever its code.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the greeting read fails.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<Reply> {
        self.close();
        tracing::info!(host, port, "Connecting to SMTP server");

        let limit = self.config.connect_timeout;
        let transport = timeout(limit, self.connector.connect(host, port))
            .await
            .map_err(|_| Error::Timeout(limit))??;

        self.stream = Some(transport);
        self.host = Some(host.to_string());
        self.port = port;

        self.round_trip(None).await
    }

    /// Sends EHLO and records the reply lines as capabilities.
    ///
    /// The reply code is not checked: the exchange counts as done either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange itself fails.
    pub async fn ehlo(&mut self) -> Result<Reply> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let hostname = self.local_name().await;
        let reply = self.send(&Command::Ehlo { hostname }).await?;

        self.ehlo_done = true;
        self.capabilities = Capabilities::from_lines(&reply.lines);
        if !self.capabilities.contains(AUTH_LOGIN_PLAIN) {
            tracing::warn!("AUTH LOGIN PLAIN not in esmtp features");
        }

        Ok(reply)
    }

    /// Authenticates with `AUTH PLAIN`, sending EHLO first if needed.
    ///
    /// `235` and `503` (already authenticated) count as success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] for any other reply code.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Reply> {
        self.ensure_ehlo().await?;

        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: plain_credentials(username, password),
        };
        let reply = self.send(&cmd).await?;

        match reply.code {
            ReplyCode::AUTH_SUCCEEDED | ReplyCode::BAD_SEQUENCE => Ok(reply),
            code => Err(Error::Authentication {
                code,
                lines: reply.lines,
            }),
        }
    }

    /// Resets the session. Failures are logged and ignored.
    pub async fn rset(&mut self) {
        if let Err(e) = self.send(&Command::Rset).await {
            tracing::debug!(error = %e, "RSET failed, ignoring");
        }
    }

    /// Sends `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SenderRefused`] unless the reply is `250`. A `421`
    /// closes the connection first; any other refusal sends RSET first.
    pub async fn mail(&mut self, from: &str, options: &[String]) -> Result<Reply> {
        let cmd = Command::MailFrom {
            from: from.to_string(),
            options: options.to_vec(),
        };
        let reply = self.send(&cmd).await?;

        if reply.code == ReplyCode::OK {
            return Ok(reply);
        }
        self.recover_from(reply.code).await;
        Err(Error::SenderRefused {
            code: reply.code,
            lines: reply.lines,
            address: from.to_string(),
        })
    }

    /// Sends `RCPT TO`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecipientRefused`] unless the reply is `250` or
    /// `251`, after the same 421/RSET handling as [`mail`](Self::mail).
    pub async fn rcpt(&mut self, to: &str, options: &[String]) -> Result<Reply> {
        let cmd = Command::RcptTo {
            to: to.to_string(),
            options: options.to_vec(),
        };
        let reply = self.send(&cmd).await?;

        if matches!(reply.code, ReplyCode::OK | ReplyCode::FORWARD) {
            return Ok(reply);
        }
        self.recover_from(reply.code).await;
        Err(Error::RecipientRefused {
            code: reply.code,
            lines: reply.lines,
            address: to.to_string(),
        })
    }

    /// Sends `DATA`, then the dot-stuffed payload and the end-of-data line.
    ///
    /// `payload` must not be stuffed already.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataRefused`] if `DATA` is not answered with `354`
    /// or the payload is not answered with `250`. A final `421` closes the
    /// connection first.
    pub async fn data(&mut self, payload: &[u8]) -> Result<Reply> {
        let reply = self.send(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::DataRefused {
                code: reply.code,
                lines: reply.lines,
            });
        }

        let framed = prepare_data(payload);
        tracing::debug!(bytes = framed.len(), "C: <message data>");
        let reply = self.round_trip(Some(&framed)).await?;

        match reply.code {
            ReplyCode::OK => Ok(reply),
            code => {
                if code == ReplyCode::SERVICE_UNAVAILABLE {
                    self.close();
                }
                Err(Error::DataRefused {
                    code,
                    lines: reply.lines,
                })
            }
        }
    }

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn noop(&mut self) -> Result<Reply> {
        self.send(&Command::Noop).await
    }

    /// Sends `QUIT` and closes the connection whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails; the connection is closed anyway.
    pub async fn quit(&mut self) -> Result<Reply> {
        let result = self.send(&Command::Quit).await;
        self.close();
        result
    }

    /// Releases the connection and forgets the negotiated state.
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            tracing::debug!(host = ?self.host, port = self.port, "Connection closed");
        }
        self.ehlo_done = false;
        self.capabilities.clear();
        self.exchange_pending = false;
    }

    /// Resolves the configured client id at most once per client.
    ///
    /// The system hostname lookup may hit DNS, so it runs on the blocking pool.
    async fn local_name(&mut self) -> String {
        if let Some(name) = &self.local_name {
            return name.clone();
        }
        let name = match &self.config.client_id {
            ClientId::Domain(name) => name.clone(),
            ClientId::System => {
                match tokio::task::spawn_blocking(|| ClientId::System.resolve()).await {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::debug!(error = %e, "Hostname lookup aborted, using localhost");
                        "localhost".to_string()
                    }
                }
            }
        };
        self.local_name = Some(name.clone());
        name
    }

    pub(crate) async fn ensure_ehlo(&mut self) -> Result<()> {
        if !self.ehlo_done {
            self.ehlo().await?;
        }
        Ok(())
    }

    async fn recover_from(&mut self, code: ReplyCode) {
        if code == ReplyCode::SERVICE_UNAVAILABLE {
            self.close();
        } else {
            self.rset().await;
        }
    }

    async fn send(&mut self, cmd: &Command) -> Result<Reply> {
        let data = cmd.serialize()?;
        tracing::debug!(command = %cmd.redacted(), "C:");
        self.round_trip(Some(&data)).await
    }

    /// Writes `data` (if any) and reads one reply, bounded by the I/O timeout.
    async fn round_trip(&mut self, data: Option<&[u8]>) -> Result<Reply> {
        if self.exchange_pending {
            tracing::warn!("Previous exchange was abandoned, closing connection");
            self.close();
            return Err(Error::NotConnected);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotConnected);
        };

        let limit = self.config.io_timeout;
        self.exchange_pending = true;
        let outcome = timeout(limit, exchange(stream, data)).await;
        self.exchange_pending = false;

        match outcome {
            Ok(Ok(reply)) => {
                tracing::debug!(code = %reply.code, text = %reply.message_text(), "S:");
                Ok(reply)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "SMTP exchange failed, closing connection");
                self.close();
                Err(e)
            }
            Err(_) => {
                tracing::warn!(?limit, "SMTP exchange timed out, closing connection");
                self.close();
                Err(Error::Timeout(limit))
            }
        }
    }
}

async fn exchange<T: Transport>(stream: &mut T, data: Option<&[u8]>) -> Result<Reply> {
    if let Some(data) = data {
        stream.write_all(data).await?;
    }
    read_reply(stream).await
}

/// Builds the `AUTH PLAIN` initial response: base64 of `\0user\0password`.
#[must_use]
pub fn plain_credentials(username: &str, password: &str) -> String {
    let credentials = format!("\0{username}\0{password}");
    base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
}
