//! Byte-stream transport used by the client.
//!
//! The client only needs four operations from the network: connect, write
//! everything, read up to a delimiter, and close. [`Connector`] and
//! [`Transport`] name them so the engine can run over TCP or over a scripted
//! stream in tests.

use std::future::Future;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Maximum reply line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// An open, ordered byte stream to the server.
pub trait Transport: Send {
    /// Writes all of `data` and flushes it.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Reads until `delimiter` has been seen, returning the bytes including it.
    ///
    /// End of stream before the delimiter is an [`io::ErrorKind::UnexpectedEof`]
    /// error.
    fn read_until(&mut self, delimiter: &[u8]) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Releases the underlying stream. Calling it again does nothing.
    fn close(&mut self);
}

/// Opens [`Transport`]s.
pub trait Connector: Send + Sync {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Connects to `host:port`.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = io::Result<Self::Transport>> + Send;
}

/// [`Transport`] over any tokio stream.
#[derive(Debug)]
pub struct StreamTransport<S> {
    reader: Option<BufReader<S>>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: Some(BufReader::new(stream)),
        }
    }

    /// Returns true until [`Transport::close`] is called.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn reader(&mut self) -> io::Result<&mut BufReader<S>> {
        self.reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.reader()?.get_mut();
        stream.write_all(data).await?;
        stream.flush().await
    }

    async fn read_until(&mut self, delimiter: &[u8]) -> io::Result<Vec<u8>> {
        let Some(&last) = delimiter.last() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty delimiter",
            ));
        };
        let reader = self.reader()?;

        let mut buf = Vec::new();
        loop {
            if reader.read_until(last, &mut buf).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ));
            }
            if buf.ends_with(delimiter) {
                return Ok(buf);
            }
            if buf.len() > MAX_LINE_LENGTH {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line exceeds {MAX_LINE_LENGTH} bytes"),
                ));
            }
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Plain TCP transport.
pub type TcpTransport = StreamTransport<TcpStream>;

/// Connects over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpTransport> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(StreamTransport::new(stream))
    }
}
