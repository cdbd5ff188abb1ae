//! Transport over TCP or a local (Unix domain) socket.
//!
//! The two underlying stream kinds are switched on the endpoint
//! syntax: a host starting with `/` is a filesystem socket path,
//! anything else is `host:port` TCP. Callers see one interface either
//! way. The socket never reconnects itself; on a dropped peer it moves
//! to `Closing` and leaves teardown-and-reconnect to its owner.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{MpdError, Result};
use crate::protocol::reply::{is_terminated, Response};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-read wait. Elapsing retries the wait; it does not fail the
/// read. Only a dropped connection ends a read early.
const READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Local(UnixStream),
}

impl Stream {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf).await,
            #[cfg(unix)]
            Self::Local(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Tcp(s) => s.write_all(buf).await,
            #[cfg(unix)]
            Self::Local(s) => s.write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush().await,
            #[cfg(unix)]
            Self::Local(s) => s.flush().await,
        }
    }
}

/// A single protocol connection (command or idle role).
pub struct MpdSocket {
    stream: Option<Stream>,
    state: SocketState,
    local: bool,
}

impl MpdSocket {
    pub fn new() -> Self {
        Self {
            stream: None,
            state: SocketState::Disconnected,
            local: false,
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Whether the current endpoint is a local (Unix) socket.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Connect to `host:port`, or to the socket path `host` when it
    /// starts with `/`.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.disconnect();
        self.state = SocketState::Connecting;
        self.local = host.starts_with('/');

        let endpoint = if self.local {
            host.to_string()
        } else {
            format!("{}:{}", host, port)
        };

        let connected = if self.local {
            connect_local(host).await
        } else {
            timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
                .await
                .map(|r| r.map(Stream::Tcp))
        };

        match connected {
            Ok(Ok(stream)) => {
                debug!(endpoint, "connection established");
                self.stream = Some(stream);
                self.state = SocketState::Connected;
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = SocketState::Disconnected;
                Err(MpdError::Connectivity {
                    endpoint,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                self.state = SocketState::Disconnected;
                Err(MpdError::Connectivity {
                    endpoint,
                    reason: "connect timed out".to_string(),
                })
            }
        }
    }

    /// Write one command line; the terminating newline is appended.
    pub async fn write_command(&mut self, command: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(MpdError::ConnectionLost)?;
        let result = async {
            stream.write_all(command).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!("write failed: {}", e);
            self.state = SocketState::Closing;
            return Err(MpdError::ConnectionLost);
        }
        Ok(())
    }

    /// Accumulate bytes until a complete reply has arrived.
    ///
    /// A read that waits longer than the bounded timeout without
    /// producing terminal bytes is retried, not failed; a dropped
    /// connection moves the socket to `Closing` and returns whatever
    /// accumulated.
    pub async fn read_raw(&mut self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];

        while self.state == SocketState::Connected {
            let Some(stream) = self.stream.as_mut() else {
                break;
            };
            match timeout(READ_TIMEOUT, stream.read(&mut chunk)).await {
                Err(_) => {
                    debug!("waiting for read data");
                    continue;
                }
                Ok(Ok(0)) => {
                    debug!("connection closed by peer");
                    self.state = SocketState::Closing;
                    break;
                }
                Ok(Ok(n)) => {
                    data.extend_from_slice(&chunk[..n]);
                    if is_terminated(&data) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    warn!("read failed: {}", e);
                    self.state = SocketState::Closing;
                    break;
                }
            }
        }

        if data.len() > 256 {
            debug!("read {} bytes", data.len());
        } else {
            debug!("read: {:?}", String::from_utf8_lossy(&data));
        }
        data
    }

    /// Read one reply and classify it.
    pub async fn read_reply(&mut self) -> Response {
        let raw = self.read_raw().await;
        Response::classify(&raw)
    }

    pub fn disconnect(&mut self) {
        self.stream = None;
        self.state = SocketState::Disconnected;
    }
}

impl Default for MpdSocket {
    fn default() -> Self {
        Self::new()
    }
}

type ConnectOutcome = std::result::Result<std::io::Result<Stream>, tokio::time::error::Elapsed>;

#[cfg(unix)]
async fn connect_local(path: &str) -> ConnectOutcome {
    timeout(CONNECT_TIMEOUT, UnixStream::connect(path))
        .await
        .map(|r| r.map(Stream::Local))
}

#[cfg(not(unix))]
async fn connect_local(_path: &str) -> ConnectOutcome {
    Ok(Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "local sockets are not supported on this platform",
    )))
}
