//! Error taxonomy for the protocol engine.
//!
//! Nothing here is fatal to the host process: connectivity and auth
//! failures surface as `ConnectivityChanged(false)` bus events and are
//! retried lazily on the next command, protocol errors leave the
//! connection usable, and reconciliation failures degrade to a full
//! queue refresh.

use thiserror::Error;

/// Errors produced by the MPD protocol engine.
#[derive(Debug, Error)]
pub enum MpdError {
    /// No host/port configured yet; commands are rejected until
    /// `configure` has been called with connection details.
    #[error("no connection details configured")]
    NotConfigured,

    /// The transport could not be established.
    #[error("unable to connect to {endpoint}: {reason}")]
    Connectivity { endpoint: String, reason: String },

    /// The configured password was rejected during the handshake.
    #[error("password rejected by server")]
    AuthRejected,

    /// The server answered a command with `ACK`; the message has the
    /// `{command} ` envelope already stripped.
    #[error("server error: {0}")]
    Protocol(String),

    /// The peer dropped the connection mid-exchange.
    #[error("connection lost")]
    ConnectionLost,
}

pub type Result<T> = std::result::Result<T, MpdError>;
