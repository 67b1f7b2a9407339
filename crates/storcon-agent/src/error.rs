//! Error types for the agent transport.

use storcon_wire::WireError;
use thiserror::Error;

/// Result type alias using [`AgentError`]
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur while talking to a storage agent.
///
/// `ConnectFailed`, `FramingIncomplete`, `EnvelopeMismatch` and `Timeout`
/// all mean the same thing to a caller — no usable document came back — and
/// none of them is retried automatically. Retry policy belongs to whoever
/// drives the client.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Socket or TLS establishment failed (nothing listening, refused,
    /// handshake rejected)
    #[error("failed to connect to agent at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Client certificate/key material could not be loaded
    #[error("invalid TLS credentials: {0}")]
    Credentials(String),

    /// TLS configuration was rejected
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// The configured host is not a valid TLS server name
    #[error("invalid agent host name: {0}")]
    InvalidHost(String),

    /// I/O failure on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before a complete document accumulated
    #[error("connection closed before a complete document arrived")]
    FramingIncomplete,

    /// The agent went silent past the configured timeout
    #[error("timed out waiting for the agent")]
    Timeout,

    /// A reply arrived but the batch/module envelope was not there
    #[error("agent response did not contain the expected envelope")]
    EnvelopeMismatch,

    /// Decode error from the wire layer
    #[error(transparent)]
    Wire(#[from] WireError),
}
