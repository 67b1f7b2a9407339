//! Per-call agent sessions.
//!
//! `AgentClient` holds connection parameters only; every public operation
//! opens its own TLS connection, reads the agent's unsolicited hello, does
//! its work, and closes the connection before returning. Nothing is shared
//! between calls and two calls are never multiplexed onto one socket, so a
//! client may be driven from as many tasks as the caller likes.
//!
//! Within one call the order is fixed: hello is read before anything is
//! sent, and the response read strictly follows the request write.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::ServerName;

use storcon_wire::envelope::{authenticate_request, unwrap_process_batch, wrap_process_batch};
use storcon_wire::{Element, FunctionCall, FunctionResponse, Hello};

use crate::error::{AgentError, Result};
use crate::framing;
use crate::tls::TlsCredentials;

/// The port a storage agent listens on unless configured otherwise.
pub const DEFAULT_AGENT_PORT: u16 = 11111;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one remote storage agent.
#[derive(Debug, Clone)]
pub struct AgentClient {
    host: String,
    port: u16,
    credentials: TlsCredentials,
    timeout: Duration,
}

impl AgentClient {
    pub fn new(host: impl Into<String>, credentials: TlsCredentials) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_AGENT_PORT,
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Bound for connect and for each read/write within a call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the agent already trusts this client's certificate.
    pub async fn auth_check(&self) -> Result<bool> {
        let mut stream = self.open().await?;
        let hello = self.read_hello(&mut stream).await?;
        let _ = stream.shutdown().await;
        Ok(hello.authenticated())
    }

    /// Offer a password to the agent. Fire-and-forget: the agent sends no
    /// reply, so the only way to observe the outcome is a subsequent
    /// [`auth_check`](Self::auth_check).
    pub async fn authenticate(&self, password: &str) -> Result<()> {
        let mut stream = self.open().await?;
        let _hello = self.read_hello(&mut stream).await?;
        framing::send_document(&mut stream, &authenticate_request(password), self.timeout).await?;
        let _ = stream.shutdown().await;
        Ok(())
    }

    /// Send one request document to the storage module and return the inner
    /// response document, unwrapped from its envelope.
    pub async fn process(&self, request: Element) -> Result<Element> {
        let mut stream = self.open().await?;
        let _hello = self.read_hello(&mut stream).await?;

        framing::send_document(&mut stream, &wrap_process_batch(request), self.timeout).await?;
        let reply = framing::read_document(&mut stream, self.timeout).await;
        let _ = stream.shutdown().await;

        let reply = reply?.ok_or(AgentError::FramingIncomplete)?;
        unwrap_process_batch(&reply).ok_or(AgentError::EnvelopeMismatch)
    }

    /// Invoke a remote function and decode its response.
    pub async fn call(&self, call: &FunctionCall) -> Result<FunctionResponse> {
        tracing::debug!(function = call.name(), host = %self.host, "calling agent");
        let inner = self.process(call.to_request()).await?;
        Ok(FunctionResponse::from_response(&inner)?)
    }

    async fn open(&self) -> Result<TlsStream<TcpStream>> {
        let addr = format!("{}:{}", self.host, self.port);

        let tcp = match time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(AgentError::ConnectFailed { addr, source }),
            Err(_) => return Err(AgentError::Timeout),
        };

        let connector = self.credentials.connector()?;
        let server_name = ServerName::try_from(self.host.as_str())
            .map_err(|_| AgentError::InvalidHost(self.host.clone()))?;

        let stream = match time::timeout(self.timeout, connector.connect(server_name, tcp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(AgentError::ConnectFailed { addr, source }),
            Err(_) => return Err(AgentError::Timeout),
        };

        tracing::debug!(%addr, "connected to agent");
        Ok(stream)
    }

    /// Read the hello the agent sends immediately after the TLS accept.
    async fn read_hello(&self, stream: &mut TlsStream<TcpStream>) -> Result<Hello> {
        let doc = framing::read_document(stream, self.timeout)
            .await?
            .ok_or(AgentError::FramingIncomplete)?;
        let hello = Hello::new(doc);
        tracing::debug!(
            authenticated = hello.authenticated(),
            hostname = hello.hostname().unwrap_or(""),
            "received agent hello"
        );
        Ok(hello)
    }
}
