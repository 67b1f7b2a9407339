//! TLS transport and session layer for the storage agent protocol.
//!
//! A storage agent listens on a fixed TLS port and speaks one XML document
//! at a time, with no length framing: the receiver reads until the bytes in
//! hand parse as a complete document. After every TLS accept the agent sends
//! an unsolicited hello announcing whether the client's certificate is
//! trusted; requests ride inside a `process_batch` envelope and are answered
//! with the mirror structure.
//!
//! The crate has three layers:
//! - **TLS** (`tls.rs`): client certificate/key loading and connector setup
//! - **Framing** (`framing.rs`): parse-until-valid receive and full-write
//!   send, with timeouts
//! - **Client** (`client.rs`): `AgentClient`, which runs one connection per
//!   call: connect → hello → send → receive → unwrap → close
//!
//! # Example
//!
//! ```rust,no_run
//! use storcon_agent::{AgentClient, TlsCredentials};
//! use storcon_wire::{FunctionCall, Variable};
//!
//! # async fn example() -> storcon_agent::Result<()> {
//! let creds = TlsCredentials::new("certs/client-cert.pem", "certs/client-key.pem");
//! let client = AgentClient::new("storage1.example.com", creds);
//!
//! if !client.auth_check().await? {
//!     client.authenticate("password").await?;
//! }
//!
//! let response = client
//!     .call(&FunctionCall::new("get_mapper_ids").arg(Variable::new("mapper_type", "volume_group")))
//!     .await?;
//! response.require_success()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod framing;
pub mod tls;

// Re-export key types
pub use client::{AgentClient, DEFAULT_AGENT_PORT};
pub use error::{AgentError, Result};
pub use tls::TlsCredentials;
