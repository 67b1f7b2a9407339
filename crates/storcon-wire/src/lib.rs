//! Wire format for talking to a remote storage agent.
//!
//! The agent speaks XML documents over TLS. This crate owns everything about
//! those documents except the socket work:
//!
//! - **Document** (`document.rs`): the generic element tree every layer is
//!   built on, with strict parse-until-complete semantics the transport's
//!   framing depends on
//! - **Variables** (`variable.rs`): the typed-value model — scalars,
//!   select scalars constrained by a `valid_values` modifier, opaque
//!   sub-documents, and read-only lists — encoded as `<var>` elements
//! - **Property sets** (`props.rs`): named variable collections with
//!   drop-malformed-entries import tolerance
//! - **Messages** (`message.rs`): the `request`/`function_call` and
//!   `response`/`function_response` vocabulary, including the mandatory
//!   `success` / optional `error_code` discipline
//! - **Envelope** (`envelope.rs`): the `process_batch`/`batch`/`module`
//!   wrapper around every call, the agent's hello, and the one-shot
//!   authenticate request
//!
//! The transport lives in `storcon-agent`, which moves these documents over
//! a TLS connection.

pub mod document;
pub mod envelope;
pub mod error;
pub mod message;
pub mod props;
pub mod variable;

// Re-export key types
pub use document::{Element, Node};
pub use envelope::Hello;
pub use error::{Result, WireError};
pub use message::{FunctionCall, FunctionResponse};
pub use props::Props;
pub use variable::{parse_variable, Payload, VarKind, Variable};
