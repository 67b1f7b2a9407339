//! Outer transport envelope and handshake documents.
//!
//! Every application request rides inside a fixed three-level wrapper on the
//! wire: the agent envelope (`function="process_batch"`), a `batch`, and the
//! `module` that should handle the payload. Responses mirror the nesting and
//! are unwrapped level by level; a missing level means the reply is unusable
//! and the caller gets `None` rather than a partially-unwrapped tree.
//!
//! The agent also speaks two envelope-level documents that never carry a
//! payload: the hello it sends unprompted after every TLS accept, and the
//! one-shot `authenticate` request the console fires at it.

use crate::document::Element;

/// Root tag of the envelope and of the agent's hello.
pub const ENVELOPE_TAG: &str = "agent";
pub const BATCH_TAG: &str = "batch";
pub const MODULE_TAG: &str = "module";

/// Envelope protocol version.
pub const ENVELOPE_VERSION: &str = "1.0";
/// The module every storage request is addressed to.
pub const STORAGE_MODULE: &str = "storage";

const VERSION_ATTR: &str = "version";
const FUNCTION_ATTR: &str = "function";
const ASYNC_ATTR: &str = "async";
const MODULE_NAME_ATTR: &str = "name";
const PASSWORD_ATTR: &str = "password";
const AUTHENTICATED_ATTR: &str = "authenticated";
const HOSTNAME_ATTR: &str = "hostname";

const FN_PROCESS_BATCH: &str = "process_batch";
const FN_AUTHENTICATE: &str = "authenticate";

/// Wrap a request document for synchronous processing by the storage module.
pub fn wrap_process_batch(request: Element) -> Element {
    Element::new(ENVELOPE_TAG)
        .with_attr(VERSION_ATTR, ENVELOPE_VERSION)
        .with_attr(FUNCTION_ATTR, FN_PROCESS_BATCH)
        .with_attr(ASYNC_ATTR, "false")
        .with_child(
            Element::new(BATCH_TAG).with_child(
                Element::new(MODULE_TAG)
                    .with_attr(MODULE_NAME_ATTR, STORAGE_MODULE)
                    .with_child(request),
            ),
        )
}

/// Unwrap a response envelope: descend root → batch → module → first
/// element child, and promote that child to a standalone document.
///
/// Returns `None` if any level is absent.
pub fn unwrap_process_batch(envelope: &Element) -> Option<Element> {
    envelope
        .find_child(BATCH_TAG)?
        .find_child(MODULE_TAG)?
        .first_element()
        .cloned()
}

/// The one-shot authentication request. No response follows; the caller
/// observes the outcome with a later hello.
pub fn authenticate_request(password: &str) -> Element {
    Element::new(ENVELOPE_TAG)
        .with_attr(VERSION_ATTR, ENVELOPE_VERSION)
        .with_attr(FUNCTION_ATTR, FN_AUTHENTICATE)
        .with_attr(PASSWORD_ATTR, password)
}

/// Typed view over the hello document the agent sends after connecting.
#[derive(Debug, Clone)]
pub struct Hello {
    root: Element,
}

impl Hello {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Whether this client's certificate is already trusted by the agent.
    /// Anything but the literal `"true"` counts as unauthenticated.
    pub fn authenticated(&self) -> bool {
        self.root.attr(AUTHENTICATED_ATTR) == Some("true")
    }

    pub fn version(&self) -> Option<&str> {
        self.root.attr(VERSION_ATTR)
    }

    /// The agent's own idea of its hostname, when it advertises one.
    pub fn hostname(&self) -> Option<&str> {
        self.root.attr(HOSTNAME_ATTR)
    }

    pub fn into_inner(self) -> Element {
        self.root
    }
}
