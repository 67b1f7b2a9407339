//! Error types for wire marshalling and message decoding.

use thiserror::Error;

/// Result type alias using [`WireError`]
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur while encoding or decoding wire documents.
#[derive(Debug, Error)]
pub enum WireError {
    /// XML syntax error from the underlying parser
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The input ended before the root element was closed.
    ///
    /// The transport's receive loop relies on this to tell "keep reading"
    /// apart from a complete document.
    #[error("incomplete XML document")]
    Truncated,

    /// Non-whitespace content outside the root element
    #[error("content outside of root element")]
    ContentOutsideRoot,

    /// A variable element is missing required attributes or carries an
    /// unparseable value
    #[error("malformed variable: {0}")]
    MalformedVariable(String),

    /// A variable element declared a type this protocol does not know
    #[error("unknown variable type: {0}")]
    UnknownVariableType(String),

    /// A list entry inside a string-list variable is missing its value
    #[error("malformed list entry in variable {0}")]
    MalformedListEntry(String),

    /// List payloads are read-only once constructed
    #[error("list variable values cannot be replaced")]
    ListImmutable,

    /// A response document is missing the protocol-critical skeleton
    /// (`response`/`function_response`/`success`)
    #[error("unrecognized response: {0}")]
    UnrecognizedResponse(String),

    /// The remote decoded our request but reported a failure
    #[error("agent reported error: {}", code.as_deref().unwrap_or("unknown error from remote"))]
    RemoteError { code: Option<String> },
}
