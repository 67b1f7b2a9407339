//! Inner request/response vocabulary.
//!
//! A request is a `<request>` element carrying a sequence number and the
//! protocol version, with a single `<function_call>` child naming the remote
//! operation and holding its variable-encoded arguments. The matching
//! response is `<response>` → `<function_response>` → variables, which must
//! include a boolean `success`; on failure the agent should also send an
//! `error_code` string.
//!
//! Decoding follows the same tolerance rules as property import: auxiliary
//! variables that fail to decode are dropped, but a missing skeleton or a
//! missing/mistyped `success` aborts with
//! [`WireError::UnrecognizedResponse`].

use std::collections::BTreeMap;

use crate::document::Element;
use crate::error::{Result, WireError};
use crate::variable::{parse_variable, Payload, Variable};

pub const REQUEST_TAG: &str = "request";
pub const RESPONSE_TAG: &str = "response";
pub const FUNCTION_CALL_TAG: &str = "function_call";
pub const FUNCTION_RESPONSE_TAG: &str = "function_response";

const SEQUENCE_ATTR: &str = "sequence";
const API_VERSION_ATTR: &str = "API_version";
const FUNCTION_NAME_ATTR: &str = "name";

/// Protocol version stamped on every request.
pub const API_VERSION: &str = "1.0";

/// The sequence number sent when the caller does not choose one. The agent
/// echoes it back; correlation is by connection, so a fixed value is fine.
pub const DEFAULT_SEQUENCE: u32 = 1254;

/// Response variable that every function response must carry.
pub const SUCCESS_VAR: &str = "success";
/// Response variable holding the agent's diagnostic on failure.
pub const ERROR_CODE_VAR: &str = "error_code";

/// Builder for one remote function invocation.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    name: String,
    sequence: u32,
    args: Vec<Variable>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: DEFAULT_SEQUENCE,
            args: Vec::new(),
        }
    }

    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Append an argument variable.
    pub fn arg(mut self, var: Variable) -> Self {
        self.args.push(var);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode as a `<request>` document ready for the transport envelope.
    pub fn to_request(&self) -> Element {
        let mut call = Element::new(FUNCTION_CALL_TAG);
        call.set_attr(FUNCTION_NAME_ATTR, &self.name);
        for var in &self.args {
            call.append(var.to_element());
        }
        Element::new(REQUEST_TAG)
            .with_attr(SEQUENCE_ATTR, self.sequence.to_string())
            .with_attr(API_VERSION_ATTR, API_VERSION)
            .with_child(call)
    }
}

/// A decoded function response: the variables the agent returned.
#[derive(Debug, Clone)]
pub struct FunctionResponse {
    vars: BTreeMap<String, Variable>,
}

impl FunctionResponse {
    /// Decode the document returned by the transport.
    ///
    /// Expects `response` → `function_response` → variables; a response
    /// without that skeleton, or without a boolean `success` variable, is
    /// unrecognized.
    pub fn from_response(root: &Element) -> Result<Self> {
        if root.name() != RESPONSE_TAG {
            return Err(WireError::UnrecognizedResponse(format!(
                "expected {RESPONSE_TAG} element, got {}",
                root.name()
            )));
        }
        let func = root.find_child(FUNCTION_RESPONSE_TAG).ok_or_else(|| {
            WireError::UnrecognizedResponse(format!("missing {FUNCTION_RESPONSE_TAG} element"))
        })?;

        let mut vars = BTreeMap::new();
        for node in func.children() {
            match parse_variable(node) {
                Ok(var) => {
                    vars.insert(var.name().to_string(), var);
                }
                Err(err) => {
                    tracing::debug!("skipping response variable that failed to decode: {err}");
                }
            }
        }

        let response = Self { vars };
        match response.get(SUCCESS_VAR) {
            Some(Payload::Bool(_)) => Ok(response),
            Some(_) => Err(WireError::UnrecognizedResponse(format!(
                "{SUCCESS_VAR} variable is not boolean"
            ))),
            None => Err(WireError::UnrecognizedResponse(format!(
                "missing {SUCCESS_VAR} variable"
            ))),
        }
    }

    /// Whether the agent reported success.
    pub fn success(&self) -> bool {
        self.get(SUCCESS_VAR).and_then(Payload::as_bool) == Some(true)
    }

    /// The agent's diagnostic code, if it sent one.
    pub fn error_code(&self) -> Option<&str> {
        self.get(ERROR_CODE_VAR).and_then(Payload::as_str)
    }

    /// Fail with [`WireError::RemoteError`] unless the agent reported
    /// success.
    pub fn require_success(&self) -> Result<()> {
        if self.success() {
            Ok(())
        } else {
            Err(WireError::RemoteError {
                code: self.error_code().map(str::to_string),
            })
        }
    }

    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.vars.get(name).map(Variable::payload)
    }

    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    /// Returned variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }
}
