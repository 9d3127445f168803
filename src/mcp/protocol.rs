//! JSON-RPC 2.0 message types for MCP protocol.
//!
//! This module defines the envelope types used by the Model Context Protocol.
//! All messages follow the JSON-RPC 2.0 specification.
//!
//! # Message Types
//!
//! - **Request**: A message expecting a response (has an `id` key, which may be `null`)
//! - **Response**: A reply to a request, carrying either `result` or `error`
//! - **Notification**: A one-way message (no `id` key, no response expected)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only accepted value of the `jsonrpc` field.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request ID.
///
/// IDs may be strings, numbers, or `null`. Error responses for messages whose
/// ID cannot be determined use [`RequestId::Null`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(serde_json::Number),
    /// String request ID.
    String(String),
    /// Explicit `null` ID.
    Null,
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
///
/// Requests expect a response from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,

    /// Request identifier, echoed in the response.
    pub id: RequestId,

    /// The method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Validates that this is a well-formed JSON-RPC 2.0 request.
    ///
    /// Returns an error message if validation fails.
    #[must_use]
    pub fn validate(&self) -> Option<&'static str> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Some("jsonrpc field must be \"2.0\"");
        }
        if self.method.is_empty() {
            return Some("method field cannot be empty");
        }
        None
    }
}

/// A JSON-RPC 2.0 notification message (incoming).
///
/// Notifications do not have an ID and never receive a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// Should be "2.0".
    pub jsonrpc: String,

    /// The notification method.
    pub method: String,

    /// Optional parameters for the notification.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to.
    pub id: RequestId,

    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Server-defined error.
    ServerError(i32),
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// Maps a numeric code back to an error code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            other => Self::ServerError(other),
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this error corresponds to (`null` if unknown).
    pub id: RequestId,

    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: RequestId, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error(message: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            RequestId::Null,
            JsonRpcErrorData::with_message(
                ErrorCode::ParseError,
                format!("{}: {message}", ErrorCode::ParseError.default_message()),
            )
            .with_data(Value::String(detail.to_string())),
        )
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: RequestId, reason: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::from_code(ErrorCode::InvalidRequest)
                .with_data(Value::String(reason.to_string())),
        )
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                format!("Method not found: {method}"),
            ),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }

    /// Attaches a textual detail as the error's `data` member.
    #[must_use]
    pub fn with_detail(mut self, detail: impl std::fmt::Display) -> Self {
        self.error.data = Some(Value::String(detail.to_string()));
        self
    }

    /// Returns the error code of this response.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::from_code(self.error.code)
    }
}

/// An incoming message that could be either a request or notification.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
}

/// Why an inbound payload could not be turned into an [`IncomingMessage`].
#[derive(Debug)]
pub enum ParseFailure {
    /// Answer with this JSON-RPC error envelope.
    Error(JsonRpcError),
    /// The payload was a notification with an invalid structure. Notifications
    /// never receive an envelope, so only a transport-level status is sent.
    MalformedNotification(serde_json::Error),
}

/// Parses raw bytes into an incoming message.
///
/// The payload is first parsed generically to tell requests (an `id` key is
/// present, even when `null`) from notifications, then re-parsed strictly.
///
/// # Errors
///
/// - Malformed JSON, a non-object payload, or a request with the wrong shape
///   yields a `ParseError` envelope with a `null` ID.
/// - A request whose `jsonrpc` is not `"2.0"` or whose method is empty yields
///   an `InvalidRequest` envelope echoing the request ID.
/// - A notification with the wrong shape yields
///   [`ParseFailure::MalformedNotification`].
pub fn parse_message(bytes: &[u8]) -> Result<IncomingMessage, ParseFailure> {
    let object: Map<String, Value> = serde_json::from_slice(bytes)
        .map_err(|e| ParseFailure::Error(JsonRpcError::parse_error("Invalid JSON", e)))?;

    if object.contains_key("id") {
        let request: JsonRpcRequest = serde_json::from_value(Value::Object(object))
            .map_err(|e| {
                ParseFailure::Error(JsonRpcError::parse_error("Invalid Request structure", e))
            })?;

        if let Some(reason) = request.validate() {
            return Err(ParseFailure::Error(JsonRpcError::invalid_request(
                request.id,
                reason,
            )));
        }

        Ok(IncomingMessage::Request(request))
    } else {
        let notification: JsonRpcNotification = serde_json::from_value(Value::Object(object))
            .map_err(ParseFailure::MalformedNotification)?;

        Ok(IncomingMessage::Notification(notification))
    }
}
