//! JSON-RPC 2.0 framing for an MCP session.
//!
//! Only the shapes this server exchanges are modelled: requests and
//! notifications coming in, and results, errors and the resource
//! list-changed notification going out. Store failures become JSON-RPC
//! errors in one place, [`RpcError::store`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::store::{StoreError, StoreErrorKind};

/// The MCP protocol version this server speaks.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported during initialisation.
pub const SERVER_NAME: &str = "notes-mcp";

/// The `jsonrpc` member of every outgoing message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version2;

impl Serialize for Version2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

/// A request id. MCP allows strings and integers, never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id.
    Number(i64),
    /// String id.
    String(String),
}

/// A client request awaiting a reply.
#[derive(Debug, Clone)]
pub struct Request {
    /// Echoed back in the reply.
    pub id: RequestId,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Raw parameters, if any were sent.
    pub params: Option<Value>,
}

/// A one-way client message.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Method name, e.g. `notifications/initialized`.
    pub method: String,
}

/// A classified incoming message.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Has an id and expects a reply.
    Request(Request),
    /// Has no id; gets no reply.
    Notification(Notification),
}

impl Incoming {
    /// The method name of either kind of message.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request(req) => &req.method,
            Self::Notification(notif) => &notif.method,
        }
    }
}

/// Any incoming line, before it is classified.
#[derive(Deserialize)]
struct Envelope {
    jsonrpc: Option<String>,
    #[serde(default, deserialize_with = "present")]
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

/// Keeps `"id": null` apart from a missing id.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Parses one line of input.
///
/// # Errors
///
/// Returns a parse error for malformed JSON and an invalid-request error for
/// JSON that is not a JSON-RPC 2.0 request or notification.
pub fn parse_message(line: &str) -> Result<Incoming, RpcError> {
    let envelope: Envelope = serde_json::from_str(line).map_err(|e| {
        if e.is_data() {
            RpcError::invalid_request(None, "Message must be a JSON-RPC object")
        } else {
            RpcError::parse_error()
        }
    })?;

    if envelope.jsonrpc.as_deref() != Some("2.0") {
        return Err(RpcError::invalid_request(None, "jsonrpc must be \"2.0\""));
    }

    let id = envelope
        .id
        .map(serde_json::from_value::<RequestId>)
        .transpose()
        .map_err(|_| RpcError::invalid_request(None, "id must be a string or an integer"))?;

    let method = match envelope.method {
        Some(method) if !method.is_empty() => method,
        _ => return Err(RpcError::invalid_request(id, "method is required")),
    };

    Ok(match id {
        Some(id) => Incoming::Request(Request {
            id,
            method,
            params: envelope.params,
        }),
        None => Incoming::Notification(Notification { method }),
    })
}

/// A successful reply.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    jsonrpc: Version2,
    /// Id of the request being answered.
    pub id: RequestId,
    /// Method-specific result.
    pub result: Value,
}

impl Response {
    /// Wraps `result` as the reply to request `id`.
    #[must_use]
    pub const fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Version2,
            id,
            result,
        }
    }
}

/// Error codes this server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The line was not valid JSON.
    ParseError,
    /// Valid JSON, but not a JSON-RPC request.
    InvalidRequest,
    /// Unknown method.
    MethodNotFound,
    /// Missing or malformed params, or rejected note input.
    InvalidParams,
    /// The store failed or is not open.
    InternalError,
    /// No resource behind the URI.
    ResourceNotFound,
}

impl ErrorCode {
    /// The numeric code sent on the wire.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ResourceNotFound => -32002,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

/// The `error` member of an error reply.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Error code.
    pub code: ErrorCode,
    /// One-line description.
    pub message: String,
    /// Structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An error reply. `id` is `null` when the request id could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    jsonrpc: Version2,
    /// Id of the failed request.
    pub id: Option<RequestId>,
    /// What went wrong.
    pub error: ErrorBody,
}

impl RpcError {
    fn new(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Version2,
            id,
            error: ErrorBody {
                code,
                message: message.into(),
                data: None,
            },
        }
    }

    #[must_use]
    fn with_data(mut self, data: Value) -> Self {
        self.error.data = Some(data);
        self
    }

    /// The error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.error.code
    }

    /// The line could not be parsed as JSON.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, ErrorCode::ParseError, "Parse error")
    }

    /// The message is not an acceptable request here.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::InvalidRequest, message)
    }

    /// No handler for `method`.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            ErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Params are missing or malformed.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(Some(id), ErrorCode::InvalidParams, message)
    }

    /// Nothing lives at `uri`.
    #[must_use]
    pub fn resource_not_found(id: RequestId, uri: &str) -> Self {
        Self::new(
            Some(id),
            ErrorCode::ResourceNotFound,
            format!("Resource not found: {uri}"),
        )
        .with_data(json!({ "uri": uri }))
    }

    /// The server failed to produce a reply.
    #[must_use]
    pub fn internal(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(Some(id), ErrorCode::InternalError, message)
    }

    /// Maps a store failure onto a JSON-RPC error, keeping its kind in `data`.
    #[must_use]
    pub fn store(id: &RequestId, err: &StoreError) -> Self {
        let kind = err.kind();
        let code = match kind {
            StoreErrorKind::Validation => ErrorCode::InvalidParams,
            StoreErrorKind::NotFound => ErrorCode::ResourceNotFound,
            StoreErrorKind::Storage | StoreErrorKind::Lifecycle => {
                tracing::error!(error = %err, "Note store request failed");
                ErrorCode::InternalError
            }
        };
        Self::new(Some(id.clone()), code, err.to_string())
            .with_data(json!({ "kind": kind.as_str() }))
    }
}

/// A notification sent by the server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerNotification {
    jsonrpc: Version2,
    /// Notification method.
    pub method: &'static str,
}

impl ServerNotification {
    /// The set of note resources changed.
    #[must_use]
    pub const fn resource_list_changed() -> Self {
        Self {
            jsonrpc: Version2,
            method: "notifications/resources/list_changed",
        }
    }
}
