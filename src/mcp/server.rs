//! MCP protocol router.
//!
//! [`McpServer`] turns one inbound payload into one [`Reply`]:
//!
//! 1. **Framing**: the payload is parsed as a request or a notification
//! 2. **Routing**: requests go to `initialize`, `tools/list` or `tools/call`
//! 3. **Encoding**: the outcome is serialised into a JSON-RPC envelope
//!
//! The router is synchronous and transport-agnostic. It does not track
//! per-session lifecycle state: `tools/list` and `tools/call` are served
//! whether or not the caller ever sent `initialize`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, RegistrationError};
use crate::mcp::dispatch::Dispatcher;
use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ParseFailure, RequestId,
};
use crate::mcp::session::{SessionId, SessionStore};
use crate::mcp::tools::{ToolHandler, ToolRegistration, ToolRegistry};
use crate::mcp::types::{
    ImplementationInfo, InitializeParams, InitializeResult, ListToolsResult, ServerCapabilities,
    ToolCallParams, ToolCallResult, ToolDefinition,
};

/// Fallback body used if an error envelope itself cannot be serialised.
const INTERNAL_ERROR_BODY: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// What the transport should send back for one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A JSON-RPC response envelope.
    Response {
        /// Serialised envelope.
        body: String,
        /// Error code if the envelope carries an error.
        error: Option<ErrorCode>,
        /// Session created by this request (`initialize` only).
        session_id: Option<SessionId>,
    },
    /// A notification was received; no envelope is sent.
    Accepted,
    /// A notification could not be parsed; no envelope is sent.
    Rejected,
}

/// Successful result of a method handler.
struct Handled {
    result: Value,
    session_id: Option<SessionId>,
}

impl Handled {
    fn new(result: impl Serialize, id: &RequestId) -> Result<Self, JsonRpcError> {
        let result = serde_json::to_value(result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise result");
            JsonRpcError::internal_error(id.clone(), "Internal error: failed to serialise result")
                .with_detail(e)
        })?;

        Ok(Self {
            result,
            session_id: None,
        })
    }
}

/// The MCP server: tool registry, session store and protocol routing.
#[derive(Debug)]
pub struct McpServer {
    info: ImplementationInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    dispatcher: Dispatcher,
    sessions: Arc<SessionStore>,
}

impl McpServer {
    /// Creates a server with an empty registry and session store.
    #[must_use]
    pub fn new(info: ImplementationInfo, capabilities: ServerCapabilities) -> Self {
        Self::with_stores(
            info,
            capabilities,
            Arc::new(ToolRegistry::new()),
            Arc::new(SessionStore::new()),
        )
    }

    /// Creates a server over existing stores.
    #[must_use]
    pub fn with_stores(
        info: ImplementationInfo,
        capabilities: ServerCapabilities,
        registry: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            info,
            capabilities,
            instructions: None,
            dispatcher: Dispatcher::new(registry),
            sessions,
        }
    }

    /// Sets the instructions returned from `initialize`.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Server name and version reported during `initialize`.
    #[must_use]
    pub const fn info(&self) -> &ImplementationInfo {
        &self.info
    }

    /// The tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Registers a single tool.
    ///
    /// # Errors
    ///
    /// See [`ToolRegistry::register`].
    pub fn register_tool<H, M>(
        &self,
        definition: ToolDefinition,
        handler: H,
    ) -> Result<(), RegistrationError>
    where
        H: ToolHandler<M>,
        M: 'static,
    {
        self.registry().register(definition, handler)
    }

    /// Registers a batch of tools atomically.
    ///
    /// # Errors
    ///
    /// See [`ToolRegistry::register_many`].
    pub fn register_tools(
        &self,
        registrations: Vec<ToolRegistration>,
    ) -> Result<(), RegistrationError> {
        self.registry().register_many(registrations)
    }

    /// Handles one inbound payload.
    #[must_use]
    pub fn handle_message(&self, bytes: &[u8]) -> Reply {
        match parse_message(bytes) {
            Ok(IncomingMessage::Request(req)) => self.handle_request(req),
            Ok(IncomingMessage::Notification(notif)) => {
                Self::handle_notification(&notif);
                Reply::Accepted
            }
            Err(ParseFailure::Error(error)) => {
                tracing::debug!(code = error.error.code, "Rejected malformed request");
                error_reply(&error)
            }
            Err(ParseFailure::MalformedNotification(e)) => {
                tracing::warn!(error = %e, "Error parsing notification");
                Reply::Rejected
            }
        }
    }

    /// Handles an incoming request.
    fn handle_request(&self, req: JsonRpcRequest) -> Reply {
        tracing::info!(method = %req.method, id = %req.id, "Received request");

        let outcome = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req),
            _ => {
                tracing::info!(method = %req.method, "Unknown method");
                Err(JsonRpcError::method_not_found(req.id.clone(), &req.method))
            }
        };

        match outcome {
            Ok(handled) => success_reply(req.id, handled),
            Err(error) => error_reply(&error),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => tracing::info!("Client confirmed initialization"),
            other => tracing::info!(
                method = other,
                params = ?notif.params,
                "Received unhandled notification"
            ),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&self, req: &JsonRpcRequest) -> Result<Handled, JsonRpcError> {
        let params: InitializeParams = decode_params(req, "initialize")?;

        let (client_name, client_version) = params
            .client_info
            .as_ref()
            .map_or(("<unknown>", ""), |c| (c.name.as_str(), c.version.as_str()));
        tracing::info!(
            client = client_name,
            client_version,
            protocol_version = %params.protocol_version,
            "Client connecting"
        );

        let result = InitializeResult {
            protocol_version: params.protocol_version.clone(),
            server_info: self.info.clone(),
            capabilities: self.capabilities.clone(),
            instructions: self.instructions.clone(),
        };

        let session_id = self.sessions.create(
            params.capabilities,
            params.client_info,
            params.protocol_version,
        );
        tracing::info!(session = %session_id, "Created new session");

        let mut handled = Handled::new(result, &req.id)?;
        handled.session_id = Some(session_id);
        Ok(handled)
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<Handled, JsonRpcError> {
        let result = ListToolsResult {
            tools: self.registry().list(),
        };
        Handled::new(result, &req.id)
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&self, req: &JsonRpcRequest) -> Result<Handled, JsonRpcError> {
        let params: ToolCallParams = decode_params(req, "tools/call")?;
        tracing::info!(tool = %params.name, id = %req.id, "Calling tool");

        let arguments = params.arguments.unwrap_or_else(Map::new);
        let outcome = self
            .dispatcher
            .invoke(&params.name, arguments, CancellationToken::new())
            .map_err(|e| match e {
                DispatchError::ToolNotFound { .. } => {
                    JsonRpcError::invalid_params(req.id.clone(), e.to_string())
                }
                DispatchError::InvalidArguments { ref source, .. } => {
                    JsonRpcError::invalid_params(req.id.clone(), e.to_string()).with_detail(source)
                }
            })?;

        let result = if outcome.is_error {
            ToolCallResult::error(outcome.text)
        } else {
            ToolCallResult::text(outcome.text)
        };
        Handled::new(result, &req.id)
    }
}

/// Decodes the request's params into `T`.
fn decode_params<T: DeserializeOwned>(req: &JsonRpcRequest, method: &str) -> Result<T, JsonRpcError> {
    let params = req.params.clone().ok_or_else(|| {
        JsonRpcError::invalid_params(req.id.clone(), format!("Missing params for {method}"))
    })?;

    serde_json::from_value(params).map_err(|e| {
        JsonRpcError::invalid_params(req.id.clone(), format!("Invalid params for {method}"))
            .with_detail(e)
    })
}

fn success_reply(id: RequestId, handled: Handled) -> Reply {
    let response = JsonRpcResponse::success(id.clone(), handled.result);
    match serde_json::to_string(&response) {
        Ok(body) => Reply::Response {
            body,
            error: None,
            session_id: handled.session_id,
        },
        Err(e) => {
            tracing::error!(error = %e, "Error writing success response");
            error_reply(
                &JsonRpcError::internal_error(id, "Internal error: failed to serialise result")
                    .with_detail(e),
            )
        }
    }
}

fn error_reply(error: &JsonRpcError) -> Reply {
    let body = serde_json::to_string(error).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Error writing error response");
        INTERNAL_ERROR_BODY.to_string()
    });

    Reply::Response {
        body,
        error: Some(error.code()),
        session_id: None,
    }
}

#[cfg(test)]
mod tests {
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Deserialize, JsonSchema)]
    struct AddParams {
        /// The first number to add.
        a: f64,
        /// The second number to add.
        b: f64,
    }

    fn server() -> McpServer {
        let server = McpServer::new(
            ImplementationInfo::new("test-server", "0.0.1"),
            ServerCapabilities::default(),
        );
        server
            .register_tool(ToolDefinition::new("calculator/add"), |p: AddParams| {
                Ok::<_, String>(p.a + p.b)
            })
            .unwrap();
        server
    }

    fn call(server: &McpServer, message: &Value) -> (Value, Option<ErrorCode>, Option<SessionId>) {
        match server.handle_message(message.to_string().as_bytes()) {
            Reply::Response {
                body,
                error,
                session_id,
            } => (serde_json::from_str(&body).unwrap(), error, session_id),
            other => panic!("Expected a response, got {other:?}"),
        }
    }

    #[test]
    fn initialize_echoes_protocol_version() {
        let server = server().with_instructions("Be precise.");
        let (body, error, session_id) = call(
            &server,
            &json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "1999-01-01",
                    "capabilities": {"roots": {}},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                }
            }),
        );

        assert!(error.is_none());
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], "1999-01-01");
        assert_eq!(body["result"]["serverInfo"]["name"], "test-server");
        assert_eq!(body["result"]["capabilities"], json!({"tools": {}}));
        assert_eq!(body["result"]["instructions"], "Be precise.");

        let session_id = session_id.unwrap();
        let session = server.sessions().get(session_id.as_str()).unwrap();
        assert_eq!(session.client_capabilities.roots, Some(json!({})));
        assert_eq!(session.client_info.unwrap().name, "test-client");
    }

    #[test]
    fn initialize_without_params_is_invalid() {
        let server = server();
        let (body, error, session_id) =
            call(&server, &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}));
        assert_eq!(error, Some(ErrorCode::InvalidParams));
        assert_eq!(body["error"]["code"], -32602);
        assert!(session_id.is_none());
        assert!(server.sessions().is_empty());
    }

    #[test]
    fn tools_list_includes_schema() {
        let (body, error, _) = call(
            &server(),
            &json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"}),
        );
        assert!(error.is_none());
        assert_eq!(body["id"], "list");
        let tools = body["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "calculator/add");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["a", "b"]));
    }

    #[test]
    fn tools_call_without_arguments_reports_missing_fields() {
        let (body, error, _) = call(
            &server(),
            &json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "calculator/add"}
            }),
        );
        assert_eq!(error, Some(ErrorCode::InvalidParams));
        assert_eq!(body["error"]["message"], "Invalid arguments for tool calculator/add");
        assert!(body["error"]["data"].as_str().unwrap().contains("missing field"));
    }

    #[test]
    fn tools_call_with_non_object_arguments() {
        let (body, error, _) = call(
            &server(),
            &json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {"name": "calculator/add", "arguments": [1, 2]}
            }),
        );
        assert_eq!(error, Some(ErrorCode::InvalidParams));
        assert_eq!(body["error"]["message"], "Invalid params for tools/call");
    }

    #[test]
    fn unknown_method() {
        let (body, error, _) = call(
            &server(),
            &json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"}),
        );
        assert_eq!(error, Some(ErrorCode::MethodNotFound));
        assert_eq!(body["id"], 9);
        assert!(body.get("result").is_none());
    }

    #[test]
    fn notifications_never_produce_envelopes() {
        let server = server();
        let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let other = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {}});
        let broken = json!({"jsonrpc": "2.0", "params": {}});

        assert_eq!(server.handle_message(initialized.to_string().as_bytes()), Reply::Accepted);
        assert_eq!(server.handle_message(other.to_string().as_bytes()), Reply::Accepted);
        assert_eq!(server.handle_message(broken.to_string().as_bytes()), Reply::Rejected);
    }

    #[test]
    fn parse_error_has_null_id() {
        let Reply::Response { body, error, .. } = server().handle_message(b"{oops") else {
            panic!("Expected a response");
        };
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error, Some(ErrorCode::ParseError));
        assert!(body["id"].is_null());
        assert_eq!(body["error"]["code"], -32700);
    }
}
