//! Integration tests for MCP protocol handling.
//!
//! These tests drive `McpServer::handle_message` with raw JSON-RPC payloads,
//! covering registration, schema synthesis, dispatch, error mapping and
//! session creation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use mcp_tool_server::calculator;
use mcp_tool_server::error::RegistrationError;
use mcp_tool_server::mcp::protocol::ErrorCode;
use mcp_tool_server::mcp::server::{McpServer, Reply};
use mcp_tool_server::mcp::session::SessionId;
use mcp_tool_server::mcp::tools::{ToolRegistration, COMPLETION_MESSAGE};
use mcp_tool_server::mcp::types::{ImplementationInfo, ServerCapabilities, ToolDefinition};

// =============================================================================
// Helpers
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
struct AddParams {
    /// The first number to add.
    a: f64,
    /// The second number to add.
    b: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoParams {
    /// Text to echo back.
    message: String,
}

fn new_server() -> McpServer {
    McpServer::new(
        ImplementationInfo::new("calculator", "1.0.0"),
        ServerCapabilities::default(),
    )
}

fn calculator_server() -> McpServer {
    let server = new_server();
    server.register_tools(calculator::registrations()).unwrap();
    server
}

struct Response {
    body: Value,
    error: Option<ErrorCode>,
    session_id: Option<SessionId>,
}

fn send(server: &McpServer, message: &Value) -> Response {
    send_raw(server, message.to_string().as_bytes())
}

fn send_raw(server: &McpServer, bytes: &[u8]) -> Response {
    match server.handle_message(bytes) {
        Reply::Response {
            body,
            error,
            session_id,
        } => Response {
            body: serde_json::from_str(&body).expect("response body is JSON"),
            error,
            session_id,
        },
        other => panic!("Expected a response, got {other:?}"),
    }
}

fn initialize(server: &McpServer, id: i64) -> Response {
    send(
        server,
        &json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {"sampling": {}},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }
        }),
    )
}

fn call_tool(server: &McpServer, id: i64, name: &str, arguments: &Value) -> Response {
    send(
        server,
        &json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }),
    )
}

fn list_tools(server: &McpServer) -> Vec<Value> {
    let response = send(
        server,
        &json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"}),
    );
    assert!(response.error.is_none());
    response.body["result"]["tools"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_duplicate_registration_keeps_first_definition() {
    let server = new_server();
    server
        .register_tool(
            ToolDefinition::new("echo").with_description("first"),
            |p: EchoParams| Ok::<_, String>(p.message),
        )
        .unwrap();

    let err = server
        .register_tool(
            ToolDefinition::new("echo").with_description("second"),
            |p: AddParams| Ok::<_, String>(p.a),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateName { ref tool } if tool == "echo"));

    let tools = list_tools(&server);
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["description"], "first");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["message"]));

    let response = call_tool(&server, 1, "echo", &json!({"message": "still here"}));
    assert_eq!(response.body["result"]["content"][0]["text"], "still here");
}

#[test]
fn test_batch_with_invalid_entry_registers_nothing() {
    let server = new_server();
    let batch = vec![
        ToolRegistration::new(ToolDefinition::new("one"), |p: AddParams| {
            Ok::<_, String>(p.a)
        }),
        ToolRegistration::new(ToolDefinition::new("two"), |p: AddParams| {
            Ok::<_, String>(p.b)
        }),
        ToolRegistration::new(ToolDefinition::new(""), |p: AddParams| {
            Ok::<_, String>(p.a)
        }),
        ToolRegistration::new(ToolDefinition::new("four"), |p: EchoParams| {
            Ok::<_, String>(p.message)
        }),
        ToolRegistration::new(ToolDefinition::new("five"), |p: EchoParams| {
            Ok::<_, String>(p.message)
        }),
    ];

    let err = server.register_tools(batch).unwrap_err();
    assert!(matches!(err, RegistrationError::EmptyName));
    assert!(server.registry().is_empty());
    assert!(list_tools(&server).is_empty());
}

#[test]
fn test_batch_with_name_clash_registers_nothing() {
    let server = new_server();
    server
        .register_tool(ToolDefinition::new("taken"), |p: AddParams| {
            Ok::<_, String>(p.a)
        })
        .unwrap();

    let batch = vec![
        ToolRegistration::new(ToolDefinition::new("fresh"), |p: AddParams| {
            Ok::<_, String>(p.a)
        }),
        ToolRegistration::new(ToolDefinition::new("taken"), |p: AddParams| {
            Ok::<_, String>(p.b)
        }),
    ];

    assert!(server.register_tools(batch).is_err());
    assert_eq!(server.registry().len(), 1);
    assert!(!server.registry().contains("fresh"));
}

#[test]
fn test_non_record_parameter_type_is_rejected() {
    let server = new_server();
    let err = server
        .register_tool(ToolDefinition::new("scalar"), |n: f64| Ok::<_, String>(n))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ParameterNotRecord { .. }));
    assert_eq!(err.tool_name(), Some("scalar"));
    assert!(server.registry().is_empty());
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_tools_list_schema_from_parameter_type() {
    let server = new_server();
    server
        .register_tool(
            ToolDefinition::new("calculator/add").with_description("Add two numbers"),
            |p: AddParams| Ok::<_, String>(p.a + p.b),
        )
        .unwrap();

    let tools = list_tools(&server);
    assert_eq!(tools.len(), 1);

    let tool = &tools[0];
    assert_eq!(tool["name"], "calculator/add");
    assert_eq!(tool["description"], "Add two numbers");

    let schema = &tool["inputSchema"];
    assert_eq!(schema["type"], "object");
    let properties = schema["properties"].as_object().unwrap();
    assert_eq!(properties.len(), 2);
    assert_eq!(properties["a"]["type"], "number");
    assert_eq!(properties["a"]["description"], "The first number to add.");
    assert_eq!(properties["b"]["type"], "number");
    assert_eq!(properties["b"]["description"], "The second number to add.");
    assert_eq!(schema["required"], json!(["a", "b"]));
}

#[test]
fn test_tools_list_keeps_registration_order() {
    let names: Vec<String> = list_tools(&calculator_server())
        .iter()
        .filter_map(|t| t["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(
        names,
        [
            "calculator/add",
            "calculator/subtract",
            "calculator/multiply",
            "calculator/divide"
        ]
    );
}

// =============================================================================
// Tool Call Tests
// =============================================================================

#[test]
fn test_call_add() {
    let response = call_tool(&calculator_server(), 7, "calculator/add", &json!({"a": 2, "b": 3}));

    assert!(response.error.is_none());
    assert_eq!(response.body["jsonrpc"], "2.0");
    assert_eq!(response.body["id"], 7);
    let result = &response.body["result"];
    assert_eq!(result["content"][0]["type"], "text");
    assert_eq!(result["content"][0]["text"], "5");
    assert!(result.get("isError").is_none());
}

#[test]
fn test_call_unknown_tool() {
    let response = call_tool(&calculator_server(), 8, "calculator/pow", &json!({}));

    assert_eq!(response.error, Some(ErrorCode::InvalidParams));
    assert_eq!(response.body["id"], 8);
    assert_eq!(response.body["error"]["code"], -32602);
    assert_eq!(
        response.body["error"]["message"],
        "Tool not found: calculator/pow"
    );
}

#[test]
fn test_call_with_wrong_argument_types() {
    let response = call_tool(
        &calculator_server(),
        9,
        "calculator/add",
        &json!({"a": "two", "b": 3}),
    );

    assert_eq!(response.error, Some(ErrorCode::InvalidParams));
    assert_eq!(
        response.body["error"]["message"],
        "Invalid arguments for tool calculator/add"
    );
    assert!(response.body["error"]["data"].is_string());
}

#[test]
fn test_handler_error_is_tool_result() {
    let server = calculator_server();

    let response = call_tool(&server, 10, "calculator/divide", &json!({"a": 1, "b": 0}));
    assert!(response.error.is_none());
    let result = &response.body["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(result["content"][0]["text"], "division by zero");

    // The server keeps serving after a tool failure.
    let response = call_tool(&server, 11, "calculator/divide", &json!({"a": 9, "b": 3}));
    assert!(response.error.is_none());
    assert_eq!(response.body["result"]["content"][0]["text"], "3");
}

#[test]
fn test_unit_result_renders_completion_message() {
    let server = new_server();
    server
        .register_tool(ToolDefinition::new("noop"), |_: EchoParams| {
            Ok::<_, String>(())
        })
        .unwrap();

    let response = call_tool(&server, 1, "noop", &json!({"message": "x"}));
    assert_eq!(
        response.body["result"]["content"][0]["text"],
        COMPLETION_MESSAGE
    );
}

#[test]
fn test_concurrent_calls() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let server = Arc::new(new_server());
    server
        .register_tool(ToolDefinition::new("count"), |p: AddParams| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(p.a * p.b)
        })
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let response = call_tool(&server, i, "count", &json!({"a": i, "b": 2}));
                response.body["result"]["content"][0]["text"]
                    .as_str()
                    .map(str::to_string)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some((i * 2).to_string()));
    }
    assert_eq!(CALLS.load(Ordering::SeqCst), 8);
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn test_initialize_creates_distinct_sessions() {
    let server = calculator_server();

    let first = initialize(&server, 1);
    let second = initialize(&server, 2);

    let first_id = first.session_id.unwrap();
    let second_id = second.session_id.unwrap();
    assert_ne!(first_id, second_id);

    let session = server.sessions().get(first_id.as_str()).unwrap();
    assert_eq!(session.protocol_version, "2025-06-18");
    assert_eq!(session.client_info.unwrap().name, "test-client");
    assert!(server.sessions().contains(second_id.as_str()));
    assert_eq!(server.sessions().len(), 2);

    assert_eq!(first.body["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(first.body["result"]["serverInfo"]["name"], "calculator");
}

#[test]
fn test_tools_available_without_initialize() {
    let server = calculator_server();
    assert_eq!(list_tools(&server).len(), 4);

    let response = call_tool(&server, 1, "calculator/multiply", &json!({"a": 4, "b": 2.5}));
    assert_eq!(response.body["result"]["content"][0]["text"], "10");
    assert!(server.sessions().is_empty());
}

// =============================================================================
// Protocol Error Tests
// =============================================================================

#[test]
fn test_invalid_json_is_parse_error() {
    let response = send_raw(&calculator_server(), b"not valid json");
    assert_eq!(response.error, Some(ErrorCode::ParseError));
    assert_eq!(response.body["error"]["code"], -32700);
    assert!(response.body["id"].is_null());
}

#[test]
fn test_wrong_version_is_invalid_request() {
    let response = send(
        &calculator_server(),
        &json!({"jsonrpc": "1.0", "id": 5, "method": "tools/list"}),
    );
    assert_eq!(response.error, Some(ErrorCode::InvalidRequest));
    assert_eq!(response.body["id"], 5);
}

#[test]
fn test_unknown_method() {
    let response = send(
        &calculator_server(),
        &json!({"jsonrpc": "2.0", "id": "x", "method": "prompts/list"}),
    );
    assert_eq!(response.error, Some(ErrorCode::MethodNotFound));
    assert_eq!(response.body["error"]["code"], -32601);
    assert_eq!(response.body["id"], "x");
}

#[test]
fn test_notifications_are_accepted_without_envelope() {
    let server = calculator_server();
    let reply = server.handle_message(
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
            .to_string()
            .as_bytes(),
    );
    assert_eq!(reply, Reply::Accepted);

    let reply = server.handle_message(br#"{"jsonrpc": "2.0", "method": 42}"#);
    assert_eq!(reply, Reply::Rejected);
}
