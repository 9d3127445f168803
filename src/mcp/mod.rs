//! Model Context Protocol (MCP) server implementation.
//!
//! This module exposes strongly-typed Rust functions as MCP tools. Each tool's
//! input schema is derived from its parameter type, calls are decoded and
//! dispatched by name, and the whole exchange runs over JSON-RPC 2.0 on an
//! HTTP endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│  Dispatcher │    │
//! │   │   (HTTP)    │    │  (router)   │    │             │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │                             │                  │            │
//! │                             ▼                  ▼            │
//! │                      ┌─────────────┐    ┌─────────────┐    │
//! │                      │  Sessions   │    │    Tools    │    │
//! │                      │             │    │ (+ schemas) │    │
//! │                      └─────────────┘    └─────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Methods
//!
//! - `initialize`: creates a session, returns server info and capabilities
//! - `tools/list`: every registered tool with its input schema
//! - `tools/call`: decodes arguments and runs one tool

pub mod dispatch;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use dispatch::Dispatcher;
pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use server::{McpServer, Reply};
pub use session::{Session, SessionId, SessionStore};
pub use tools::{ToolOutcome, ToolRegistration, ToolRegistry};
pub use transport::{build_router, HttpServer, SESSION_ID_HEADER};
pub use types::{ImplementationInfo, ServerCapabilities, ToolDefinition};
