//! mcp-tool-server: expose strongly-typed Rust functions as MCP tools
//!
//! This library registers tool handlers, derives each tool's JSON input schema
//! from its parameter type, and serves them to MCP clients over JSON-RPC 2.0.
//!
//! # Architecture
//!
//! The server owns the plumbing. Tool authors write ordinary functions:
//!
//! - **Schema synthesis**: parameter structs derive `schemars::JsonSchema`
//! - **Registration**: name, description and handler, checked up front
//! - **Dispatch**: arguments decoded into the parameter type before the call
//! - **Transport**: a single HTTP endpoint carrying JSON-RPC messages
//!
//! # Modules
//!
//! - [`calculator`] — Calculator tools served by the binary
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types
//! - [`mcp`] — MCP protocol implementation

pub mod calculator;
pub mod config;
pub mod error;
pub mod mcp;
