//! Error types for mcp-tool-server.
//!
//! Each concern gets its own enum: configuration loading, tool registration,
//! schema synthesis, tool dispatch and the HTTP transport. None of these ever
//! crosses a request boundary; the protocol router turns dispatch errors into
//! JSON-RPC error envelopes.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// The generated schema for a parameter type could not be turned into JSON.
#[derive(Error, Debug)]
#[error("failed to generate input schema for {type_name}")]
pub struct SchemaGenerationError {
    /// Name of the parameter type.
    pub type_name: String,
    /// The underlying serialisation error.
    #[source]
    pub source: serde_json::Error,
}

/// Errors returned by tool registration.
///
/// Every variant names the tool that failed so that a rejected batch can be
/// traced back to the offending entry.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The tool definition has an empty name.
    #[error("tool definition must include a name")]
    EmptyName,

    /// The handler's parameter type is not a record with named fields.
    #[error("tool '{tool}': handler parameter type must be a struct with named fields, got {type_name}")]
    ParameterNotRecord {
        /// Name of the tool being registered.
        tool: String,
        /// Name of the rejected parameter type.
        type_name: String,
    },

    /// The input schema could not be synthesised.
    #[error("tool '{tool}': could not generate input schema")]
    Schema {
        /// Name of the tool being registered.
        tool: String,
        /// The underlying schema error.
        #[source]
        source: SchemaGenerationError,
    },

    /// A tool with the same name is already registered (or appears twice in a batch).
    #[error("tool with name '{tool}' already registered")]
    DuplicateName {
        /// The duplicated tool name.
        tool: String,
    },
}

impl RegistrationError {
    /// Returns the name of the tool that failed registration, if it had one.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::EmptyName => None,
            Self::ParameterNotRecord { tool, .. }
            | Self::Schema { tool, .. }
            | Self::DuplicateName { tool } => Some(tool),
        }
    }
}

/// Errors raised before a tool handler runs.
///
/// Failures signalled by the handler itself are not errors at this level;
/// they become error results (`isError: true`).
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No tool is registered under the requested name.
    #[error("Tool not found: {tool}")]
    ToolNotFound {
        /// The requested tool name.
        tool: String,
    },

    /// The arguments could not be decoded into the tool's parameter type.
    #[error("Invalid arguments for tool {tool}")]
    InvalidArguments {
        /// Name of the tool.
        tool: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to bind to the TCP address.
    #[error("failed to bind on {addr}")]
    Bind {
        /// The address string.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server failed while serving.
    #[error("server error")]
    Serve(#[source] std::io::Error),
}
