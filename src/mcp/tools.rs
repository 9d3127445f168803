//! Tool registration.
//!
//! A tool is a [`ToolDefinition`] plus a strongly-typed handler. Handlers take
//! a single parameter struct, optionally preceded by a [`CancellationToken`]:
//!
//! ```
//! use mcp_tool_server::mcp::tools::ToolRegistry;
//! use mcp_tool_server::mcp::types::ToolDefinition;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct AddParams {
//!     /// The first number to add.
//!     a: f64,
//!     /// The second number to add.
//!     b: f64,
//! }
//!
//! let registry = ToolRegistry::new();
//! registry
//!     .register(ToolDefinition::new("add"), |p: AddParams| {
//!         Ok::<_, std::convert::Infallible>(p.a + p.b)
//!     })
//!     .unwrap();
//! registry
//!     .register(
//!         ToolDefinition::new("add_cancellable"),
//!         |_token: CancellationToken, p: AddParams| Ok::<_, String>(p.a + p.b),
//!     )
//!     .unwrap();
//! assert_eq!(registry.len(), 2);
//! ```
//!
//! Any other handler signature does not implement [`ToolHandler`] and is
//! rejected at compile time. The remaining checks (name, parameter shape,
//! schema, uniqueness) run at registration; the handler is then stored behind
//! a type-erased invoker that decodes arguments and renders the result.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::RegistrationError;
use crate::mcp::schema::{self, ParameterShape};
use crate::mcp::types::ToolDefinition;

/// Text returned for handlers that produce no value.
pub const COMPLETION_MESSAGE: &str = "Operation completed successfully.";

/// Requirements for a handler's parameter type.
///
/// Implemented automatically for every type that can be deserialised and
/// described by a JSON Schema. Whether it is a record is checked at
/// registration.
pub trait ToolParams: DeserializeOwned + JsonSchema + 'static {}

impl<T> ToolParams for T where T: DeserializeOwned + JsonSchema + 'static {}

/// Values a handler can return on success, rendered as the result text.
pub trait ToolOutput {
    /// Renders the value as the text content of the tool result.
    fn into_text(self) -> String;
}

impl ToolOutput for () {
    fn into_text(self) -> String {
        COMPLETION_MESSAGE.to_string()
    }
}

impl ToolOutput for String {
    fn into_text(self) -> String {
        self
    }
}

impl ToolOutput for &str {
    fn into_text(self) -> String {
        self.to_string()
    }
}

impl ToolOutput for Cow<'_, str> {
    fn into_text(self) -> String {
        self.into_owned()
    }
}

impl ToolOutput for Value {
    fn into_text(self) -> String {
        match self {
            Self::String(s) => s,
            other => other.to_string(),
        }
    }
}

macro_rules! display_output {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToolOutput for $ty {
                fn into_text(self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_output!(bool, char, f32, f64, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// The normalised result of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Result text (the error message when `is_error` is set).
    pub text: String,
    /// Whether the handler reported a failure.
    pub is_error: bool,
}

impl ToolOutcome {
    fn from_result<T: ToolOutput, E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self {
                text: value.into_text(),
                is_error: false,
            },
            Err(e) => Self {
                text: e.to_string(),
                is_error: true,
            },
        }
    }
}

/// Marker for handlers of the form `Fn(P) -> Result<T, E>`.
#[derive(Debug)]
pub enum WithoutCancellation {}

/// Marker for handlers of the form `Fn(CancellationToken, P) -> Result<T, E>`.
#[derive(Debug)]
pub enum WithCancellation {}

/// A strongly-typed tool handler.
///
/// `Marker` only disambiguates the two supported calling conventions; it is
/// inferred at the registration call site.
pub trait ToolHandler<Marker>: Send + Sync + 'static {
    /// The decoded parameter type.
    type Params: ToolParams;

    /// Whether the handler receives the cancellation token.
    const ACCEPTS_CANCELLATION: bool;

    /// Runs the handler.
    fn call(&self, token: CancellationToken, params: Self::Params) -> ToolOutcome;
}

impl<F, P, T, E> ToolHandler<(WithoutCancellation, P)> for F
where
    F: Fn(P) -> Result<T, E> + Send + Sync + 'static,
    P: ToolParams,
    T: ToolOutput,
    E: Display,
{
    type Params = P;
    const ACCEPTS_CANCELLATION: bool = false;

    fn call(&self, _token: CancellationToken, params: P) -> ToolOutcome {
        ToolOutcome::from_result(self(params))
    }
}

impl<F, P, T, E> ToolHandler<(WithCancellation, P)> for F
where
    F: Fn(CancellationToken, P) -> Result<T, E> + Send + Sync + 'static,
    P: ToolParams,
    T: ToolOutput,
    E: Display,
{
    type Params = P;
    const ACCEPTS_CANCELLATION: bool = true;

    fn call(&self, token: CancellationToken, params: P) -> ToolOutcome {
        ToolOutcome::from_result(self(token, params))
    }
}

/// Decodes raw arguments and runs the handler.
type Invoker =
    dyn Fn(Map<String, Value>, CancellationToken) -> Result<ToolOutcome, serde_json::Error>
        + Send
        + Sync;

/// Introspects the handler's parameter type.
type Introspector = fn() -> Result<schema::Introspection, crate::error::SchemaGenerationError>;

/// A tool waiting to be registered.
///
/// Building a registration erases the handler's concrete type; nothing is
/// validated until it is handed to [`ToolRegistry::register_many`].
pub struct ToolRegistration {
    definition: ToolDefinition,
    accepts_cancellation: bool,
    introspect: Introspector,
    invoker: Arc<Invoker>,
}

impl ToolRegistration {
    /// Pairs a definition with its handler.
    pub fn new<H, M>(definition: ToolDefinition, handler: H) -> Self
    where
        H: ToolHandler<M>,
        M: 'static,
    {
        let invoker = move |arguments: Map<String, Value>,
                            token: CancellationToken|
              -> Result<ToolOutcome, serde_json::Error> {
            let params: H::Params = serde_json::from_value(Value::Object(arguments))?;
            Ok(handler.call(token, params))
        };

        Self {
            definition,
            accepts_cancellation: H::ACCEPTS_CANCELLATION,
            introspect: schema::introspect::<H::Params>,
            invoker: Arc::new(invoker),
        }
    }

    /// The definition as supplied by the caller.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Runs every check that does not need the registry contents.
    fn prepare(self) -> Result<RegisteredTool, RegistrationError> {
        let mut definition = self.definition;
        if definition.name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }

        let introspection = (self.introspect)().map_err(|source| RegistrationError::Schema {
            tool: definition.name.clone(),
            source,
        })?;

        if !introspection.shape.is_record() {
            return Err(RegistrationError::ParameterNotRecord {
                tool: definition.name,
                type_name: introspection.shape.type_name().to_string(),
            });
        }

        definition.input_schema = introspection.schema;

        Ok(RegisteredTool {
            definition,
            shape: introspection.shape,
            accepts_cancellation: self.accepts_cancellation,
            invoker: self.invoker,
        })
    }
}

impl std::fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("definition", &self.definition)
            .field("accepts_cancellation", &self.accepts_cancellation)
            .finish_non_exhaustive()
    }
}

/// A validated tool, ready for dispatch.
pub struct RegisteredTool {
    definition: ToolDefinition,
    shape: ParameterShape,
    accepts_cancellation: bool,
    invoker: Arc<Invoker>,
}

impl RegisteredTool {
    /// The protocol-facing definition, including the synthesised input schema.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// The parameter shape used to decode arguments.
    #[must_use]
    pub const fn parameter_shape(&self) -> &ParameterShape {
        &self.shape
    }

    /// Whether the handler receives the cancellation token.
    #[must_use]
    pub const fn accepts_cancellation(&self) -> bool {
        self.accepts_cancellation
    }

    /// Decodes `arguments` into the parameter type and runs the handler.
    ///
    /// # Errors
    ///
    /// Returns the decode error if `arguments` does not match the parameter
    /// type; the handler is not called in that case.
    pub fn invoke(
        &self,
        arguments: Map<String, Value>,
        token: CancellationToken,
    ) -> Result<ToolOutcome, serde_json::Error> {
        (self.invoker)(arguments, token)
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition)
            .field("shape", &self.shape)
            .field("accepts_cancellation", &self.accepts_cancellation)
            .finish_non_exhaustive()
    }
}

/// Name-indexed store of registered tools.
///
/// Registration takes the write lock; lookups and listings take the read
/// lock. Tools are never removed or replaced.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<IndexMap<String, Arc<RegisteredTool>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single tool.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] if the name is empty, the parameter
    /// type is not a record, schema synthesis fails, or the name is taken.
    pub fn register<H, M>(
        &self,
        definition: ToolDefinition,
        handler: H,
    ) -> Result<(), RegistrationError>
    where
        H: ToolHandler<M>,
        M: 'static,
    {
        self.register_many(vec![ToolRegistration::new(definition, handler)])
    }

    /// Registers a batch of tools atomically.
    ///
    /// Every entry is validated before anything is committed; on the first
    /// failure the registry is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`] in batch order.
    pub fn register_many(
        &self,
        registrations: Vec<ToolRegistration>,
    ) -> Result<(), RegistrationError> {
        let prepared = registrations
            .into_iter()
            .map(ToolRegistration::prepare)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tools = self.tools.write();

        let mut batch_names = HashSet::with_capacity(prepared.len());
        for tool in &prepared {
            let name = tool.definition.name.as_str();
            if tools.contains_key(name) || !batch_names.insert(name) {
                return Err(RegistrationError::DuplicateName {
                    tool: name.to_string(),
                });
            }
        }

        for tool in prepared {
            tracing::info!(
                tool = %tool.definition.name,
                params = tool.shape.type_name(),
                accepts_cancellation = tool.accepts_cancellation,
                "Registered tool"
            );
            tools.insert(tool.definition.name.clone(), Arc::new(tool));
        }

        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools.read().get(name).cloned()
    }

    /// Returns a snapshot of every tool definition, in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .values()
            .map(|tool| tool.definition.clone())
            .collect()
    }

    /// Whether a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}
