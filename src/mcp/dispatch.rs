//! Tool dispatch: name resolution, argument decoding and invocation.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::mcp::tools::{ToolOutcome, ToolRegistry};

/// Resolves tool calls against a registry.
///
/// The registry read lock is held only for the lookup, so a slow handler never
/// blocks other calls or listings.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher reads from.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invokes the tool `name` with `arguments`.
    ///
    /// The handler runs exactly once, on the calling thread, with no timeout.
    /// A failure reported by the handler is an `Ok` outcome with `is_error`
    /// set.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::ToolNotFound`] if no such tool is registered
    /// - [`DispatchError::InvalidArguments`] if `arguments` does not decode
    ///   into the tool's parameter type (the handler is not called)
    pub fn invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        token: CancellationToken,
    ) -> Result<ToolOutcome, DispatchError> {
        let tool = self
            .registry
            .lookup(name)
            .ok_or_else(|| DispatchError::ToolNotFound {
                tool: name.to_string(),
            })?;

        let outcome =
            tool.invoke(arguments, token)
                .map_err(|source| DispatchError::InvalidArguments {
                    tool: name.to_string(),
                    source,
                })?;

        if outcome.is_error {
            tracing::warn!(tool = name, error = %outcome.text, "Tool reported an error");
        } else {
            tracing::debug!(tool = name, "Tool completed");
        }

        Ok(outcome)
    }
}
