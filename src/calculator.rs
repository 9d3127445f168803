//! Calculator tools served by the `mcp-tool-server` binary.
//!
//! Four arithmetic tools over two operands. `calculator/subtract` takes the
//! cancellation token to show the second handler form.

use std::convert::Infallible;

use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::mcp::tools::ToolRegistration;
use crate::mcp::types::ToolDefinition;

/// Operands for every calculator tool.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, JsonSchema)]
pub struct OperandParams {
    /// The first number.
    pub a: f64,
    /// The second number.
    pub b: f64,
}

/// Failures reported by calculator tools.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorError {
    /// The divisor was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The request was cancelled before the result was produced.
    #[error("operation cancelled")]
    Cancelled,
}

/// Adds `b` to `a`.
///
/// # Errors
///
/// Never fails.
pub fn add(params: OperandParams) -> Result<f64, Infallible> {
    Ok(params.a + params.b)
}

/// Subtracts `b` from `a`.
///
/// # Errors
///
/// Returns [`CalculatorError::Cancelled`] if `token` is already cancelled.
pub fn subtract(token: CancellationToken, params: OperandParams) -> Result<f64, CalculatorError> {
    if token.is_cancelled() {
        return Err(CalculatorError::Cancelled);
    }
    Ok(params.a - params.b)
}

/// Multiplies `a` by `b`.
///
/// # Errors
///
/// Never fails.
pub fn multiply(params: OperandParams) -> Result<f64, Infallible> {
    Ok(params.a * params.b)
}

/// Divides `a` by `b`.
///
/// # Errors
///
/// Returns [`CalculatorError::DivisionByZero`] if `b` is zero.
pub fn divide(params: OperandParams) -> Result<f64, CalculatorError> {
    if params.b == 0.0 {
        return Err(CalculatorError::DivisionByZero);
    }
    Ok(params.a / params.b)
}

/// The calculator tools, ready for [`crate::mcp::tools::ToolRegistry::register_many`].
#[must_use]
pub fn registrations() -> Vec<ToolRegistration> {
    vec![
        ToolRegistration::new(
            ToolDefinition::new("calculator/add")
                .with_title("Add")
                .with_description("Add two numbers"),
            add,
        ),
        ToolRegistration::new(
            ToolDefinition::new("calculator/subtract")
                .with_title("Subtract")
                .with_description("Subtract the second number from the first"),
            subtract,
        ),
        ToolRegistration::new(
            ToolDefinition::new("calculator/multiply")
                .with_title("Multiply")
                .with_description("Multiply two numbers"),
            multiply,
        ),
        ToolRegistration::new(
            ToolDefinition::new("calculator/divide")
                .with_title("Divide")
                .with_description("Divide the first number by the second"),
            divide,
        ),
    ]
}
