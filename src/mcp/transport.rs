//! HTTP transport for the MCP server.
//!
//! One endpoint (default `/mcp`) accepts:
//!
//! - `POST`: a JSON-RPC request or notification in the body
//! - `GET`: answered with an empty `200`; reserved for a server-to-client stream
//! - anything else: `405 Method Not Allowed`
//!
//! The router is synchronous, so each `POST` runs on the blocking pool. A
//! handler that panics only takes down its own blocking task; the caller gets
//! an internal error and the server keeps serving.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use crate::error::TransportError;
use crate::mcp::protocol::{ErrorCode, JsonRpcError, RequestId};
use crate::mcp::server::{McpServer, Reply};

/// Response header carrying the session identifier minted by `initialize`.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Builds the axum router serving `server` at `endpoint`.
///
/// # Panics
///
/// Panics if `endpoint` does not start with `/`. Configuration validation
/// rejects such endpoints before they get here.
pub fn build_router(server: Arc<McpServer>, endpoint: &str) -> Router {
    Router::new()
        .route(endpoint, post(handle_post).get(handle_get))
        .with_state(server)
}

/// Maps a router reply to its HTTP status.
#[must_use]
pub const fn http_status(reply: &Reply) -> StatusCode {
    match reply {
        Reply::Response { error: None, .. } => StatusCode::OK,
        Reply::Response {
            error: Some(code), ..
        } => match code {
            ErrorCode::ParseError | ErrorCode::InvalidRequest | ErrorCode::InvalidParams => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::MethodNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError | ErrorCode::ServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
        Reply::Accepted => StatusCode::ACCEPTED,
        Reply::Rejected => StatusCode::BAD_REQUEST,
    }
}

async fn handle_post(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let reply = match tokio::task::spawn_blocking(move || server.handle_message(&body)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "Request handler failed");
            return internal_error_response();
        }
    };

    reply_to_response(reply)
}

async fn handle_get() -> StatusCode {
    StatusCode::OK
}

fn reply_to_response(reply: Reply) -> Response {
    let status = http_status(&reply);

    match reply {
        Reply::Response {
            body, session_id, ..
        } => {
            let mut response =
                (status, [(header::CONTENT_TYPE, "application/json")], body).into_response();
            if let Some(id) = session_id {
                match HeaderValue::from_str(id.as_str()) {
                    Ok(value) => {
                        response.headers_mut().insert(SESSION_ID_HEADER, value);
                    }
                    Err(e) => tracing::error!(error = %e, session = %id, "Invalid session header"),
                }
            }
            response
        }
        Reply::Accepted | Reply::Rejected => status.into_response(),
    }
}

/// Answer used when the router itself did not produce a reply.
fn internal_error_response() -> Response {
    let error = JsonRpcError::internal_error(RequestId::Null, "Internal error");
    let body = serde_json::to_string(&error).unwrap_or_default();

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Axum-based HTTP server for an [`McpServer`].
#[derive(Debug)]
pub struct HttpServer {
    addr: SocketAddr,
    endpoint: String,
    server: Arc<McpServer>,
}

impl HttpServer {
    /// Creates a server that will listen on `addr` and serve `endpoint`.
    #[must_use]
    pub fn new(server: Arc<McpServer>, addr: SocketAddr, endpoint: impl Into<String>) -> Self {
        Self {
            addr,
            endpoint: endpoint.into(),
            server,
        }
    }

    /// The address to listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The endpoint path.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Serves until SIGINT or SIGTERM, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP bind fails or the server crashes.
    pub async fn run(self) -> Result<(), TransportError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` completes, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP bind fails or the server crashes.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: self.addr.to_string(),
                source,
            })?;

        let local_addr = listener.local_addr().unwrap_or(self.addr);
        tracing::info!(addr = %local_addr, endpoint = %self.endpoint, "MCP HTTP server ready");

        let router = build_router(self.server, &self.endpoint);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(TransportError::Serve)?;

        tracing::info!("MCP HTTP server stopped");
        Ok(())
    }
}

/// Completes on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
