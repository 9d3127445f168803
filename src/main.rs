//! mcp-tool-server: MCP server exposing calculator tools over HTTP
//!
//! Registers the calculator tools and serves them to MCP clients as JSON-RPC
//! 2.0 over a single HTTP endpoint until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use mcp_tool_server::calculator;
use mcp_tool_server::config;
use mcp_tool_server::mcp::server::McpServer;
use mcp_tool_server::mcp::transport::HttpServer;
use mcp_tool_server::mcp::types::{ImplementationInfo, ServerCapabilities};

/// MCP server exposing calculator tools over HTTP.
///
/// Serves `calculator/add`, `calculator/subtract`, `calculator/multiply` and
/// `calculator/divide` as MCP tools over JSON-RPC 2.0.
#[derive(Parser, Debug)]
#[command(name = "mcp-tool-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Address to listen on, overriding the configuration file
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "info" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the mcp-tool-server binary.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "mcp-tool-server {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting mcp-tool-server"
    );

    let addr = match args.bind {
        Some(addr) => addr,
        None => match cfg.server.socket_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!(error = %e, "Invalid bind address");
                return ExitCode::FAILURE;
            }
        },
    };

    // Create MCP server and register tools
    let mut server = McpServer::new(
        ImplementationInfo::new(cfg.server.name.clone(), cfg.server.version.clone()),
        ServerCapabilities::default(),
    );
    if let Some(instructions) = cfg.server.instructions.clone() {
        server = server.with_instructions(instructions);
    }

    if let Err(e) = server.register_tools(calculator::registrations()) {
        error!(error = %e, "Failed to register tools");
        return ExitCode::FAILURE;
    }
    info!(tools = server.registry().len(), "Tools registered");

    let http = HttpServer::new(Arc::new(server), addr, cfg.server.endpoint.clone());

    // Run the server
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(http.run());

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
