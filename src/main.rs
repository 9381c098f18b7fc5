//! notes-mcp: MCP server exposing a crash-safe notes store to AI assistants
//!
//! Speaks MCP over stdio. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use notes_mcp::config;
use notes_mcp::mcp::server::McpServer;
use notes_mcp::store::{Limits, NoteStore};

/// MCP server exposing a crash-safe notes store to AI assistants.
///
/// Provides tools, resources and prompts for creating, reading, listing,
/// updating and deleting notes kept in a single JSON file.
#[derive(Parser, Debug)]
#[command(name = "notes-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Path to the notes file (overrides the configuration file)
    #[arg(short, long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
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
            _ => Level::WARN, // Default to warn for unknown levels
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

/// Entry point for the notes-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting notes-mcp server"
    );

    let store_path = match config::resolve_store_path(args.store.as_deref(), &cfg) {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "Cannot locate notes file");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(NoteStore::new(store_path, Limits::from(&cfg.limits)));
    match store.initialize() {
        Ok(report) => {
            if report.recovered_from_corruption {
                warn!(
                    quarantined = ?report.quarantined,
                    "Notes file was corrupt; started with an empty store"
                );
            }
            info!(
                path = %store.path().display(),
                notes = report.loaded,
                skipped = report.skipped,
                "Note store opened"
            );
        }
        Err(e) => {
            error!(error = %e, path = %store.path().display(), "Failed to open note store");
            return ExitCode::FAILURE;
        }
    }

    // Create MCP server
    let mut server = McpServer::new(Arc::clone(&store));

    info!("MCP server ready, waiting for client connection...");

    // Run the server
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(server.run());

    let flushed = store.shutdown();
    if let Err(ref e) = flushed {
        error!(error = %e, "Failed to flush note store");
    }

    match result {
        Ok(()) if flushed.is_ok() => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Ok(()) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
