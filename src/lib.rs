//! notes-mcp: MCP server exposing a crash-safe notes store to AI assistants
//!
//! The server gives an assistant host three kinds of access to a personal
//! notes collection:
//!
//! - **Tools**: create, fetch, list, update and delete notes
//! - **Resources**: every note is readable as `note://{id}` (Markdown)
//! - **Prompts**: templated requests built from stored notes
//!
//! # Storage
//!
//! Notes live in memory and are written in full to a single JSON file after
//! every change, via a temp file and an atomic rename. A crash mid-write
//! leaves either the old or the new file, never a torn one.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Configuration error types
//! - [`mcp`]: MCP protocol implementation
//! - [`store`]: The note store

pub mod config;
pub mod error;
pub mod mcp;
pub mod store;
