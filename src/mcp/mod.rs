//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing the note store
//! to AI assistants as tools, resources and prompts. The server communicates
//! over stdio transport using JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌────────────────┐   │
//! │   │  Transport  │───▶│   Server    │───▶│ Tools          │   │
//! │   │   (stdio)   │    │ (lifecycle) │    │ Resources      │   │
//! │   └─────────────┘    └─────────────┘    │ Prompts        │   │
//! │                                         └───────┬────────┘   │
//! │                                                 ▼            │
//! │                                         ┌────────────────┐   │
//! │                                         │   NoteStore    │   │
//! │                                         └────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{Response, RpcError, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::{LineTransport, StdioTransport};
