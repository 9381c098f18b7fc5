//! MCP server implementation for the notes store.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool, resource and prompt requests
//! 3. **Shutdown**: Graceful connection termination
//!
//! Message handling is split from I/O: [`McpServer::dispatch`] turns one
//! parsed message into an optional response, and [`McpServer::run`] drives
//! it from the stdio transport.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::prompts::{self, PromptGetParams};
use crate::mcp::protocol::{
    parse_message, Incoming, Notification, Request, RequestId, Response, RpcError,
    ServerNotification, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::resources;
use crate::mcp::tools::{self, ToolCallParams};
use crate::mcp::transport::StdioTransport;
use crate::store::NoteStore;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ListChangedCapability,
    /// Resource-related capabilities.
    pub resources: ListChangedCapability,
    /// Prompt-related capabilities.
    pub prompts: ListChangedCapability,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: ListChangedCapability::default(),
            // Notes come and go, so the resource list changes.
            resources: ListChangedCapability { list_changed: true },
            prompts: ListChangedCapability::default(),
        }
    }
}

/// Capability object carrying only a `listChanged` flag.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListChangedCapability {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool, so we must take &bool here
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for the resources/read request.
#[derive(Debug, Clone, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

/// The MCP server for the notes store.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: StdioTransport,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// The note store shared with the embedding application.
    store: Arc<NoteStore>,
    /// Notifications queued by the last dispatched message.
    pending: Vec<ServerNotification>,
}

impl McpServer {
    /// Creates a new MCP server over an initialised note store.
    #[must_use]
    pub fn new(store: Arc<NoteStore>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport: StdioTransport::stdio(),
            protocol_version: None,
            store,
            pending: Vec::new(),
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the negotiated protocol version, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Drains notifications queued while dispatching.
    pub fn take_notifications(&mut self) -> Vec<ServerNotification> {
        std::mem::take(&mut self.pending)
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.recv() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.recv() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles the result from transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            tracing::info!("stdin closed, shutting down");
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(&line).await?;

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> std::io::Result<()> {
        let response = match parse_message(line) {
            Ok(msg) => self.dispatch(msg),
            Err(error) => {
                tracing::debug!(code = error.code().code(), "Rejected malformed message");
                Some(Err(error))
            }
        };

        match response {
            Some(Ok(resp)) => self.transport.send(&resp).await?,
            Some(Err(error)) => self.transport.send(&error).await?,
            None => {}
        }

        for notification in self.take_notifications() {
            self.transport.send(&notification).await?;
        }
        Ok(())
    }

    /// Handles one parsed message without doing any I/O.
    ///
    /// Returns `None` for notifications, which get no response. Any
    /// notifications the server wants to send are queued; see
    /// [`Self::take_notifications`].
    pub fn dispatch(
        &mut self,
        msg: Incoming,
    ) -> Option<Result<Response, RpcError>> {
        tracing::trace!(method = msg.method(), "Dispatching message");
        match msg {
            Incoming::Request(req) => Some(self.handle_request(&req)),
            Incoming::Notification(ref notif) => {
                self.handle_notification(notif);
                None
            }
        }
    }

    /// Handles an incoming request.
    fn handle_request(&mut self, req: &Request) -> Result<Response, RpcError> {
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => Ok(Self::handle_ping(req)),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "resources/list" => self.handle_resources_list(req),
            "resources/templates/list" => self.handle_resource_templates_list(req),
            "resources/read" => self.handle_resources_read(req),
            "prompts/list" => self.handle_prompts_list(req),
            "prompts/get" => self.handle_prompts_get(req),
            _ => Err(RpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &Notification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::info!("Client initialised, server running");
            self.state = ServerState::Running;
        }
    }

    /// Deserialises required request params.
    fn params<T: serde::de::DeserializeOwned>(
        req: &Request,
        what: &str,
    ) -> Result<T, RpcError> {
        req.params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                RpcError::invalid_params(req.id.clone(), format!("Invalid {what} params: {e}"))
            })?
            .ok_or_else(|| {
                RpcError::invalid_params(req.id.clone(), format!("Missing {what} params"))
            })
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &Request) -> Result<Response, RpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(RpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = Self::params(req, "initialize")?;
        tracing::info!(
            client = params.client_info.as_ref().map(|c| c.name.as_str()),
            requested_version = %params.protocol_version,
            "Initialising session"
        );

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();

        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(Response::new(req.id.clone(), result))
    }

    /// Handles the ping request.
    fn handle_ping(req: &Request) -> Response {
        Response::new(req.id.clone(), json!({}))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), RpcError> {
        if self.state != ServerState::Running {
            return Err(RpcError::invalid_request(
                Some(id.clone()),
                "Server not initialised",
            ));
        }
        Ok(())
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &Request) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;

        let result = json!({
            "tools": tools::definitions(),
        });

        Ok(Response::new(req.id.clone(), result))
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&mut self, req: &Request) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = Self::params(req, "tool call")?;
        tracing::debug!(tool = %params.name, "Tool call");

        let outcome = tools::call(&self.store, &params.name, &params.arguments);
        if outcome.notes_changed {
            self.pending.push(ServerNotification::resource_list_changed());
        }

        let result_value = serde_json::to_value(&outcome.result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            RpcError::internal(req.id.clone(), "Internal error: failed to serialise result")
        })?;

        Ok(Response::new(req.id.clone(), result_value))
    }

    /// Handles the resources/list request.
    fn handle_resources_list(&self, req: &Request) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;
        let result = resources::list(&self.store, &req.id)?;
        Ok(Response::new(req.id.clone(), result))
    }

    /// Handles the resources/templates/list request.
    fn handle_resource_templates_list(
        &self,
        req: &Request,
    ) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;
        Ok(Response::new(req.id.clone(), resources::templates()))
    }

    /// Handles the resources/read request.
    fn handle_resources_read(&self, req: &Request) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;
        let params: ResourceReadParams = Self::params(req, "resource read")?;
        let result = resources::read(&self.store, &req.id, &params.uri)?;
        Ok(Response::new(req.id.clone(), result))
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, req: &Request) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;
        let result = json!({
            "prompts": prompts::definitions(),
        });
        Ok(Response::new(req.id.clone(), result))
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(&self, req: &Request) -> Result<Response, RpcError> {
        self.require_running(&req.id)?;
        let params: PromptGetParams = Self::params(req, "prompt")?;
        let result = prompts::get(&self.store, &req.id, &params)?;
        Ok(Response::new(req.id.clone(), result))
    }
}
