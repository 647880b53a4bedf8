//! Shared MCP transport abstractions.
//!
//! Implementations normalize protocol differences across stdio and HTTP
//! event-stream providers so the connection layer can hold one state machine.
//! The factory is the only place required config fields are checked; nothing
//! is spawned or built when a field is missing.

use crate::core::config::ServerConfig;
use crate::mcp::connection::SharedHealth;
use crate::mcp::error::ConnectError;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{RequestFromClient, ServerMessage};
use rust_mcp_schema::{InitializeRequestParams, InitializeResult, RpcError};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub mod sse;
pub mod stdio;

/// JSON-RPC code used by servers to indicate unsupported list methods.
pub const MCP_METHOD_NOT_FOUND: i64 = -32601;

/// Supported MCP transport backends.
///
/// - [`TransportKind::Stdio`] for locally spawned processes.
/// - [`TransportKind::Sse`] for remote servers over HTTP event streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Sse,
}

impl TransportKind {
    /// Resolves the transport type from config, defaulting to sse.
    pub fn from_config(config: &ServerConfig) -> Result<Self, String> {
        let transport = config
            .transport
            .as_deref()
            .unwrap_or("sse")
            .to_ascii_lowercase();
        match transport.as_str() {
            "sse" | "http" | "streamable-http" | "streamable_http" => Ok(TransportKind::Sse),
            "stdio" => Ok(TransportKind::Stdio),
            other => Err(format!("Unsupported MCP transport: {}", other)),
        }
    }
}

/// Normalized outcome for capability list calls across transports.
#[derive(Debug)]
pub enum CapabilityFetch<T> {
    Fetched(T),
    Unsupported,
    Failed(String),
}

/// Failure below the protocol layer. Deadline expiry is kept distinct so
/// callers can surface it separately from channel breakage.
#[derive(Debug)]
pub enum SendError {
    TimedOut { millis: u64 },
    Failed(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::TimedOut { millis } => {
                write!(f, "Request timed out after {} ms", millis)
            }
            SendError::Failed(message) => write!(f, "{}", message),
        }
    }
}

/// Transport contract required by the handshake and operation flows.
#[async_trait]
pub trait McpTransport: Send {
    /// Performs the initialize exchange and the follow-up initialized
    /// notification, returning the server's reported details.
    async fn initialize(
        &mut self,
        request: InitializeRequestParams,
        timeout: Duration,
    ) -> Result<InitializeResult, String>;

    async fn send_request(
        &mut self,
        request: RequestFromClient,
        timeout: Duration,
    ) -> Result<ServerMessage, SendError>;

    /// Releases transport resources. Best-effort; never fails.
    async fn close(&mut self);
}

/// Builds the transport for `name` from its config.
pub async fn build_transport(
    name: &str,
    config: &ServerConfig,
    health: SharedHealth,
) -> Result<Box<dyn McpTransport>, ConnectError> {
    let kind = TransportKind::from_config(config).map_err(|message| ConnectError::Transport {
        server: name.to_string(),
        message,
    })?;

    match kind {
        TransportKind::Stdio => {
            let command = require_stdio_command(name, config)?;
            let transport = stdio::StdioTransport::spawn(name, &command, config, health)
                .await
                .map_err(|message| ConnectError::Transport {
                    server: name.to_string(),
                    message,
                })?;
            Ok(Box::new(transport))
        }
        TransportKind::Sse => {
            let url = require_sse_url(name, config)?;
            let transport =
                sse::SseTransport::new(name, url).map_err(|message| ConnectError::Transport {
                    server: name.to_string(),
                    message,
                })?;
            Ok(Box::new(transport))
        }
    }
}

fn require_stdio_command(name: &str, config: &ServerConfig) -> Result<String, ConnectError> {
    config
        .command
        .clone()
        .ok_or_else(|| ConnectError::MissingCommand {
            server: name.to_string(),
        })
}

fn require_sse_url(name: &str, config: &ServerConfig) -> Result<String, ConnectError> {
    config.url.clone().ok_or_else(|| ConnectError::MissingUrl {
        server: name.to_string(),
    })
}

/// Returns true when a server reports the JSON-RPC method-not-found code.
pub fn is_method_not_found(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::Error(error) if error.error.code == MCP_METHOD_NOT_FOUND
    )
}

pub(crate) fn parse_initialize_result(message: ServerMessage) -> Result<InitializeResult, String> {
    let value = parse_response_value(message)?;
    let result =
        serde_json::from_value::<InitializeResult>(value).map_err(|err| err.to_string())?;
    if result.protocol_version.trim().is_empty() {
        return Err("Unexpected initialize response.".to_string());
    }
    Ok(result)
}

pub(crate) fn parse_response<T: serde::de::DeserializeOwned>(
    message: ServerMessage,
) -> Result<T, String> {
    let value = parse_response_value(message)?;
    serde_json::from_value::<T>(value).map_err(|err| err.to_string())
}

pub(crate) fn parse_response_value(message: ServerMessage) -> Result<Value, String> {
    match message {
        ServerMessage::Response(response) => {
            serde_json::to_value(&response.result).map_err(|err| err.to_string())
        }
        ServerMessage::Error(error) => Err(format_rpc_error(&error.error)),
        other => Err(format_unexpected_server_message(&other)),
    }
}

pub(crate) fn format_unexpected_server_message(message: &ServerMessage) -> String {
    format!("Unexpected MCP server message: {message:?}")
}

pub(crate) fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details {
            if !details.is_empty() {
                output.push('\n');
                output.push_str(&details);
            }
        }
    }
    output
}
