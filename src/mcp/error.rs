//! Typed errors for connection and capability operations.
//!
//! Transport plumbing keeps the `Result<T, String>` convention; everything
//! that crosses the crate's public surface is wrapped in one of these enums.
//! Connection-level failures never escalate past the affected connection.

use std::error::Error as StdError;
use std::fmt;

/// Failure to establish one connection. Fatal to the attempt, not the manager.
#[derive(Debug)]
pub enum ConnectError {
    /// A stdio config without a `command`.
    MissingCommand { server: String },
    /// An sse config without a `url`.
    MissingUrl { server: String },
    /// The config is marked disabled; no transport is built.
    Disabled { server: String },
    /// Transport construction failed (spawn error, client build error).
    Transport { server: String, message: String },
    /// The transport came up but the initialize exchange failed.
    Handshake { server: String, message: String },
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::MissingCommand { server } => {
                write!(f, "MCP command is required for stdio server '{}'.", server)
            }
            ConnectError::MissingUrl { server } => {
                write!(f, "MCP url is required for sse server '{}'.", server)
            }
            ConnectError::Disabled { server } => {
                write!(f, "MCP server '{}' is disabled in configuration.", server)
            }
            ConnectError::Transport { server, message } => {
                write!(f, "Transport setup failed for '{}': {}", server, message)
            }
            ConnectError::Handshake { server, message } => {
                write!(f, "Handshake failed for '{}': {}", server, message)
            }
        }
    }
}

impl StdError for ConnectError {}

/// Failure of an explicit restart request.
#[derive(Debug)]
pub enum RestartError {
    /// No connection with that name exists.
    NoSuchConnection { server: String },
    /// The old connection was removed but the reconnect failed.
    ReconnectFailed {
        server: String,
        source: ConnectError,
    },
}

impl fmt::Display for RestartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartError::NoSuchConnection { server } => {
                write!(f, "No MCP connection named '{}'.", server)
            }
            RestartError::ReconnectFailed { server, source } => {
                write!(f, "Reconnect of '{}' failed: {}", server, source)
            }
        }
    }
}

impl StdError for RestartError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RestartError::NoSuchConnection { .. } => None,
            RestartError::ReconnectFailed { source, .. } => Some(source),
        }
    }
}

/// Failure of one tool invocation, surfaced to the caller of `call_tool`.
#[derive(Debug)]
pub enum ToolCallError {
    /// The manager has not finished (or failed) initialization.
    ManagerUnavailable { reason: String },
    ConnectionNotFound { server: String },
    ServerDisabled { server: String },
    /// The connection exists but is not currently connected.
    NotConnected { server: String },
    /// The per-call deadline elapsed before a response arrived.
    Timeout {
        server: String,
        tool: String,
        millis: u64,
    },
    /// The provider responded, but not with a parseable tool result.
    InvalidResult {
        server: String,
        tool: String,
        message: String,
    },
    /// The provider returned a JSON-RPC error.
    Rpc {
        server: String,
        tool: String,
        message: String,
    },
    /// The request never completed at the transport level.
    Transport { server: String, message: String },
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolCallError::ManagerUnavailable { reason } => {
                write!(f, "MCP manager is not ready: {}", reason)
            }
            ToolCallError::ConnectionNotFound { server } => {
                write!(f, "No MCP connection named '{}'.", server)
            }
            ToolCallError::ServerDisabled { server } => {
                write!(f, "MCP server '{}' is disabled in configuration.", server)
            }
            ToolCallError::NotConnected { server } => {
                write!(f, "MCP server '{}' is not connected.", server)
            }
            ToolCallError::Timeout {
                server,
                tool,
                millis,
            } => {
                write!(
                    f,
                    "Tool call '{}' on '{}' timed out after {} ms.",
                    tool, server, millis
                )
            }
            ToolCallError::InvalidResult {
                server,
                tool,
                message,
            } => {
                write!(
                    f,
                    "Tool call '{}' on '{}' returned an invalid result: {}",
                    tool, server, message
                )
            }
            ToolCallError::Rpc {
                server,
                tool,
                message,
            } => {
                write!(f, "Tool call '{}' on '{}' failed: {}", tool, server, message)
            }
            ToolCallError::Transport { server, message } => {
                write!(f, "Transport error on '{}': {}", server, message)
            }
        }
    }
}

impl StdError for ToolCallError {}

/// Failure of one resource read, surfaced to the caller of `read_resource`.
#[derive(Debug)]
pub enum ResourceReadError {
    /// The manager has not finished (or failed) initialization.
    ManagerUnavailable { reason: String },
    ConnectionNotFound { server: String },
    ServerDisabled { server: String },
    /// A generic synthetic URI named a tool the server does not expose.
    ToolNotFound { server: String, tool: String },
    /// The provider's native read failed; its message passes through.
    Provider { server: String, message: String },
}

impl fmt::Display for ResourceReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceReadError::ManagerUnavailable { reason } => {
                write!(f, "MCP manager is not ready: {}", reason)
            }
            ResourceReadError::ConnectionNotFound { server } => {
                write!(f, "No MCP connection named '{}'.", server)
            }
            ResourceReadError::ServerDisabled { server } => {
                write!(f, "MCP server '{}' is disabled in configuration.", server)
            }
            ResourceReadError::ToolNotFound { server, tool } => {
                write!(f, "Tool '{}' not found on MCP server '{}'.", tool, server)
            }
            ResourceReadError::Provider { server, message } => {
                write!(f, "Resource read on '{}' failed: {}", server, message)
            }
        }
    }
}

impl StdError for ResourceReadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_failure_exposes_cause() {
        let err = RestartError::ReconnectFailed {
            server: "n8n".to_string(),
            source: ConnectError::MissingUrl {
                server: "n8n".to_string(),
            },
        };

        assert!(err.to_string().contains("Reconnect of 'n8n' failed"));
        let source = err.source().expect("cause should be exposed");
        assert!(source.to_string().contains("url is required"));
    }

    #[test]
    fn timeout_message_names_tool_and_deadline() {
        let err = ToolCallError::Timeout {
            server: "n8n".to_string(),
            tool: "weather".to_string(),
            millis: 5_000,
        };
        assert_eq!(
            err.to_string(),
            "Tool call 'weather' on 'n8n' timed out after 5000 ms."
        );
    }
}
