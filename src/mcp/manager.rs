//! Connection lifecycle management.
//!
//! The manager owns every configured connection and is the only place the
//! connection set is mutated. Reconciliation diffs desired config against the
//! live set; changed entries are always torn down and recreated, never
//! reconfigured in place. Callers construct a manager and pass it where it is
//! needed; nothing here is process-global.

use crate::core::config::ServerConfig;
use crate::mcp::capabilities;
use crate::mcp::client::{CallFailure, McpClient};
use crate::mcp::connection::{Connection, ConnectionStatus};
use crate::mcp::error::{ConnectError, ResourceReadError, RestartError, ToolCallError};
use crate::mcp::synthetic;
use crate::mcp::transport::build_transport;
use crate::mcp::types::{ResourceReadResult, ToolCallOutcome};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_CALL_TIMEOUT_MILLIS: u64 = 60_000;

/// Whether the manager can serve calls. Checked once per operation instead of
/// probing for capabilities at each call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerReadiness {
    Uninitialized,
    Ready,
    Failed(String),
}

pub struct ConnectionManager {
    connections: HashMap<String, Connection>,
    readiness: ManagerReadiness,
}

impl ConnectionManager {
    pub fn new() -> Self {
        ConnectionManager {
            connections: HashMap::new(),
            readiness: ManagerReadiness::Uninitialized,
        }
    }

    pub fn readiness(&self) -> &ManagerReadiness {
        &self.readiness
    }

    /// Marks the manager unusable, e.g. when configuration loading failed.
    pub fn mark_failed(&mut self, reason: &str) {
        self.readiness = ManagerReadiness::Failed(reason.to_string());
    }

    fn ensure_ready(&self) -> Result<(), String> {
        match &self.readiness {
            ManagerReadiness::Ready => Ok(()),
            ManagerReadiness::Uninitialized => {
                Err("manager has not been initialized".to_string())
            }
            ManagerReadiness::Failed(reason) => Err(reason.clone()),
        }
    }

    /// Brings the live connection set in line with `desired`.
    ///
    /// Entries absent from `desired` are closed and removed first. Entries
    /// whose config differs structurally are torn down and recreated; new
    /// entries are connected. Names are processed in sorted order so runs are
    /// deterministic, and individual connect failures never abort the pass.
    pub async fn reconcile(&mut self, desired: &HashMap<String, ServerConfig>) {
        let removed: Vec<String> = self
            .connections
            .keys()
            .filter(|name| !desired.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            self.remove_connection(&name).await;
        }

        let mut names: Vec<&String> = desired.keys().collect();
        names.sort();
        for name in names {
            let config = &desired[name];
            match self.connections.get(name.as_str()) {
                Some(existing) if existing.config == *config => {
                    debug!(server = %name, "MCP connection unchanged");
                    continue;
                }
                Some(_) => {
                    info!(server = %name, "MCP config changed; recreating connection");
                    self.remove_connection(name).await;
                }
                None => {}
            }

            if !config.is_enabled() {
                debug!(server = %name, "MCP server disabled; not connecting");
                self.connections
                    .insert(name.clone(), Connection::new(name, config.clone()));
                continue;
            }

            if let Err(err) = self.connect(name, config).await {
                warn!(server = %name, error = %err, "MCP connect failed");
            }
        }

        self.readiness = ManagerReadiness::Ready;
    }

    /// Connects one server and discovers its capabilities.
    ///
    /// The connection entry is registered even when the attempt fails so its
    /// status and accumulated error text stay inspectable afterwards.
    pub async fn connect(&mut self, name: &str, config: &ServerConfig) -> Result<(), ConnectError> {
        if !config.is_enabled() {
            self.connections
                .entry(name.to_string())
                .or_insert_with(|| Connection::new(name, config.clone()));
            return Err(ConnectError::Disabled {
                server: name.to_string(),
            });
        }

        let mut connection = Connection::new(name, config.clone());
        let health = connection.health();
        health.set_status(ConnectionStatus::Connecting);
        info!(server = %name, "Connecting MCP server");

        let transport = match build_transport(name, config, health.clone()).await {
            Ok(transport) => transport,
            Err(err) => {
                health.mark_disconnected(&err.to_string());
                self.connections.insert(name.to_string(), connection);
                return Err(err);
            }
        };

        let mut client = McpClient::new(name, transport, call_timeout(config));
        if let Err(message) = client.handshake().await {
            health.mark_disconnected(&message);
            client.close().await;
            self.connections.insert(name.to_string(), connection);
            return Err(ConnectError::Handshake {
                server: name.to_string(),
                message,
            });
        }

        health.set_status(ConnectionStatus::Connected);

        let fetched = capabilities::fetch_all(name, &mut client).await;
        for warning in &fetched.warnings {
            health.record_error(warning);
        }
        let synthesized = synthetic::synthesize_capabilities(
            name,
            &fetched.tools,
            fetched.resources,
            fetched.resource_templates,
        );

        connection.tools = fetched.tools;
        connection.resources = synthesized.resources;
        connection.resource_templates = synthesized.resource_templates;
        connection.client = Some(client);
        info!(
            server = %name,
            tools = connection.tools.len(),
            resources = connection.resources.len(),
            "MCP server connected"
        );
        self.connections.insert(name.to_string(), connection);
        Ok(())
    }

    async fn remove_connection(&mut self, name: &str) {
        if let Some(mut connection) = self.connections.remove(name) {
            info!(server = %name, "Removing MCP connection");
            if let Some(mut client) = connection.client.take() {
                client.close().await;
            }
        }
    }

    /// Tears down the named connection and reconnects it with its stored
    /// config.
    pub async fn restart(&mut self, name: &str) -> Result<(), RestartError> {
        let config = match self.connections.get(name) {
            Some(connection) => connection.config.clone(),
            None => {
                return Err(RestartError::NoSuchConnection {
                    server: name.to_string(),
                });
            }
        };
        info!(server = %name, "Restarting MCP connection");
        self.remove_connection(name).await;
        self.connect(name, &config)
            .await
            .map_err(|source| RestartError::ReconnectFailed {
                server: name.to_string(),
                source,
            })
    }

    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    /// Read-only view of every connection, keyed by name.
    pub fn connections(&self) -> &HashMap<String, Connection> {
        &self.connections
    }

    /// True when at least one connected server has a non-empty resource list.
    /// Computed live on every call; transports flip status asynchronously.
    pub fn check_resource_availability(&self) -> bool {
        self.connections
            .values()
            .any(|connection| connection.is_connected() && !connection.resources.is_empty())
    }

    /// Invokes a tool with the per-server default timeout.
    pub async fn call_tool(
        &mut self,
        server: &str,
        tool: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolCallOutcome, ToolCallError> {
        self.call_tool_inner(server, tool, arguments, None).await
    }

    /// Invokes a tool under an explicit deadline instead of the default.
    pub async fn call_tool_with_timeout(
        &mut self,
        server: &str,
        tool: &str,
        arguments: Option<Map<String, Value>>,
        timeout: Duration,
    ) -> Result<ToolCallOutcome, ToolCallError> {
        self.call_tool_inner(server, tool, arguments, Some(timeout))
            .await
    }

    async fn call_tool_inner(
        &mut self,
        server: &str,
        tool: &str,
        arguments: Option<Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<ToolCallOutcome, ToolCallError> {
        self.ensure_ready()
            .map_err(|reason| ToolCallError::ManagerUnavailable { reason })?;
        let connection = self.connections.get_mut(server).ok_or_else(|| {
            ToolCallError::ConnectionNotFound {
                server: server.to_string(),
            }
        })?;
        if !connection.config.is_enabled() {
            return Err(ToolCallError::ServerDisabled {
                server: server.to_string(),
            });
        }
        if !connection.is_connected() {
            return Err(ToolCallError::NotConnected {
                server: server.to_string(),
            });
        }
        let client = connection
            .client
            .as_mut()
            .ok_or_else(|| ToolCallError::NotConnected {
                server: server.to_string(),
            })?;

        client
            .call_tool(tool, arguments, timeout)
            .await
            .map_err(|failure| tool_call_error(server, tool, failure))
    }

    #[cfg(test)]
    pub(crate) fn insert_connection(&mut self, connection: Connection) {
        self.connections
            .insert(connection.name.clone(), connection);
    }

    /// Reads a resource straight from the provider, bypassing synthesis.
    pub(crate) async fn read_native(
        &mut self,
        server: &str,
        uri: &str,
    ) -> Result<ResourceReadResult, ResourceReadError> {
        self.ensure_ready()
            .map_err(|reason| ResourceReadError::ManagerUnavailable { reason })?;
        let connection = self.connections.get_mut(server).ok_or_else(|| {
            ResourceReadError::ConnectionNotFound {
                server: server.to_string(),
            }
        })?;
        if !connection.config.is_enabled() {
            return Err(ResourceReadError::ServerDisabled {
                server: server.to_string(),
            });
        }
        if !connection.is_connected() {
            return Err(ResourceReadError::Provider {
                server: server.to_string(),
                message: "MCP server is not connected.".to_string(),
            });
        }
        let client = connection
            .client
            .as_mut()
            .ok_or_else(|| ResourceReadError::Provider {
                server: server.to_string(),
                message: "MCP server is not connected.".to_string(),
            })?;

        client
            .read_resource(uri)
            .await
            .map_err(|failure| ResourceReadError::Provider {
                server: server.to_string(),
                message: failure.to_string(),
            })
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn call_timeout(config: &ServerConfig) -> Duration {
    Duration::from_millis(
        config
            .timeout_millis()
            .unwrap_or(DEFAULT_CALL_TIMEOUT_MILLIS),
    )
}

fn tool_call_error(server: &str, tool: &str, failure: CallFailure) -> ToolCallError {
    match failure {
        CallFailure::Timeout { millis } => ToolCallError::Timeout {
            server: server.to_string(),
            tool: tool.to_string(),
            millis,
        },
        CallFailure::Rpc(message) => ToolCallError::Rpc {
            server: server.to_string(),
            tool: tool.to_string(),
            message,
        },
        CallFailure::Invalid(message) => ToolCallError::InvalidResult {
            server: server.to_string(),
            tool: tool.to_string(),
            message,
        },
        CallFailure::Transport(message) => ToolCallError::Transport {
            server: server.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdio_config_without_command() -> ServerConfig {
        ServerConfig {
            transport: Some("stdio".to_string()),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn reconcile_registers_failed_attempts() {
        let mut manager = ConnectionManager::new();
        let mut desired = HashMap::new();
        desired.insert("alpha".to_string(), stdio_config_without_command());

        manager.reconcile(&desired).await;

        let connection = manager.get("alpha").expect("entry should exist");
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        let error = connection.last_error().expect("error text");
        assert!(error.contains("command is required"));
        assert_eq!(*manager.readiness(), ManagerReadiness::Ready);
    }

    #[tokio::test]
    async fn reconcile_keeps_unchanged_connections() {
        let mut manager = ConnectionManager::new();
        let mut desired = HashMap::new();
        desired.insert("alpha".to_string(), stdio_config_without_command());

        manager.reconcile(&desired).await;
        manager
            .get("alpha")
            .expect("entry should exist")
            .health()
            .record_error("marker");

        manager.reconcile(&desired).await;

        let error = manager
            .get("alpha")
            .expect("entry should exist")
            .last_error()
            .expect("error text");
        assert!(error.contains("marker"));
    }

    #[tokio::test]
    async fn reconcile_recreates_on_config_change() {
        let mut manager = ConnectionManager::new();
        let mut desired = HashMap::new();
        desired.insert("alpha".to_string(), stdio_config_without_command());
        manager.reconcile(&desired).await;
        manager
            .get("alpha")
            .expect("entry should exist")
            .health()
            .record_error("marker");

        let changed = ServerConfig {
            args: Some(vec!["--verbose".to_string()]),
            ..stdio_config_without_command()
        };
        desired.insert("alpha".to_string(), changed);
        manager.reconcile(&desired).await;

        let error = manager
            .get("alpha")
            .expect("entry should exist")
            .last_error()
            .expect("error text");
        assert!(!error.contains("marker"));
    }

    #[tokio::test]
    async fn reconcile_removes_deleted_entries() {
        let mut manager = ConnectionManager::new();
        let mut desired = HashMap::new();
        desired.insert("alpha".to_string(), stdio_config_without_command());
        manager.reconcile(&desired).await;
        assert!(manager.get("alpha").is_some());

        manager.reconcile(&HashMap::new()).await;
        assert!(manager.get("alpha").is_none());
    }

    #[tokio::test]
    async fn disabled_servers_keep_an_unconnected_entry() {
        let mut manager = ConnectionManager::new();
        let mut desired = HashMap::new();
        desired.insert(
            "alpha".to_string(),
            ServerConfig {
                url: Some("http://127.0.0.1:9/mcp".to_string()),
                disabled: Some(true),
                ..ServerConfig::default()
            },
        );

        manager.reconcile(&desired).await;

        let connection = manager.get("alpha").expect("entry should exist");
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        assert!(connection.last_error().is_none());

        let err = manager
            .call_tool("alpha", "calculator", None)
            .await
            .expect_err("disabled server should reject calls");
        assert!(matches!(err, ToolCallError::ServerDisabled { .. }));
    }

    #[tokio::test]
    async fn calls_require_an_initialized_manager() {
        let mut manager = ConnectionManager::new();
        let err = manager
            .call_tool("alpha", "calculator", None)
            .await
            .expect_err("uninitialized manager should reject calls");
        assert!(matches!(err, ToolCallError::ManagerUnavailable { .. }));

        manager.reconcile(&HashMap::new()).await;
        let err = manager
            .call_tool("alpha", "calculator", None)
            .await
            .expect_err("unknown server should reject calls");
        assert!(matches!(err, ToolCallError::ConnectionNotFound { .. }));
    }

    #[tokio::test]
    async fn restart_requires_a_known_connection() {
        let mut manager = ConnectionManager::new();
        let err = manager
            .restart("ghost")
            .await
            .expect_err("unknown name should fail");
        assert!(matches!(err, RestartError::NoSuchConnection { .. }));
    }

    #[tokio::test]
    async fn availability_requires_a_connected_server_with_resources() {
        let mut manager = ConnectionManager::new();
        assert!(!manager.check_resource_availability());

        let mut desired = HashMap::new();
        desired.insert("alpha".to_string(), stdio_config_without_command());
        manager.reconcile(&desired).await;

        assert!(!manager.check_resource_availability());
    }
}
