//! Per-provider connection state.
//!
//! A [`Connection`] owns the protocol client for one configured server along
//! with the capability listings fetched after the handshake. Liveness lives in
//! a [`SharedHealth`] cell so transport tasks can flip it when the underlying
//! channel dies without holding a reference to the connection itself.

use crate::core::config::ServerConfig;
use crate::mcp::client::McpClient;
use crate::mcp::types::{ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle state of one provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        write!(f, "{}", label)
    }
}

struct HealthState {
    status: ConnectionStatus,
    error: String,
}

/// Handle to the live status of a connection, cloned into transport tasks.
///
/// Errors accumulate across a connection's lifetime so a disconnect caused by
/// several failures reports all of them, matching how process exit and read
/// errors can land in either order.
#[derive(Clone)]
pub struct SharedHealth {
    inner: Arc<Mutex<HealthState>>,
}

impl SharedHealth {
    pub fn new(status: ConnectionStatus) -> Self {
        SharedHealth {
            inner: Arc::new(Mutex::new(HealthState {
                status,
                error: String::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.lock().status = status;
    }

    /// Appends to the accumulated error text without touching the status.
    pub fn record_error(&self, message: &str) {
        if message.is_empty() {
            return;
        }
        let mut state = self.lock();
        if !state.error.is_empty() {
            state.error.push('\n');
        }
        state.error.push_str(message);
    }

    /// Flips the connection to disconnected and records why.
    pub fn mark_disconnected(&self, message: &str) {
        {
            let mut state = self.lock();
            state.status = ConnectionStatus::Disconnected;
        }
        self.record_error(message);
    }

    pub fn error(&self) -> Option<String> {
        let state = self.lock();
        if state.error.is_empty() {
            None
        } else {
            Some(state.error.clone())
        }
    }

    pub fn clear_error(&self) {
        self.lock().error.clear();
    }
}

impl fmt::Debug for SharedHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SharedHealth")
            .field("status", &state.status)
            .field("error", &state.error)
            .finish()
    }
}

/// One configured provider and everything learned from it.
pub struct Connection {
    pub name: String,
    pub config: ServerConfig,
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub resource_templates: Vec<ResourceTemplateDescriptor>,
    health: SharedHealth,
    pub(crate) client: Option<McpClient>,
}

impl Connection {
    /// Creates an unconnected entry for a configured server.
    pub fn new(name: &str, config: ServerConfig) -> Self {
        Connection {
            name: name.to_string(),
            config,
            tools: Vec::new(),
            resources: Vec::new(),
            resource_templates: Vec::new(),
            health: SharedHealth::new(ConnectionStatus::Disconnected),
            client: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.health.status()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn last_error(&self) -> Option<String> {
        self.health.error()
    }

    pub fn health(&self) -> SharedHealth {
        self.health.clone()
    }

    /// Drops capability listings and the client, keeping the config so the
    /// entry can reconnect later.
    pub fn clear_runtime_state(&mut self) {
        self.tools.clear();
        self.resources.clear();
        self.resource_templates.clear();
        self.client = None;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .field("resource_templates", &self.resource_templates.len())
            .finish()
    }
}
