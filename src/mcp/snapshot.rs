//! Read-only provider snapshots.
//!
//! Selection prompts need a stable picture of what is currently callable.
//! A snapshot copies each connection's status and capability lists at capture
//! time; later status flips never mutate an existing snapshot. Servers are
//! keyed in a sorted map so renderings are deterministic.

use crate::mcp::connection::ConnectionStatus;
use crate::mcp::manager::ConnectionManager;
use crate::mcp::types::{ResourceDescriptor, ToolDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One server's capabilities as of capture time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub status: ConnectionStatus,
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderSnapshot {
    pub servers: BTreeMap<String, ServerSnapshot>,
}

impl ProviderSnapshot {
    /// Copies every connection's state out of the manager.
    pub fn capture(manager: &ConnectionManager) -> Self {
        let servers = manager
            .connections()
            .iter()
            .map(|(name, connection)| {
                let snapshot = ServerSnapshot {
                    status: connection.status(),
                    tools: connection.tools.clone(),
                    resources: connection.resources.clone(),
                };
                (name.clone(), snapshot)
            })
            .collect();
        ProviderSnapshot { servers }
    }

    fn connected(&self) -> impl Iterator<Item = (&String, &ServerSnapshot)> {
        self.servers
            .iter()
            .filter(|(_, server)| server.status == ConnectionStatus::Connected)
    }

    /// Flattened rendering of every connected server's resources, one block
    /// per server, for embedding in a selection prompt.
    pub fn resource_text(&self) -> String {
        let mut text = String::new();
        for (name, server) in self.connected() {
            let _ = writeln!(text, "Server '{}' ({}):", name, server.status);
            if server.resources.is_empty() {
                text.push_str("  (no resources)\n");
                continue;
            }
            for resource in &server.resources {
                let _ = writeln!(text, "- uri: {}", resource.uri);
                let _ = writeln!(text, "  name: {}", resource.name);
                if let Some(description) = &resource.description {
                    let _ = writeln!(text, "  description: {}", description);
                }
                if let Some(mime_type) = &resource.mime_type {
                    let _ = writeln!(text, "  mimeType: {}", mime_type);
                }
            }
        }
        if text.is_empty() {
            text.push_str("No connected servers.\n");
        }
        text
    }

    /// Flattened rendering of every connected server's tools.
    pub fn tool_text(&self) -> String {
        let mut text = String::new();
        for (name, server) in self.connected() {
            let _ = writeln!(text, "Server '{}' ({}):", name, server.status);
            if server.tools.is_empty() {
                text.push_str("  (no tools)\n");
                continue;
            }
            for tool in &server.tools {
                let _ = writeln!(text, "- tool: {}", tool.name);
                if let Some(description) = &tool.description {
                    let _ = writeln!(text, "  description: {}", description);
                }
            }
        }
        if text.is_empty() {
            text.push_str("No connected servers.\n");
        }
        text
    }
}
