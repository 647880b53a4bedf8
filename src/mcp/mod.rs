//! MCP connection and capability management.
//!
//! [`manager::ConnectionManager`] owns the live connection set and reconciles
//! it against configuration. Capabilities discovered at connect time flow
//! through [`synthetic`] so every tool is also addressable as a resource, and
//! [`router::read_resource`] serves the resulting URIs. [`snapshot`] exposes
//! the whole picture read-only for the selection layer.

pub(crate) mod capabilities;
pub(crate) mod client;
pub mod connection;
pub mod error;
pub mod manager;
pub mod router;
pub mod snapshot;
pub mod synthetic;
pub(crate) mod transport;
pub mod types;

pub use connection::{Connection, ConnectionStatus};
pub use error::{ConnectError, ResourceReadError, RestartError, ToolCallError};
pub use manager::{ConnectionManager, ManagerReadiness};
pub use router::read_resource;
pub use snapshot::{ProviderSnapshot, ServerSnapshot};
pub use synthetic::{CALCULATOR_SYNTHETIC_URI, WEATHER_SYNTHETIC_PREFIX, WEATHER_SYNTHETIC_URI};
