pub mod data;
pub mod io;

pub use data::{Config, McpConfig, ServerConfig};
pub use io::ConfigError;
