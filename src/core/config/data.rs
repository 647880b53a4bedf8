use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One provider entry in the `[mcp.servers.<name>]` table.
///
/// The `type` field selects the transport: `"stdio"` entries spawn `command`
/// with optional `args`/`env`/`cwd`, `"sse"` entries post to `url`. Configs
/// are compared structurally during reconciliation, so field order in the
/// source document never matters.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(rename = "type")]
    pub transport: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<HashMap<String, String>>,
    #[serde(alias = "workingDir")]
    pub cwd: Option<String>,
    pub url: Option<String>,
    /// Per-call timeout in milliseconds, overriding the built-in default.
    #[serde(alias = "timeoutInMillis")]
    pub timeout: Option<u64>,
    pub disabled: Option<bool>,
}

impl ServerConfig {
    pub fn is_enabled(&self) -> bool {
        !self.disabled.unwrap_or(false)
    }

    /// Effective per-call timeout for this server, if configured.
    pub fn timeout_millis(&self) -> Option<u64> {
        self.timeout
    }
}

/// The `[mcp]` section: desired provider set, keyed by connection name.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_field_aliases() {
        let config: ServerConfig = toml::from_str(
            r#"
            type = "stdio"
            command = "provider"
            workingDir = "/srv/provider"
            timeoutInMillis = 1500
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.cwd.as_deref(), Some("/srv/provider"));
        assert_eq!(config.timeout_millis(), Some(1500));
    }

    #[test]
    fn structural_equality_ignores_field_order() {
        let a: ServerConfig = toml::from_str(
            r#"
            command = "provider"
            type = "stdio"
            args = ["--serve"]
            "#,
        )
        .expect("config should parse");
        let b: ServerConfig = toml::from_str(
            r#"
            args = ["--serve"]
            type = "stdio"
            command = "provider"
            "#,
        )
        .expect("config should parse");

        assert_eq!(a, b);
    }

    #[test]
    fn disabled_defaults_to_enabled() {
        let config = ServerConfig::default();
        assert!(config.is_enabled());

        let config = ServerConfig {
            disabled: Some(true),
            ..ServerConfig::default()
        };
        assert!(!config.is_enabled());
    }
}
