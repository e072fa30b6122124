//! Configuration loaded from `gqlscope.toml`.
//!
//! Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! endpoint_marker = "/graphql"
//! extract_mode = "structural"
//! state_dir = ".gqlscope"
//! log_filter = "gqlscope=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{GqlScopeError, Result};
use crate::extract::ExtractMode;

/// File name looked up by [`Config::load_or_default`].
pub const CONFIG_FILE: &str = "gqlscope.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Substring the URL path must contain (compared case-insensitively).
    pub endpoint_marker: String,
    pub extract_mode: ExtractMode,
    /// Directory holding the daemon socket and PID file.
    pub state_dir: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_marker: "/graphql".to_string(),
            extract_mode: ExtractMode::Textual,
            state_dir: PathBuf::from(".gqlscope"),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::parse(&text)
            .map_err(|e| GqlScopeError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load `<root>/gqlscope.toml` if it exists, else the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(text)?;
        if config.endpoint_marker.is_empty() {
            config.endpoint_marker = Config::default().endpoint_marker;
        }
        Ok(config)
    }

    /// Socket path for the feed daemon, resolved against `root`.
    pub fn socket_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_dir).join("gqlscope.sock")
    }

    pub fn pid_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_dir).join("daemon.pid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.endpoint_marker, "/graphql");
        assert_eq!(config.extract_mode, ExtractMode::Textual);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
extract_mode = "structural"
log_filter = "gqlscope=debug"
"#,
        )
        .unwrap();
        assert_eq!(config.extract_mode, ExtractMode::Structural);
        assert_eq!(config.log_filter, "gqlscope=debug");
        assert_eq!(config.state_dir, PathBuf::from(".gqlscope"));
    }

    #[test]
    fn test_blank_marker_falls_back() {
        let config = Config::parse(r#"endpoint_marker = """#).unwrap();
        assert_eq!(config.endpoint_marker, "/graphql");
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config, Config::default());

        fs::write(dir.path().join(CONFIG_FILE), "endpoint_marker = \"/api/gql\"\n").unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.endpoint_marker, "/api/gql");
        assert_eq!(
            config.socket_path(dir.path()),
            dir.path().join(".gqlscope").join("gqlscope.sock")
        );
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "extract_mode = \"psychic\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, GqlScopeError::Config(_)), "got: {:?}", err);
    }
}
