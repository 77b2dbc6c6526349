//! Configuration
//!
//! Read from TOML. Every key is optional:
//!
//! ```toml
//! data_dir = "/var/lib/reviewit"
//! workspace_dir = "/tmp/reviewit"
//! default_target_branch = "master"
//! push_ref = "master"
//! ci_timeout_secs = 2
//! expected_client_version = "0.1.0"
//! ```

use crate::ci::DEFAULT_TIMEOUT;
use crate::error::{Error, Result};
use crate::integration::{DEFAULT_PUSH_REF, WorkspaceManager};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR: &str = "reviewit";
const CONFIG_FILE: &str = "config.toml";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the store file
    pub data_dir: PathBuf,
    /// Base directory for integration workspaces
    pub workspace_dir: PathBuf,
    /// Target branch for new merge requests
    pub default_target_branch: String,
    /// Local ref pushed after a patch is applied
    pub push_ref: String,
    /// CI status query timeout, in seconds
    pub ci_timeout_secs: u64,
    /// Client version the server accepts
    pub expected_client_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR),
            workspace_dir: WorkspaceManager::default_base_dir(),
            default_target_branch: "master".to_string(),
            push_ref: DEFAULT_PUSH_REF.to_string(),
            ci_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            expected_client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded config");
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        if config.default_target_branch.trim().is_empty() {
            return Err(Error::Config(
                "default_target_branch can't be blank".to_string(),
            ));
        }
        if config.push_ref.trim().is_empty() {
            return Err(Error::Config("push_ref can't be blank".to_string()));
        }
        Ok(config)
    }

    /// CI status query timeout
    pub const fn ci_timeout(&self) -> Duration {
        Duration::from_secs(self.ci_timeout_secs)
    }

    /// Workspace manager rooted at `workspace_dir`
    pub fn workspace_manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(&self.workspace_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_target_branch, "master");
        assert_eq!(config.push_ref, "master");
        assert_eq!(config.ci_timeout(), Duration::from_secs(2));
        assert_eq!(config.expected_client_version, env!("CARGO_PKG_VERSION"));
        assert!(config.data_dir.ends_with("reviewit"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("push_ref = \"HEAD\"\nci_timeout_secs = 5\n").unwrap();
        assert_eq!(config.push_ref, "HEAD");
        assert_eq!(config.ci_timeout_secs, 5);
        assert_eq!(config.default_target_branch, "master");
    }

    #[test]
    fn test_blank_branch_rejected() {
        let result = Config::from_toml("default_target_branch = \"  \"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = Config::from_toml("ci_timeout_secs = \"soon\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workspace_dir = \"/srv/ws\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.workspace_dir, PathBuf::from("/srv/ws"));
        assert_eq!(
            config.workspace_manager().base_dir(),
            Path::new("/srv/ws")
        );
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
