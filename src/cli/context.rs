//! Shared command context for CLI commands
//!
//! Loads configuration, opens the store, and wires the orchestrator the same
//! way for every subcommand.

use reviewit::auth::authenticate;
use reviewit::config::Config;
use reviewit::error::{Error, Result};
use reviewit::integration::{Orchestrator, ProcessRunner};
use reviewit::store::{Connection, FileStore, Store};
use reviewit::types::{MergeRequest, Project, User};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Version this client reports when authenticating
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared context for CLI commands
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// File-backed store
    pub store: Arc<FileStore>,
    /// Integration and CI push jobs
    pub orchestrator: Orchestrator,
}

/// The authenticated caller
pub struct Session {
    /// Acting user
    pub user: User,
    /// Project the command acts on
    pub project: Project,
}

impl CommandContext {
    /// Load config (overriding the data dir if given) and open the store
    pub fn new(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::load(config_path)?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }

        let store = Arc::new(FileStore::open(&config.data_dir));
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(ProcessRunner),
            config.workspace_manager(),
        )
        .with_push_ref(config.push_ref.clone());

        Ok(Self {
            config,
            store,
            orchestrator,
        })
    }

    /// Open a store connection
    pub async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.store.connect().await
    }

    /// Authenticate `token` against `project_id`
    pub async fn session(&self, token: Option<&str>, project_id: u64) -> Result<Session> {
        let token = token.ok_or_else(|| {
            Error::Authentication("No API token. Pass --token or set REVIEWIT_TOKEN.".to_string())
        })?;
        let conn = self.connect().await?;
        let (user, project) = authenticate(
            conn.as_ref(),
            token,
            CLIENT_VERSION,
            &self.config.expected_client_version,
            project_id,
        )
        .await?;
        Ok(Session { user, project })
    }

    /// Load a merge request and authenticate against its project
    pub async fn merge_request_session(
        &self,
        token: Option<&str>,
        mr_id: u64,
    ) -> Result<(Session, MergeRequest)> {
        let mr = self.connect().await?.load_merge_request(mr_id).await?;
        let session = self.session(token, mr.project_id).await?;
        Ok((session, mr))
    }
}
