//! Scoped integration workspaces
//!
//! Every integration attempt gets a fresh directory under a shared base
//! directory. The [`Workspace`] guard owns that directory and removes it
//! when dropped, so teardown happens on error propagation, panic unwinding
//! and task cancellation. Jobs that finish normally close it explicitly on
//! the blocking pool instead.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory name under the system temp dir used when none is configured
const DEFAULT_DIR_NAME: &str = "reviewit";

/// Allocates workspaces under a base directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new(Self::default_base_dir())
    }
}

impl WorkspaceManager {
    /// Manager rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<system temp>/reviewit`
    pub fn default_base_dir() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_DIR_NAME)
    }

    /// Shared base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create a fresh, empty workspace for `patch_id`
    pub async fn provision(&self, patch_id: u64) -> Result<Workspace> {
        let name = format!("patch{patch_id}_{}", Uuid::new_v4().simple());
        let path = self.base_dir.join(&name);

        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "workspace provisioned");

        Ok(Workspace {
            base_dir: self.base_dir.clone(),
            name,
            path,
            removed: false,
        })
    }
}

/// An integration workspace directory, removed on drop
#[derive(Debug)]
pub struct Workspace {
    base_dir: PathBuf,
    name: String,
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Full path of the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name relative to [`base_dir`](Self::base_dir)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared base directory the workspace lives in
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Remove the workspace now, reporting failures
    pub fn close(mut self) -> Result<()> {
        self.removed = true;
        remove(&self.path)?;
        debug!(path = %self.path.display(), "workspace removed");
        Ok(())
    }

    /// [`close`](Self::close) on the blocking thread pool
    pub async fn close_async(self) -> Result<()> {
        tokio::task::spawn_blocking(move || self.close())
            .await
            .map_err(|e| Error::Internal(format!("workspace removal task failed: {e}")))?
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match remove(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "workspace removed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove workspace"),
        }
    }
}

fn remove(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
