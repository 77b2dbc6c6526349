//! TOML file-backed store in `<data_dir>/reviewit.toml`.

use super::{Connection, Mutation, Store, Update};
use crate::error::{Error, Result};
use crate::lifecycle;
use crate::types::{
    MergeRequest, MergeRequestFilter, MergeRequestStatus, NewMergeRequest, NewPatch, NewProject,
    Project, User,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Current on-disk format version
pub const STORE_VERSION: u32 = 1;

/// Filename for store state.
const STORE_FILE: &str = "reviewit.toml";

/// Everything the store persists
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreState {
    version: u32,
    #[serde(default)]
    last_user_id: u64,
    #[serde(default)]
    last_project_id: u64,
    #[serde(default)]
    last_merge_request_id: u64,
    #[serde(default)]
    last_patch_id: u64,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    merge_requests: Vec<MergeRequest>,
}

impl StoreState {
    const fn new() -> Self {
        Self {
            version: STORE_VERSION,
            last_user_id: 0,
            last_project_id: 0,
            last_merge_request_id: 0,
            last_patch_id: 0,
            users: Vec::new(),
            projects: Vec::new(),
            merge_requests: Vec::new(),
        }
    }

    fn next_patch_id(&mut self) -> u64 {
        self.last_patch_id += 1;
        self.last_patch_id
    }

    fn project(&self, id: u64) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project #{id}")))
    }

    fn merge_request_mut(&mut self, id: u64) -> Result<&mut MergeRequest> {
        self.merge_requests
            .iter_mut()
            .find(|mr| mr.id == id)
            .ok_or_else(|| Error::NotFound(format!("merge request #{id}")))
    }
}

struct Shared {
    path: PathBuf,
    lock: Mutex<()>,
    open_connections: AtomicUsize,
}

/// Store keeping all state in a single TOML file
///
/// Writers are serialized by an in-process lock; the file is rewritten
/// atomically (write to a sibling, then rename).
#[derive(Clone)]
pub struct FileStore {
    shared: Arc<Shared>,
}

impl FileStore {
    /// Store rooted at `data_dir`. The directory is created on first write.
    pub fn open(data_dir: &Path) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: data_dir.join(STORE_FILE),
                lock: Mutex::new(()),
                open_connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Number of connections not yet released
    pub fn open_connections(&self) -> usize {
        self.shared.open_connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for FileStore {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let open = self.shared.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(open, "store connection opened");
        Ok(Box::new(FileConnection {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FileConnection {
    shared: Arc<Shared>,
}

impl Drop for FileConnection {
    fn drop(&mut self) {
        let open = self.shared.open_connections.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(open, "store connection released");
    }
}

impl FileConnection {
    /// Load state from disk.
    ///
    /// Returns an empty state if the file doesn't exist.
    async fn load(&self) -> Result<StoreState> {
        let path = &self.shared.path;
        if !tokio::fs::try_exists(path).await? {
            return Ok(StoreState::new());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Store(format!("failed to read {}: {e}", path.display())))?;

        let state: StoreState = toml::from_str(&content)
            .map_err(|e| Error::Store(format!("failed to parse {}: {e}", path.display())))?;

        if state.version > STORE_VERSION {
            return Err(Error::Store(format!(
                "{} has format version {}, this build understands up to {STORE_VERSION}",
                path.display(),
                state.version
            )));
        }
        Ok(state)
    }

    /// Save state to disk.
    ///
    /// Creates the data directory if it doesn't exist.
    async fn save(&self, state: &StoreState) -> Result<()> {
        let path = &self.shared.path;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::Store(format!("failed to create {}: {e}", dir.display())))?;
        }

        let mut state_to_save = state.clone();
        state_to_save.version = STORE_VERSION;

        let content = toml::to_string_pretty(&state_to_save)
            .map_err(|e| Error::Store(format!("failed to serialize store state: {e}")))?;

        let content_with_header = format!(
            "# reviewit store\n# Auto-generated - manual edits may be overwritten\n\n{content}"
        );

        let tmp = path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, content_with_header)
            .await
            .map_err(|e| Error::Store(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| Error::Store(format!("failed to replace {}: {e}", path.display())))?;

        Ok(())
    }

    /// Read the state; never writes
    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> Result<T> + Send) -> Result<T> {
        let _guard = self.shared.lock.lock().await;
        let state = self.load().await?;
        f(&state)
    }

    /// Load, modify, and save the state under the writer lock.
    ///
    /// `f` returns its result plus whether the state must be written.
    async fn transact<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<(T, bool)> + Send,
    ) -> Result<T> {
        let _guard = self.shared.lock.lock().await;
        let mut state = self.load().await?;
        let (value, dirty) = f(&mut state)?;
        if dirty {
            self.save(&state).await?;
        }
        Ok(value)
    }
}

#[async_trait]
impl Connection for FileConnection {
    async fn load_user(&self, id: u64) -> Result<User> {
        self.read(|state| {
            state
                .users
                .iter()
                .find(|u| u.id == id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("user #{id}")))
        })
        .await
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.read(|state| Ok(state.users.iter().find(|u| u.api_token == token).cloned()))
            .await
    }

    async fn create_user(&self, name: &str, email: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(Error::validation("name", "can't be blank"));
        }
        if email.trim().is_empty() {
            return Err(Error::validation("email", "can't be blank"));
        }
        self.transact(|state| {
            state.last_user_id += 1;
            let user = User {
                id: state.last_user_id,
                name: name.to_string(),
                email: email.to_string(),
                api_token: Uuid::new_v4().simple().to_string(),
            };
            state.users.push(user.clone());
            debug!(user_id = user.id, "user created");
            Ok((user, true))
        })
        .await
    }

    async fn load_project(&self, id: u64) -> Result<Project> {
        self.read(|state| state.project(id).cloned()).await
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(Error::validation("name", "can't be blank"));
        }
        if project.repository_url.trim().is_empty() {
            return Err(Error::validation("repository_url", "can't be blank"));
        }
        self.transact(|state| {
            state.last_project_id += 1;
            let created = Project {
                id: state.last_project_id,
                name: project.name,
                repository_url: project.repository_url,
                ci_token: project.ci_token,
                ci_project_url: project.ci_project_url,
                members: Vec::new(),
            };
            state.projects.push(created.clone());
            debug!(project_id = created.id, "project created");
            Ok((created, true))
        })
        .await
    }

    async fn add_project_member(&self, project_id: u64, user_id: u64) -> Result<Project> {
        self.transact(|state| {
            if !state.users.iter().any(|u| u.id == user_id) {
                return Err(Error::NotFound(format!("user #{user_id}")));
            }
            let project = state
                .projects
                .iter_mut()
                .find(|p| p.id == project_id)
                .ok_or_else(|| Error::NotFound(format!("project #{project_id}")))?;
            let added = !project.is_member(user_id);
            if added {
                project.members.push(user_id);
            }
            Ok((project.clone(), added))
        })
        .await
    }

    async fn load_merge_request(&self, id: u64) -> Result<MergeRequest> {
        self.read(|state| {
            state
                .merge_requests
                .iter()
                .find(|mr| mr.id == id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("merge request #{id}")))
        })
        .await
    }

    async fn list_merge_requests(
        &self,
        project_id: u64,
        filter: MergeRequestFilter,
    ) -> Result<Vec<MergeRequest>> {
        self.read(|state| {
            state.project(project_id)?;
            Ok(state
                .merge_requests
                .iter()
                .filter(|mr| mr.project_id == project_id)
                .filter(|mr| match filter {
                    MergeRequestFilter::All => true,
                    MergeRequestFilter::Pending => !mr.status.is_closed(),
                    MergeRequestFilter::Closed => mr.status.is_closed(),
                })
                .cloned()
                .collect())
        })
        .await
    }

    async fn create_merge_request(&self, new: NewMergeRequest) -> Result<MergeRequest> {
        self.transact(|state| {
            state.project(new.project_id)?;
            let now = Utc::now();
            let patch_id = state.next_patch_id();
            let mr = MergeRequest {
                id: state.last_merge_request_id + 1,
                project_id: new.project_id,
                subject: new.subject,
                target_branch: new.target_branch,
                status: MergeRequestStatus::Open,
                author: new.author,
                reviewer: None,
                patches: vec![lifecycle::new_patch(patch_id, new.patch, now)],
                history: Vec::new(),
            };
            lifecycle::validate(&mr)?;
            state.last_merge_request_id = mr.id;
            state.merge_requests.push(mr.clone());
            debug!(mr_id = mr.id, "merge request created");
            Ok((mr, true))
        })
        .await
    }

    async fn add_patch(&self, mr_id: u64, patch: NewPatch) -> Result<MergeRequest> {
        self.transact(|state| {
            let patch_id = state.last_patch_id + 1;
            let mr = state.merge_request_mut(mr_id)?;
            lifecycle::add_patch(mr, patch_id, patch, Utc::now())?;
            lifecycle::validate(mr)?;
            let updated = mr.clone();
            state.last_patch_id = patch_id;
            debug!(mr_id, patch_id, "patch added");
            Ok((updated, true))
        })
        .await
    }

    async fn update_merge_request(&self, id: u64, mutation: Mutation) -> Result<Update> {
        self.transact(|state| {
            let mr = state.merge_request_mut(id)?;
            let mut candidate = mr.clone();
            let changed = mutation(&mut candidate)?;
            if changed {
                lifecycle::validate(&candidate)?;
                *mr = candidate.clone();
                debug!(mr_id = id, status = %candidate.status, "merge request updated");
            }
            Ok((
                Update {
                    merge_request: candidate,
                    changed,
                },
                changed,
            ))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mutation;
    use crate::types::Identity;
    use tempfile::TempDir;

    async fn seeded(temp: &TempDir) -> (FileStore, User, Project) {
        let store = FileStore::open(temp.path());
        let conn = store.connect().await.unwrap();
        let user = conn.create_user("Alice", "alice@example.com").await.unwrap();
        let project = conn
            .create_project(NewProject {
                name: "widgets".to_string(),
                repository_url: "git@example.com:widgets.git".to_string(),
                ..NewProject::default()
            })
            .await
            .unwrap();
        (store, user, project)
    }

    fn new_mr(project_id: u64, author: Identity) -> NewMergeRequest {
        NewMergeRequest {
            project_id,
            subject: "Fix the widget".to_string(),
            target_branch: "master".to_string(),
            author,
            patch: NewPatch {
                commit_message: "Fix the widget".to_string(),
                diff: "--- a\n+++ b\n".to_string(),
                ..NewPatch::default()
            },
        }
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_not_found() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path());
        let conn = store.connect().await.unwrap();

        assert!(matches!(
            conn.load_merge_request(1).await,
            Err(Error::NotFound(_))
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("data");
        let store = FileStore::open(&data_dir);
        assert!(!data_dir.exists());

        let conn = store.connect().await.unwrap();
        conn.create_user("Alice", "alice@example.com").await.unwrap();

        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_file_contains_header_comment() {
        let temp = TempDir::new().unwrap();
        let (store, _, _) = seeded(&temp).await;

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("# reviewit store"));
        assert!(content.contains("Auto-generated"));
    }

    #[tokio::test]
    async fn test_roundtrip_merge_request() {
        let temp = TempDir::new().unwrap();
        let (store, user, project) = seeded(&temp).await;
        let conn = store.connect().await.unwrap();

        let created = conn
            .create_merge_request(new_mr(project.id, user.identity()))
            .await
            .unwrap();
        let with_patch = conn
            .add_patch(
                created.id,
                NewPatch {
                    commit_message: "Fix the widget\n\nSecond try".to_string(),
                    diff: "--- a\n+++ b\n@@ -1 +1 @@\n-x\n+y\n".to_string(),
                    linter_ok: true,
                    ..NewPatch::default()
                },
            )
            .await
            .unwrap();

        let reopened = FileStore::open(temp.path());
        let loaded = reopened
            .connect()
            .await
            .unwrap()
            .load_merge_request(created.id)
            .await
            .unwrap();

        assert_eq!(loaded, with_patch);
        assert_eq!(loaded.patches.len(), 2);
        assert_ne!(loaded.patches[0].id, loaded.patches[1].id);
        assert!(loaded.patches[1].linter_ok);
        assert_eq!(loaded.history.len(), 1);
    }

    #[tokio::test]
    async fn test_tokens_are_unique_and_resolvable() {
        let temp = TempDir::new().unwrap();
        let (store, alice, _) = seeded(&temp).await;
        let conn = store.connect().await.unwrap();
        let bob = conn.create_user("Bob", "bob@example.com").await.unwrap();

        assert_ne!(alice.api_token, bob.api_token);
        let found = conn.find_user_by_token(&bob.api_token).await.unwrap();
        assert_eq!(found, Some(bob));
        assert_eq!(conn.find_user_by_token("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_skips_write_when_unchanged() {
        let temp = TempDir::new().unwrap();
        let (store, user, project) = seeded(&temp).await;
        let conn = store.connect().await.unwrap();
        let mr = conn
            .create_merge_request(new_mr(project.id, user.identity()))
            .await
            .unwrap();

        let update = conn
            .update_merge_request(
                mr.id,
                mutation(|mr| {
                    mr.subject = "scratch edit".to_string();
                    Ok(false)
                }),
            )
            .await
            .unwrap();

        assert!(!update.changed);
        let loaded = conn.load_merge_request(mr.id).await.unwrap();
        assert_eq!(loaded.subject, "Fix the widget");
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_result() {
        let temp = TempDir::new().unwrap();
        let (store, user, project) = seeded(&temp).await;
        let conn = store.connect().await.unwrap();
        let mr = conn
            .create_merge_request(new_mr(project.id, user.identity()))
            .await
            .unwrap();

        let author = user.identity();
        let result = conn
            .update_merge_request(
                mr.id,
                mutation(move |mr| {
                    mr.reviewer = Some(author);
                    Ok(true)
                }),
            )
            .await;

        assert!(matches!(
            result,
            Err(Error::Validation {
                field: "reviewer",
                ..
            })
        ));
        let loaded = conn.load_merge_request(mr.id).await.unwrap();
        assert!(loaded.reviewer.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_pending_and_closed() {
        let temp = TempDir::new().unwrap();
        let (store, user, project) = seeded(&temp).await;
        let conn = store.connect().await.unwrap();
        let open = conn
            .create_merge_request(new_mr(project.id, user.identity()))
            .await
            .unwrap();
        let closed = conn
            .create_merge_request(new_mr(project.id, user.identity()))
            .await
            .unwrap();
        conn.update_merge_request(
            closed.id,
            mutation(|mr| {
                mr.status = MergeRequestStatus::Abandoned;
                Ok(true)
            }),
        )
        .await
        .unwrap();

        let pending = conn
            .list_merge_requests(project.id, MergeRequestFilter::Pending)
            .await
            .unwrap();
        let done = conn
            .list_merge_requests(project.id, MergeRequestFilter::Closed)
            .await
            .unwrap();

        assert_eq!(pending.iter().map(|mr| mr.id).collect::<Vec<_>>(), [open.id]);
        assert_eq!(done.iter().map(|mr| mr.id).collect::<Vec<_>>(), [closed.id]);
    }

    #[tokio::test]
    async fn test_create_merge_request_requires_project() {
        let temp = TempDir::new().unwrap();
        let (store, user, _) = seeded(&temp).await;
        let conn = store.connect().await.unwrap();

        let result = conn.create_merge_request(new_mr(99, user.identity())).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_connections_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path());

        let a = store.connect().await.unwrap();
        let b = store.connect().await.unwrap();
        assert_eq!(store.open_connections(), 2);

        drop(a);
        assert_eq!(store.open_connections(), 1);
        drop(b);
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_newer_format_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path());
        std::fs::write(store.path(), "version = 99\n").unwrap();

        let conn = store.connect().await.unwrap();
        assert!(matches!(conn.load_user(1).await, Err(Error::Store(_))));
    }
}
