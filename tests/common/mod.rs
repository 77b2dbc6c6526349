//! Shared test fixtures

#![allow(dead_code)]

mod fake_runner;
mod flaky_store;

pub use fake_runner::{FAKE_HEAD, FakeRunner};
pub use flaky_store::FlakyStore;

use chrono::{TimeZone, Utc};
use reviewit::integration::{Orchestrator, WorkspaceManager};
use reviewit::store::{Connection, FileStore, Store};
use reviewit::types::{
    Identity, MergeRequest, MergeRequestStatus, NewMergeRequest, NewPatch, NewProject, Patch,
    Project, User,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Identity fixture
pub fn identity(id: u64, name: &str, email: &str) -> Identity {
    Identity {
        id,
        name: name.to_string(),
        email: email.to_string(),
    }
}

/// Patch fixture with a fixed timestamp (2024-01-02 03:04:05 UTC)
pub fn make_patch(id: u64, commit_message: &str, diff: &str) -> Patch {
    Patch {
        id,
        commit_message: commit_message.to_string(),
        diff: diff.to_string(),
        description: String::new(),
        linter_ok: true,
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        integration_log: String::new(),
        ci_reference_hash: None,
    }
}

/// Open merge request fixture by `author` with the given patches
pub fn make_merge_request(id: u64, author: Identity, patches: Vec<Patch>) -> MergeRequest {
    MergeRequest {
        id,
        project_id: 1,
        subject: "Fix bug".to_string(),
        target_branch: "master".to_string(),
        status: MergeRequestStatus::Open,
        author,
        reviewer: None,
        patches,
        history: Vec::new(),
    }
}

/// Patch data for a new submission
pub fn new_patch(commit_message: &str) -> NewPatch {
    NewPatch {
        commit_message: commit_message.to_string(),
        diff: "--- a/file\n+++ b/file\n@@ -1 +1 @@\n-old\n+new\n".to_string(),
        description: String::new(),
        linter_ok: true,
    }
}

/// A seeded store plus an orchestrator driving a [`FakeRunner`]
pub struct TestEnv {
    pub dir: TempDir,
    pub store: Arc<FileStore>,
    pub runner: Arc<FakeRunner>,
    pub orchestrator: Orchestrator,
    pub author: User,
    pub reviewer: User,
    pub project: Project,
}

impl TestEnv {
    /// Store with an author, a reviewer, and a project both can access
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(&dir.path().join("data")));
        let runner = Arc::new(FakeRunner::new());
        let orchestrator = Orchestrator::new(
            store.clone(),
            runner.clone(),
            WorkspaceManager::new(dir.path().join("workspaces")),
        );

        let (author, reviewer, project) = {
            let conn = store.connect().await.unwrap();
            let author = conn.create_user("Alice", "alice@example.com").await.unwrap();
            let reviewer = conn.create_user("Bob", "bob@example.com").await.unwrap();
            let project = conn
                .create_project(NewProject {
                    name: "widgets".to_string(),
                    repository_url: "https://git.example.com/widgets.git".to_string(),
                    ..NewProject::default()
                })
                .await
                .unwrap();
            conn.add_project_member(project.id, author.id).await.unwrap();
            let project = conn.add_project_member(project.id, reviewer.id).await.unwrap();
            (author, reviewer, project)
        };

        Self {
            dir,
            store,
            runner,
            orchestrator,
            author,
            reviewer,
            project,
        }
    }

    /// Connect to the store
    pub async fn connect(&self) -> Box<dyn Connection> {
        self.store.connect().await.unwrap()
    }

    /// Create an open merge request by the author
    pub async fn submit(&self, subject: &str) -> MergeRequest {
        self.connect()
            .await
            .create_merge_request(NewMergeRequest {
                project_id: self.project.id,
                subject: subject.to_string(),
                target_branch: "master".to_string(),
                author: self.author.identity(),
                patch: new_patch(subject),
            })
            .await
            .unwrap()
    }

    /// Reload a merge request
    pub async fn reload(&self, id: u64) -> MergeRequest {
        self.connect().await.load_merge_request(id).await.unwrap()
    }

    /// Workspace base directory
    pub fn workspace_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("workspaces")
    }
}

/// Run git in `dir`, asserting success, and return its raw stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?} failed: {output:?}");
    String::from_utf8(output.stdout).unwrap()
}

/// Fresh local repository with a committer identity configured
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["config", "user.name", "Alice"]);
    git(dir.path(), &["config", "user.email", "alice@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    dir
}

/// Number of entries in `dir` (0 if it doesn't exist)
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}
