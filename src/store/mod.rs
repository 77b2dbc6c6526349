//! Persistence seam
//!
//! The engine only needs simple load/save operations, expressed by the
//! [`Store`] and [`Connection`] traits. A connection is an owned handle:
//! each background job connects on its own and the handle is released
//! when dropped, on every exit path.

mod file;

pub use file::{FileStore, STORE_VERSION};

use crate::error::Result;
use crate::types::{
    MergeRequest, MergeRequestFilter, NewMergeRequest, NewPatch, NewProject, Project, User,
};
use async_trait::async_trait;

/// A state change applied atomically to one merge request.
///
/// Returns whether the request changed; unchanged requests are not
/// written back.
pub type Mutation = Box<dyn FnOnce(&mut MergeRequest) -> Result<bool> + Send>;

/// Box a closure as a [`Mutation`]
pub fn mutation<F>(f: F) -> Mutation
where
    F: FnOnce(&mut MergeRequest) -> Result<bool> + Send + 'static,
{
    Box::new(f)
}

/// Result of [`Connection::update_merge_request`]
#[derive(Debug, Clone)]
pub struct Update {
    /// The request after the mutation
    pub merge_request: MergeRequest,
    /// Whether the mutation changed (and saved) it
    pub changed: bool,
}

/// Source of store connections
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a connection. Dropping it releases it.
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// Load/save operations on one store connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Load a user by ID
    async fn load_user(&self, id: u64) -> Result<User>;

    /// Find the user owning an API token
    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>>;

    /// Create a user with a freshly generated API token
    async fn create_user(&self, name: &str, email: &str) -> Result<User>;

    /// Load a project by ID
    async fn load_project(&self, id: u64) -> Result<Project>;

    /// Create a project
    async fn create_project(&self, project: NewProject) -> Result<Project>;

    /// Grant a user access to a project
    async fn add_project_member(&self, project_id: u64, user_id: u64) -> Result<Project>;

    /// Load a merge request by ID
    async fn load_merge_request(&self, id: u64) -> Result<MergeRequest>;

    /// List a project's merge requests, oldest first
    async fn list_merge_requests(
        &self,
        project_id: u64,
        filter: MergeRequestFilter,
    ) -> Result<Vec<MergeRequest>>;

    /// Create a merge request with its first patch
    async fn create_merge_request(&self, new: NewMergeRequest) -> Result<MergeRequest>;

    /// Add a patch to an existing merge request
    async fn add_patch(&self, mr_id: u64, patch: NewPatch) -> Result<MergeRequest>;

    /// Apply `mutation` to the stored request as a single writer.
    ///
    /// The mutation sees the latest stored value. If it reports a change,
    /// the result is validated and saved before the store lock is released.
    async fn update_merge_request(&self, id: u64, mutation: Mutation) -> Result<Update>;
}
