//! Core types for reviewit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// User ID
    pub id: u64,
    /// Display name (used in patch headers)
    pub name: String,
    /// Email address (used in patch headers)
    pub email: String,
    /// Token the CLI authenticates with
    pub api_token: String,
}

impl User {
    /// Identity reference for this user
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Reference to a user as recorded on merge requests and history events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// User ID
    pub id: u64,
    /// Name at the time of recording
    pub name: String,
    /// Email at the time of recording
    pub email: String,
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A project whose repository receives integrated patches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Project ID
    pub id: u64,
    /// Project name
    pub name: String,
    /// Clone URL of the upstream repository
    pub repository_url: String,
    /// CI access token
    #[serde(default)]
    pub ci_token: Option<String>,
    /// CI project base URL
    #[serde(default)]
    pub ci_project_url: Option<String>,
    /// IDs of users with access to this project
    #[serde(default)]
    pub members: Vec<u64>,
}

impl Project {
    /// Whether both halves of the CI configuration are present
    pub fn has_ci(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.ci_token) && present(&self.ci_project_url)
    }

    /// Whether `user_id` may act on this project
    pub fn is_member(&self, user_id: u64) -> bool {
        self.members.contains(&user_id)
    }
}

/// Data for creating a project
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    /// Project name
    pub name: String,
    /// Clone URL of the upstream repository
    pub repository_url: String,
    /// CI access token
    pub ci_token: Option<String>,
    /// CI project base URL
    pub ci_project_url: Option<String>,
}

/// Merge request status
///
/// Variant order is significant: statuses at or past [`Accepted`] are
/// closed.
///
/// [`Accepted`]: MergeRequestStatus::Accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestStatus {
    /// Awaiting review
    Open,
    /// Accepted, integration job running
    Integrating,
    /// Integration failed; needs a new patch or another attempt
    NeedsRebase,
    /// Integrated upstream
    Accepted,
    /// Abandoned by a reviewer
    Abandoned,
}

impl std::fmt::Display for MergeRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Integrating => write!(f, "integrating"),
            Self::NeedsRebase => write!(f, "needs_rebase"),
            Self::Accepted => write!(f, "accepted"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// One version of the proposed change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patch {
    /// Patch ID (unique across the store)
    pub id: u64,
    /// Full commit message
    pub commit_message: String,
    /// Raw unified diff, never interpreted
    pub diff: String,
    /// Free-form description supplied with the update
    #[serde(default)]
    pub description: String,
    /// Whether the submitter's linter passed
    #[serde(default)]
    pub linter_ok: bool,
    /// When the patch was submitted
    pub created_at: DateTime<Utc>,
    /// Output of the latest integration attempt
    #[serde(default)]
    pub integration_log: String,
    /// Commit pushed to the CI branch for this patch
    #[serde(default)]
    pub ci_reference_hash: Option<String>,
}

/// Data for a new patch
#[derive(Debug, Clone, Default)]
pub struct NewPatch {
    /// Full commit message
    pub commit_message: String,
    /// Raw unified diff
    pub diff: String,
    /// Free-form description
    pub description: String,
    /// Whether the submitter's linter passed
    pub linter_ok: bool,
}

/// An entry in a merge request's audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEvent {
    /// Time of the event
    pub when: DateTime<Utc>,
    /// What happened, phrased to follow the actor's name
    pub description: String,
    /// Who did it
    pub actor: Identity,
}

/// A reviewable change proposal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeRequest {
    /// Merge request ID
    pub id: u64,
    /// Owning project
    pub project_id: u64,
    /// One-line summary
    pub subject: String,
    /// Branch the patch is integrated into
    pub target_branch: String,
    /// Current status
    pub status: MergeRequestStatus,
    /// Who submitted it
    pub author: Identity,
    /// Who accepted it
    #[serde(default)]
    pub reviewer: Option<Identity>,
    /// Patches in submission order; the last one is current
    #[serde(default)]
    pub patches: Vec<Patch>,
    /// Audit trail in chronological order
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
}

impl MergeRequest {
    /// The latest patch, if any
    pub fn current_patch(&self) -> Option<&Patch> {
        self.patches.last()
    }

    /// Mutable access to a patch by ID
    pub fn patch_mut(&mut self, patch_id: u64) -> Option<&mut Patch> {
        self.patches.iter_mut().find(|p| p.id == patch_id)
    }
}

/// Data for creating a merge request
#[derive(Debug, Clone)]
pub struct NewMergeRequest {
    /// Owning project
    pub project_id: u64,
    /// One-line summary
    pub subject: String,
    /// Branch to integrate into
    pub target_branch: String,
    /// Submitter
    pub author: Identity,
    /// First patch
    pub patch: NewPatch,
}

/// Which merge requests to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeRequestFilter {
    /// Everything
    #[default]
    All,
    /// Not yet closed
    Pending,
    /// Accepted or abandoned
    Closed,
}
