//! Status transitions (PURE - no I/O)

use super::history;
use crate::error::{Error, Result};
use crate::types::{Identity, MergeRequest, MergeRequestStatus, NewPatch, Patch};
use chrono::{DateTime, Utc};
use tracing::info;

/// How an integration attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// Patch applied and pushed
    Accepted,
    /// `git am` or `git push` failed
    NeedsRebase,
    /// Unexpected error; request rolled back to open
    Reverted,
}

impl std::fmt::Display for IntegrationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::NeedsRebase => write!(f, "needs rebase"),
            Self::Reverted => write!(f, "reverted"),
        }
    }
}

/// Build a patch value from submitted data
pub fn new_patch(id: u64, data: NewPatch, now: DateTime<Utc>) -> Patch {
    Patch {
        id,
        commit_message: data.commit_message,
        diff: data.diff,
        description: data.description,
        linter_ok: data.linter_ok,
        created_at: now,
        integration_log: String::new(),
        ci_reference_hash: None,
    }
}

/// Add a new patch on behalf of the author
pub fn add_patch(
    mr: &mut MergeRequest,
    patch_id: u64,
    data: NewPatch,
    now: DateTime<Utc>,
) -> Result<()> {
    if !mr.status.can_update() {
        return Err(Error::validation(
            "status",
            format!("is {}, the merge request can't be updated", mr.status),
        ));
    }
    mr.patches.push(new_patch(patch_id, data, now));
    let author = mr.author.clone();
    history::record(mr, &author, history::UPDATED, now);
    Ok(())
}

/// Abandon the request. Always permitted.
pub fn abandon(mr: &mut MergeRequest, actor: &Identity, now: DateTime<Utc>) {
    history::record(mr, actor, history::ABANDONED, now);
    mr.status = MergeRequestStatus::Abandoned;
    info!(mr_id = mr.id, actor = %actor, "merge request abandoned");
}

/// Accept the request and mark it as integrating.
///
/// Returns `false` without touching the request when its status blocks
/// integration.
pub fn begin_integration(mr: &mut MergeRequest, actor: &Identity, now: DateTime<Utc>) -> bool {
    if mr.status.blocks_integration() {
        return false;
    }
    history::record(mr, actor, history::ACCEPTED, now);
    mr.reviewer = Some(actor.clone());
    mr.status = MergeRequestStatus::Integrating;
    info!(mr_id = mr.id, actor = %actor, "merge request accepted, integrating");
    true
}

/// Apply the result of an integration attempt
pub fn finish_integration(
    mr: &mut MergeRequest,
    outcome: IntegrationOutcome,
    actor: &Identity,
    now: DateTime<Utc>,
) {
    mr.status = match outcome {
        IntegrationOutcome::Accepted => MergeRequestStatus::Accepted,
        IntegrationOutcome::NeedsRebase => {
            history::record(mr, actor, history::INTEGRATION_FAILED, now);
            MergeRequestStatus::NeedsRebase
        }
        IntegrationOutcome::Reverted => MergeRequestStatus::Open,
    };
    info!(mr_id = mr.id, %outcome, status = %mr.status, "integration finished");
}

/// Retarget the request.
///
/// A history event attributed to the author is recorded only when the
/// branch actually changes. Returns whether it did.
pub fn change_target_branch(mr: &mut MergeRequest, branch: &str, now: DateTime<Utc>) -> bool {
    if mr.target_branch == branch {
        return false;
    }
    if !mr.target_branch.is_empty() {
        let author = mr.author.clone();
        let what = history::target_branch_changed(&mr.target_branch, branch);
        history::record(mr, &author, what, now);
    }
    mr.target_branch = branch.to_string();
    true
}
