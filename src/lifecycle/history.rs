//! Audit trail recording
//!
//! History is append-only: events are pushed onto the owning merge request
//! and never edited or removed.

use crate::types::{HistoryEvent, Identity, MergeRequest};
use chrono::{DateTime, Utc};

/// Recorded when a new patch is added
pub const UPDATED: &str = "updated the merge request";
/// Recorded when a reviewer abandons the request
pub const ABANDONED: &str = "abandoned the merge request";
/// Recorded when a reviewer accepts the request and integration starts
pub const ACCEPTED: &str = "accepted the merge request";
/// Recorded when `git am` or `git push` fails during integration
pub const INTEGRATION_FAILED: &str = "failed to integrate merge request";

/// Append an event to the merge request's history
pub fn record(
    mr: &mut MergeRequest,
    actor: &Identity,
    description: impl Into<String>,
    when: DateTime<Utc>,
) {
    mr.history.push(HistoryEvent {
        when,
        description: description.into(),
        actor: actor.clone(),
    });
}

/// Description for a target branch change
pub fn target_branch_changed(from: &str, to: &str) -> String {
    format!("changed the target branch from {from} to {to}")
}
