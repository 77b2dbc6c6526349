//! Merge request lifecycle
//!
//! Status rules and transitions are pure functions over [`MergeRequest`]
//! values. Persisting the result is the caller's job, which lets the store
//! run a guard and its write as one atomic transition.
//!
//! ```text
//! open -> integrating -> accepted
//!             |
//!             +--------> needs_rebase -> integrating ...
//!             +--------> open (unexpected integration error)
//! any -> abandoned
//! ```

pub mod history;
mod transitions;

pub use transitions::{
    IntegrationOutcome, abandon, add_patch, begin_integration, change_target_branch,
    finish_integration, new_patch,
};

use crate::error::{Error, Result};
use crate::types::{MergeRequest, MergeRequestStatus};

/// Any status at or past this ordinal is closed
pub const CLOSE_LIMIT: u8 = 3;

impl MergeRequestStatus {
    /// Position in the status ordering
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Integrating => 1,
            Self::NeedsRebase => 2,
            Self::Accepted => 3,
            Self::Abandoned => 4,
        }
    }

    /// Accepted or abandoned
    pub const fn is_closed(self) -> bool {
        self.ordinal() >= CLOSE_LIMIT
    }

    /// Whether a new patch may be added.
    ///
    /// Abandoned requests still accept patches.
    pub const fn can_update(self) -> bool {
        !matches!(self, Self::Integrating | Self::Accepted)
    }

    /// Whether `integrate` is a no-op from this status
    pub const fn blocks_integration(self) -> bool {
        matches!(self, Self::Accepted | Self::Integrating | Self::Abandoned)
    }
}

/// Check entity invariants before a save
pub fn validate(mr: &MergeRequest) -> Result<()> {
    if mr.target_branch.trim().is_empty() {
        return Err(Error::validation("target_branch", "can't be blank"));
    }
    if mr.subject.trim().is_empty() {
        return Err(Error::validation("subject", "can't be blank"));
    }
    if mr.reviewer.as_ref().is_some_and(|r| r.id == mr.author.id) {
        return Err(Error::validation("reviewer", "can't be the author."));
    }
    Ok(())
}
