//! reviewit - merge request tracking with out-of-band patch integration
//!
//! When a reviewer accepts a merge request, its current patch is applied
//! with `git am` to a fresh shallow clone of the project's repository and
//! pushed upstream from a background job. The job records what git said in
//! the patch's integration log and moves the request to `accepted`,
//! `needs_rebase`, or back to `open` on unexpected failure.

pub mod auth;
pub mod ci;
pub mod config;
pub mod error;
pub mod integration;
pub mod lifecycle;
pub mod store;
pub mod trailer;
pub mod types;
