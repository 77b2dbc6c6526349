//! Integration engine
//!
//! Same split as the lifecycle: formatting is pure, everything else touches
//! the filesystem or spawns processes.
//! 1. Format - render the current patch for `git am` (pure)
//! 2. Provision - scoped workspace per attempt
//! 3. Run - clone, reset, apply, push via a [`CommandRunner`]
//! 4. Record - status transition plus captured log, in one store update

pub mod format;
pub mod git;
pub mod jobs;
mod log;
mod orchestrator;
pub mod workspace;

pub use format::{FormattedPatch, format_patch};
pub use git::{CommandOutput, CommandRunner, GitCommand, ProcessRunner};
pub use jobs::{JobHandle, JobKind};
pub use log::IntegrationLog;
pub use orchestrator::{CiPushOutcome, DEFAULT_PUSH_REF, Orchestrator, ci_branch_name};
pub use workspace::{Workspace, WorkspaceManager};
