//! Integration orchestration
//!
//! Triggering calls (`integrate`, `push_to_ci`) do their guard checks and
//! initial persistence synchronously, then hand the work to a supervised
//! background job and return its [`JobHandle`].
//!
//! The two jobs deliberately handle failure differently:
//! - accept-and-integrate catches every error and panic, including failures
//!   to load the request, writes it to the patch's integration log, and
//!   rolls the request back to `open`. If recording the outcome fails, a
//!   plain revert is retried on a fresh connection;
//! - push-to-CI has no guard: errors escape to the job supervisor, which
//!   only logs them. Workspace and connection cleanup still happen.

use super::format;
use super::git::{self, CommandRunner};
use super::jobs::{JobHandle, JobKind, spawn_job};
use super::log::IntegrationLog;
use super::workspace::{Workspace, WorkspaceManager};
use crate::error::Result;
use crate::lifecycle::{self, IntegrationOutcome};
use crate::store::{Store, mutation};
use crate::types::{Identity, MergeRequest};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Local ref pushed upstream after a successful `git am`
pub const DEFAULT_PUSH_REF: &str = "master";

/// Name of the CI branch for the `patch_count`-th patch of `mr_id`
pub fn ci_branch_name(mr_id: u64, patch_count: usize) -> String {
    format!("mr-{mr_id}-version-{patch_count}")
}

/// Result of a CI push job that found a patch to push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiPushOutcome {
    /// Branch the patch was pushed to
    pub branch: String,
    /// Commit now at the tip of that branch, if the push succeeded
    pub commit: Option<String>,
}

/// Drives integration and CI push jobs
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    runner: Arc<dyn CommandRunner>,
    workspaces: WorkspaceManager,
    push_ref: String,
}

impl Orchestrator {
    /// Create an orchestrator pushing [`DEFAULT_PUSH_REF`]
    pub fn new(
        store: Arc<dyn Store>,
        runner: Arc<dyn CommandRunner>,
        workspaces: WorkspaceManager,
    ) -> Self {
        Self {
            store,
            runner,
            workspaces,
            push_ref: DEFAULT_PUSH_REF.to_string(),
        }
    }

    /// Push a different local ref after applying the patch
    #[must_use]
    pub fn with_push_ref(mut self, push_ref: impl Into<String>) -> Self {
        self.push_ref = push_ref.into();
        self
    }

    /// Accept the merge request on behalf of `actor` and start integrating.
    ///
    /// Returns `None` when the request is already accepted, integrating, or
    /// abandoned; nothing is changed or recorded in that case.
    pub async fn integrate(
        &self,
        mr_id: u64,
        actor: &Identity,
    ) -> Result<Option<JobHandle<Option<IntegrationOutcome>>>> {
        let update = {
            let conn = self.store.connect().await?;
            let reviewer = actor.clone();
            conn.update_merge_request(
                mr_id,
                mutation(move |mr| Ok(lifecycle::begin_integration(mr, &reviewer, Utc::now()))),
            )
            .await?
        };

        if !update.changed {
            debug!(mr_id, status = %update.merge_request.status, "integrate ignored");
            return Ok(None);
        }

        let this = self.clone();
        let actor = actor.clone();
        Ok(Some(spawn_job(
            JobKind::Integration,
            mr_id,
            this.run_integration(mr_id, actor),
        )))
    }

    /// Abandon the merge request. Always permitted.
    pub async fn abandon(&self, mr_id: u64, actor: &Identity) -> Result<MergeRequest> {
        let conn = self.store.connect().await?;
        let actor = actor.clone();
        let update = conn
            .update_merge_request(
                mr_id,
                mutation(move |mr| {
                    lifecycle::abandon(mr, &actor, Utc::now());
                    Ok(true)
                }),
            )
            .await?;
        Ok(update.merge_request)
    }

    /// Point the merge request at a different target branch
    pub async fn change_target_branch(&self, mr_id: u64, branch: &str) -> Result<MergeRequest> {
        let conn = self.store.connect().await?;
        let branch = branch.to_string();
        let update = conn
            .update_merge_request(
                mr_id,
                mutation(move |mr| Ok(lifecycle::change_target_branch(mr, &branch, Utc::now()))),
            )
            .await?;
        Ok(update.merge_request)
    }

    /// Push the current patch to `mr-<id>-version-<n>` for CI.
    ///
    /// Fails synchronously only if the merge request doesn't exist. Errors
    /// inside the job are not handled; they reach the supervisor's log.
    pub async fn push_to_ci(&self, mr_id: u64) -> Result<JobHandle<Option<CiPushOutcome>>> {
        self.store.connect().await?.load_merge_request(mr_id).await?;

        let this = self.clone();
        Ok(spawn_job(JobKind::CiPush, mr_id, this.run_ci_push(mr_id)))
    }

    async fn run_integration(
        self,
        mr_id: u64,
        actor: Identity,
    ) -> Result<Option<IntegrationOutcome>> {
        let mut log = IntegrationLog::new();
        let mut patch_id = None;
        let attempt = AssertUnwindSafe(self.attempt_integration(mr_id, &mut patch_id, &mut log))
            .catch_unwind()
            .await;

        let outcome = match attempt {
            Ok(Ok(Some(true))) => IntegrationOutcome::Accepted,
            Ok(Ok(Some(false))) => IntegrationOutcome::NeedsRebase,
            Ok(Ok(None)) => {
                warn!(mr_id, "no patch to integrate");
                return Ok(None);
            }
            Ok(Err(e)) => {
                warn!(mr_id, error = %e, "integration failed unexpectedly");
                log.record_error(&e);
                IntegrationOutcome::Reverted
            }
            Err(payload) => {
                warn!(mr_id, "integration panicked");
                log.record_panic(payload.as_ref());
                IntegrationOutcome::Reverted
            }
        };

        let log_text = log.into_string();
        if let Err(e) = self
            .record_outcome(mr_id, patch_id, outcome, &actor, log_text.clone())
            .await
        {
            warn!(mr_id, error = %e, "failed to record integration outcome, reverting");
            self.record_outcome(mr_id, patch_id, IntegrationOutcome::Reverted, &actor, log_text)
                .await?;
            return Ok(Some(IntegrationOutcome::Reverted));
        }
        Ok(Some(outcome))
    }

    /// Load, clone, apply, push.
    ///
    /// `Ok(None)` means the request has no patch; `Ok(Some(false))` means git
    /// refused one of the steps. `patch_id` is set once the patch is known.
    async fn attempt_integration(
        &self,
        mr_id: u64,
        patch_id: &mut Option<u64>,
        log: &mut IntegrationLog,
    ) -> Result<Option<bool>> {
        let conn = self.store.connect().await?;
        let mr = conn.load_merge_request(mr_id).await?;
        let Some(patch) = format::format_patch(&mr) else {
            return Ok(None);
        };
        *patch_id = Some(patch.patch_id);

        let project = conn.load_project(mr.project_id).await?;
        let workspace = self.workspaces.provision(patch.patch_id).await?;
        let runner = self.runner.as_ref();

        let integrated = git::clone_and_reset(
            runner,
            log,
            &workspace,
            &project.repository_url,
            &mr.target_branch,
        )
        .await?
            && git::apply_patch(runner, log, workspace.path(), &patch.text).await?
            && git::push_branch(runner, log, workspace.path(), &self.push_ref, &mr.target_branch)
                .await?;

        release(workspace).await;
        info!(mr_id, integrated, "integration attempt finished");
        Ok(Some(integrated))
    }

    /// Persist `outcome` and the transcript on a fresh connection.
    ///
    /// The transcript goes to `patch_id`, or to the current patch when the
    /// attempt failed before the patch was known.
    async fn record_outcome(
        &self,
        mr_id: u64,
        patch_id: Option<u64>,
        outcome: IntegrationOutcome,
        actor: &Identity,
        log_text: String,
    ) -> Result<()> {
        let conn = self.store.connect().await?;
        let actor = actor.clone();
        conn.update_merge_request(
            mr_id,
            mutation(move |mr| {
                lifecycle::finish_integration(mr, outcome, &actor, Utc::now());
                let target = patch_id.or_else(|| mr.current_patch().map(|p| p.id));
                if let Some(patch) = target.and_then(|id| mr.patch_mut(id)) {
                    patch.integration_log = log_text;
                }
                Ok(true)
            }),
        )
        .await?;
        Ok(())
    }

    async fn run_ci_push(self, mr_id: u64) -> Result<Option<CiPushOutcome>> {
        let conn = self.store.connect().await?;
        let mr = conn.load_merge_request(mr_id).await?;

        let Some(patch) = format::format_patch(&mr) else {
            warn!(mr_id, "no patch to push to CI");
            return Ok(None);
        };

        let project = conn.load_project(mr.project_id).await?;
        let branch = ci_branch_name(mr.id, mr.patches.len());
        let workspace = self.workspaces.provision(patch.patch_id).await?;
        let runner = self.runner.as_ref();
        let mut log = IntegrationLog::new();

        let pushed = git::clone_and_reset(
            runner,
            &mut log,
            &workspace,
            &project.repository_url,
            &mr.target_branch,
        )
        .await?
            && git::apply_patch(runner, &mut log, workspace.path(), &patch.text).await?
            && git::push_branch(runner, &mut log, workspace.path(), &self.push_ref, &branch)
                .await?;

        let commit = if pushed {
            git::head_commit(runner, &mut log, workspace.path()).await?
        } else {
            None
        };
        release(workspace).await;
        debug!(mr_id, %branch, log = log.as_str(), "CI push transcript");

        if let Some(hash) = commit.clone() {
            let patch_id = patch.patch_id;
            conn.update_merge_request(
                mr_id,
                mutation(move |mr| {
                    Ok(mr.patch_mut(patch_id).is_some_and(|patch| {
                        patch.ci_reference_hash = Some(hash);
                        true
                    }))
                }),
            )
            .await?;
        }

        Ok(Some(CiPushOutcome { branch, commit }))
    }
}

/// Remove a finished workspace off the async executor
async fn release(workspace: Workspace) {
    if let Err(e) = workspace.close_async().await {
        warn!(error = %e, "failed to remove workspace");
    }
}
