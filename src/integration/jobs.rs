//! Background job supervision
//!
//! Jobs run as independent tokio tasks. Each one is wrapped so that its
//! completion, and any error escaping it, is logged even when the caller
//! drops the [`JobHandle`] and never looks at the result.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

/// Kind of background job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Accept-and-integrate
    Integration,
    /// Push the current patch to a CI branch
    CiPush,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integration => write!(f, "integration"),
            Self::CiPush => write!(f, "ci-push"),
        }
    }
}

/// Handle to a running background job
///
/// Dropping the handle detaches the job; it keeps running.
#[derive(Debug)]
pub struct JobHandle<T> {
    kind: JobKind,
    mr_id: u64,
    handle: JoinHandle<Result<T>>,
}

impl<T> JobHandle<T> {
    /// Job kind
    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    /// Merge request the job works on
    pub const fn mr_id(&self) -> u64 {
        self.mr_id
    }

    /// Whether the job has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its result.
    ///
    /// A panicked or cancelled task becomes [`Error::Internal`].
    pub async fn wait(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Error::Internal(format!(
                "{} job for MR #{} panicked",
                self.kind, self.mr_id
            ))),
            Err(_) => Err(Error::Internal(format!(
                "{} job for MR #{} was cancelled",
                self.kind, self.mr_id
            ))),
        }
    }
}

/// Spawn `job` on the current runtime under supervision
pub fn spawn_job<T, F>(kind: JobKind, mr_id: u64, job: F) -> JobHandle<T>
where
    T: std::fmt::Debug + Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let span = info_span!("job", %kind, mr_id);
    let handle = tokio::spawn(
        async move {
            info!("job started");
            let result = job.await;
            match &result {
                Ok(outcome) => info!(?outcome, "job finished"),
                Err(e) => error!(error = %e, "job failed"),
            }
            result
        }
        .instrument(span),
    );

    JobHandle {
        kind,
        mr_id,
        handle,
    }
}
