//! CI build status lookup
//!
//! The CI server is polled synchronously when a merge request is shown, so
//! the call is bounded: past the timeout the status is reported as
//! `unknown` instead of failing.

use crate::error::{Error, Result};
use crate::types::{Patch, Project};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default bound on a status query
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Build reference queried for every patch.
// TODO: query `patch.ci_reference_hash` instead once CI pushes record it
// for every patch; until then statuses are read from this pinned build.
pub const PINNED_BUILD_REF: &str = "15cc9596c3ba462f20579453607aaed4d75c0733";

const UNKNOWN_STATUS: &str = "unknown";

/// Build status as reported by the CI server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiStatus {
    /// Build status (`success`, `failed`, `running`, ..., or `unknown`)
    pub status: String,
    /// Build ID, numeric or textual depending on the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Web URL of the build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Any other fields the server returned
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CiStatus {
    /// Status used when the CI server didn't answer in time
    pub fn unknown() -> Self {
        Self {
            status: UNKNOWN_STATUS.to_string(),
            id: None,
            url: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Whether this is the timeout fallback
    pub fn is_unknown(&self) -> bool {
        self.status == UNKNOWN_STATUS
    }

    /// Build ID as it appears in a URL path; empty when absent
    pub fn id_text(&self) -> String {
        match &self.id {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// CI status client using reqwest
#[derive(Debug, Clone)]
pub struct CiClient {
    client: Client,
    timeout: Duration,
}

impl CiClient {
    /// Create a client giving up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Ci(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// URL of the status document for `patch`
    pub fn status_url(project: &Project, patch: &Patch) -> Result<Url> {
        let (Some(base), Some(token)) = (
            project.ci_project_url.as_deref(),
            project.ci_token.as_deref(),
        ) else {
            return Err(Error::Ci(format!(
                "project {} has no CI configured",
                project.name
            )));
        };

        debug!(patch_id = patch.id, "building CI status URL");
        let mut url = Url::parse(&format!(
            "{}/builds/{PINNED_BUILD_REF}/status.json",
            base.trim_end_matches('/')
        ))
        .map_err(|e| Error::Ci(format!("invalid CI project URL {base}: {e}")))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    /// Fetch the build status for `patch`.
    ///
    /// Returns [`CiStatus::unknown`] when the server doesn't answer within
    /// the timeout; other failures are errors.
    pub async fn status(&self, project: &Project, patch: &Patch) -> Result<CiStatus> {
        if !project.has_ci() {
            return Err(Error::Ci(format!(
                "project {} has no CI configured",
                project.name
            )));
        }
        let url = Self::status_url(project, patch)?;

        let request = async {
            let body = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            serde_json::from_str::<CiStatus>(&body)
                .map_err(|e| Error::Ci(format!("invalid status response: {e}")))
        };

        let mut status = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(status)) => status,
            Ok(Err(Error::Http(e))) if e.is_timeout() => return Ok(CiStatus::unknown()),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                debug!(timeout = ?self.timeout, "CI status query timed out");
                return Ok(CiStatus::unknown());
            }
        };

        let base = project
            .ci_project_url
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');
        status.url = Some(format!("{base}/builds/{}", status.id_text()));
        Ok(status)
    }
}
