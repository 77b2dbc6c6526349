//! Token and client-version authentication
//!
//! Every request from the CLI carries an API token and the CLI's version.
//! The token resolves the acting user; the version must match exactly; the
//! project must be one the user has access to.

use crate::error::{Error, Result};
use crate::store::Connection;
use crate::types::{Project, User};

/// Resolve the current user and project.
pub async fn authenticate(
    conn: &dyn Connection,
    token: &str,
    client_version: &str,
    expected_version: &str,
    project_id: u64,
) -> Result<(User, Project)> {
    let user = conn
        .find_user_by_token(token)
        .await?
        .ok_or_else(|| Error::Authentication("Sorry, invalid token.".to_string()))?;

    if client_version != expected_version {
        return Err(Error::Authentication(format!(
            "You need Review it! version {expected_version}, but have {client_version}"
        )));
    }

    let project = match conn.load_project(project_id).await {
        Ok(project) if project.is_member(user.id) => project,
        Ok(_) | Err(Error::NotFound(_)) => {
            return Err(Error::NotFound(format!(
                "project #{project_id} for {}",
                user.name
            )));
        }
        Err(e) => return Err(e),
    };

    Ok((user, project))
}
