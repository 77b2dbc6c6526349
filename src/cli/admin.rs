//! Admin commands - users and projects
//!
//! These act directly on the local store and need no token.

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check};
use anstream::println;
use reviewit::error::{Error, Result};
use reviewit::types::NewProject;

/// Options for `project add`
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Project name
    pub name: String,
    /// Upstream clone URL
    pub repository_url: String,
    /// CI access token
    pub ci_token: Option<String>,
    /// CI project base URL
    pub ci_project_url: Option<String>,
}

/// Create a user and print their API token
pub async fn run_user_add(ctx: &CommandContext, name: &str, email: &str) -> Result<()> {
    if !email.trim().is_empty() && !email.contains('@') {
        return Err(Error::validation("email", "is invalid"));
    }

    let user = ctx.connect().await?.create_user(name, email).await?;
    println!(
        "{} Created user {} {}",
        check(),
        format!("#{}", user.id).accent(),
        user.identity().to_string().emphasis()
    );
    println!("  API token: {}", user.api_token.accent());
    Ok(())
}

/// Create a project
pub async fn run_project_add(ctx: &CommandContext, options: ProjectOptions) -> Result<()> {
    let project = ctx
        .connect()
        .await?
        .create_project(NewProject {
            name: options.name,
            repository_url: options.repository_url,
            ci_token: options.ci_token,
            ci_project_url: options.ci_project_url,
        })
        .await?;

    println!(
        "{} Created project {} {}",
        check(),
        format!("#{}", project.id).accent(),
        project.name.emphasis()
    );
    if !project.has_ci() {
        println!("{}", "  No CI configured.".muted());
    }
    Ok(())
}

/// Grant a user access to a project
pub async fn run_add_member(ctx: &CommandContext, project_id: u64, user_id: u64) -> Result<()> {
    let conn = ctx.connect().await?;
    let user = conn.load_user(user_id).await?;
    let project = conn.add_project_member(project_id, user_id).await?;
    println!(
        "{} {} can now access {}",
        check(),
        user.identity().to_string().emphasis(),
        project.name.accent()
    );
    Ok(())
}
