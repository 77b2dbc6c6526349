//! Review commands - integrate, abandon, retarget, CI

use crate::cli::context::CommandContext;
use crate::cli::style::{self, Stylize, check, spinner_style};
use anstream::println;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use reviewit::ci::CiClient;
use reviewit::error::{Error, Result};
use reviewit::lifecycle::IntegrationOutcome;
use reviewit::store::Connection;
use std::time::Duration;

/// Accept a merge request and wait for its integration job
pub async fn run_integrate(
    ctx: &CommandContext,
    token: Option<&str>,
    mr_id: u64,
    show_log: bool,
) -> Result<()> {
    let (session, _) = ctx.merge_request_session(token, mr_id).await?;
    let actor = session.user.identity();

    let Some(job) = ctx.orchestrator.integrate(mr_id, &actor).await? else {
        let mr = ctx.connect().await?.load_merge_request(mr_id).await?;
        println!(
            "{}",
            format!("Merge request #{mr_id} is {}; nothing to do.", mr.status).muted()
        );
        return Ok(());
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Integrating {}...", format!("#{mr_id}").accent()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let outcome = job.wait().await;
    spinner.finish_and_clear();

    let conn = ctx.connect().await?;
    let mr = conn.load_merge_request(mr_id).await?;
    match outcome? {
        Some(IntegrationOutcome::Accepted) => println!(
            "{} Integrated {} into {}",
            check(),
            format!("#{mr_id}").accent(),
            mr.target_branch.accent()
        ),
        Some(IntegrationOutcome::NeedsRebase) => println!(
            "{} {}",
            "Failed to integrate.".warn(),
            format!("#{mr_id} is now {}", style::status(mr.status)).muted()
        ),
        Some(IntegrationOutcome::Reverted) => println!(
            "{} {}",
            "Integration hit an unexpected error.".warn(),
            format!("#{mr_id} is {} again", style::status(mr.status)).muted()
        ),
        None => println!("{}", "No patch to integrate.".muted()),
    }

    if show_log {
        print_integration_log(conn.as_ref(), mr_id).await?;
    }
    Ok(())
}

async fn print_integration_log(conn: &dyn Connection, mr_id: u64) -> Result<()> {
    let mr = conn.load_merge_request(mr_id).await?;
    if let Some(patch) = mr.current_patch() {
        for line in patch.integration_log.lines() {
            println!("  {}", line.muted());
        }
    }
    Ok(())
}

/// Abandon a merge request, asking first unless `yes`
pub async fn run_abandon(
    ctx: &CommandContext,
    token: Option<&str>,
    mr_id: u64,
    yes: bool,
) -> Result<()> {
    let (session, mr) = ctx.merge_request_session(token, mr_id).await?;

    if !yes
        && !Confirm::new()
            .with_prompt(format!("Abandon #{mr_id} \"{}\"?", mr.subject))
            .default(false)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
    {
        println!("{}", "Aborted".muted());
        return Ok(());
    }

    let mr = ctx
        .orchestrator
        .abandon(mr_id, &session.user.identity())
        .await?;
    println!(
        "{} {} is {}",
        check(),
        format!("#{}", mr.id).accent(),
        style::status(mr.status)
    );
    Ok(())
}

/// Change a merge request's target branch
pub async fn run_retarget(
    ctx: &CommandContext,
    token: Option<&str>,
    mr_id: u64,
    branch: &str,
) -> Result<()> {
    ctx.merge_request_session(token, mr_id).await?;
    let mr = ctx.orchestrator.change_target_branch(mr_id, branch).await?;
    println!(
        "{} {} now targets {}",
        check(),
        format!("#{}", mr.id).accent(),
        mr.target_branch.accent()
    );
    Ok(())
}

/// Push the current patch to its CI branch and wait for the job
pub async fn run_ci_push(ctx: &CommandContext, token: Option<&str>, mr_id: u64) -> Result<()> {
    ctx.merge_request_session(token, mr_id).await?;
    let job = ctx.orchestrator.push_to_ci(mr_id).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Pushing {} to CI...", format!("#{mr_id}").accent()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let outcome = job.wait().await;
    spinner.finish_and_clear();

    match outcome? {
        Some(pushed) => match pushed.commit {
            Some(commit) => println!(
                "{} Pushed {} at {}",
                check(),
                pushed.branch.accent(),
                commit.muted()
            ),
            None => println!(
                "{} {}",
                "Failed to push".warn(),
                pushed.branch.accent()
            ),
        },
        None => println!("{}", "No patch to push.".muted()),
    }
    Ok(())
}

/// Query the CI build status of the current patch
pub async fn run_ci_status(ctx: &CommandContext, token: Option<&str>, mr_id: u64) -> Result<()> {
    let (session, mr) = ctx.merge_request_session(token, mr_id).await?;
    let patch = mr
        .current_patch()
        .ok_or_else(|| Error::NotFound(format!("patch for merge request #{mr_id}")))?;

    let client = CiClient::new(ctx.config.ci_timeout())?;
    let status = client.status(&session.project, patch).await?;

    let label = if status.is_unknown() {
        status.status.muted()
    } else if status.status == "success" {
        status.status.success()
    } else {
        status.status.warn()
    };
    println!("CI: {label}");
    if let Some(url) = &status.url {
        println!("  {}", url.accent());
    }
    Ok(())
}
