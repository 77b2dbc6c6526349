//! List and show commands

use crate::cli::context::CommandContext;
use crate::cli::style::{self, Stylize};
use anstream::println;
use reviewit::error::Result;
use reviewit::types::{MergeRequest, MergeRequestFilter, MergeRequestStatus};

/// List a project's merge requests
pub async fn run_list(
    ctx: &CommandContext,
    token: Option<&str>,
    project_id: u64,
    filter: MergeRequestFilter,
) -> Result<()> {
    let session = ctx.session(token, project_id).await?;
    let mrs = ctx
        .connect()
        .await?
        .list_merge_requests(session.project.id, filter)
        .await?;

    if mrs.is_empty() {
        println!("{}", "No merge requests.".muted());
        return Ok(());
    }

    println!("{}:", session.project.name.emphasis());
    for mr in &mrs {
        println!(
            "  {} {} {} {}",
            format!("#{:<4}", mr.id).accent(),
            style::status(mr.status),
            mr.subject,
            format!("({} -> {})", mr.author.name, mr.target_branch).muted()
        );
    }
    Ok(())
}

/// Show one merge request with its patches and history
pub async fn run_show(
    ctx: &CommandContext,
    token: Option<&str>,
    mr_id: u64,
    with_log: bool,
) -> Result<()> {
    let (_session, mr) = ctx.merge_request_session(token, mr_id).await?;
    print_merge_request(&mr, with_log);
    Ok(())
}

fn print_merge_request(mr: &MergeRequest, with_log: bool) {
    println!(
        "{} {}",
        format!("Merge request #{}", mr.id).emphasis(),
        mr.subject
    );
    println!("  Status:  {}", style::status(mr.status));
    println!("  Target:  {}", mr.target_branch.accent());
    println!("  Author:  {}", mr.author);
    if let Some(reviewer) = &mr.reviewer {
        println!("  Reviewer: {reviewer}");
    }
    if mr.status == MergeRequestStatus::Integrating {
        println!("{}", "  Integration in progress; new patches are refused.".muted());
    }

    println!();
    println!("{}:", "Patches".emphasis());
    for (index, patch) in mr.patches.iter().enumerate() {
        let lint = if patch.linter_ok {
            "lint ok".success()
        } else {
            "lint failed".warn()
        };
        println!(
            "  {} {} {}",
            format!("v{}", index + 1).accent(),
            patch.created_at.format("%Y-%m-%d %H:%M"),
            lint
        );
        if !patch.description.is_empty() {
            println!("    {}", patch.description);
        }
        if let Some(hash) = &patch.ci_reference_hash {
            println!("    {}", format!("CI: {hash}").muted());
        }
    }

    if !mr.history.is_empty() {
        println!();
        println!("{}:", "History".emphasis());
        for event in &mr.history {
            println!(
                "  {} {} {}",
                event.when.format("%Y-%m-%d %H:%M").to_string().muted(),
                event.actor.name,
                event.description
            );
        }
    }

    if with_log {
        if let Some(patch) = mr.current_patch().filter(|p| !p.integration_log.is_empty()) {
            println!();
            println!("{}:", "Integration log".emphasis());
            for line in patch.integration_log.lines() {
                println!("  {}", line.muted());
            }
        }
    }
}
