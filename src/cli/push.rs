//! Push command - create or update a merge request from the HEAD commit

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check};
use anstream::println;
use reviewit::error::{Error, Result};
use reviewit::integration::{CommandOutput, CommandRunner, GitCommand, ProcessRunner};
use reviewit::trailer;
use reviewit::types::{NewMergeRequest, NewPatch};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Options for the push command
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Local repository
    pub repo: PathBuf,
    /// Project to push to
    pub project_id: u64,
    /// Target branch for a new merge request
    pub target_branch: Option<String>,
    /// Description of this patch
    pub description: String,
    /// Whether the local linter passed
    pub linter_ok: bool,
}

/// The HEAD commit of the local repository
struct LocalCommit {
    subject: String,
    message: String,
    diff: String,
}

/// Run the push command
pub async fn run_push(ctx: &CommandContext, token: Option<&str>, options: PushOptions) -> Result<()> {
    let session = ctx.session(token, options.project_id).await?;
    let runner = ProcessRunner;
    let commit = read_head_commit(&runner, &options.repo).await?;
    if commit.diff.trim().is_empty() {
        return Err(Error::validation("diff", "is empty"));
    }

    let patch = NewPatch {
        commit_message: commit.message.clone(),
        diff: commit.diff,
        description: options.description,
        linter_ok: options.linter_ok,
    };
    let conn = ctx.connect().await?;

    if let Some(mr_id) = trailer::find_merge_request_id(&commit.message) {
        let existing = conn.load_merge_request(mr_id).await?;
        if existing.project_id != session.project.id {
            return Err(Error::NotFound(format!(
                "merge request #{mr_id} in {}",
                session.project.name
            )));
        }
        let mr = conn.add_patch(mr_id, patch).await?;
        println!(
            "{} Updated merge request {} ({} patches)",
            check(),
            format!("#{}", mr.id).accent(),
            mr.patches.len()
        );
        return Ok(());
    }

    let target_branch = options
        .target_branch
        .unwrap_or_else(|| ctx.config.default_target_branch.clone());
    let mr = conn
        .create_merge_request(NewMergeRequest {
            project_id: session.project.id,
            subject: commit.subject,
            target_branch,
            author: session.user.identity(),
            patch,
        })
        .await?;

    amend_with_trailer(&runner, &options.repo, &commit.message, mr.id).await?;
    println!(
        "{} Created merge request {} {} -> {}",
        check(),
        format!("#{}", mr.id).accent(),
        mr.subject.emphasis(),
        mr.target_branch.accent()
    );
    println!(
        "{}",
        format!("  Commit amended with {}: {}", trailer::TRAILER_KEY, mr.id).muted()
    );
    Ok(())
}

async fn read_head_commit(runner: &dyn CommandRunner, repo: &Path) -> Result<LocalCommit> {
    let subject = git_output(runner, repo, &["log", "-1", "--format=%s"]).await?;
    let message = git_output(runner, repo, &["log", "-1", "--format=%B"]).await?;
    // The diff is stored byte for byte, so it must not be trimmed
    let diff = run_git(runner, repo, &["show", "--format="]).await?.stdout;
    Ok(LocalCommit {
        subject,
        message,
        diff,
    })
}

async fn amend_with_trailer(
    runner: &dyn CommandRunner,
    repo: &Path,
    message: &str,
    mr_id: u64,
) -> Result<()> {
    let mut file = tempfile::Builder::new().prefix("commit-msg").tempfile()?;
    file.write_all(trailer::append_merge_request_id(message, mr_id).as_bytes())?;
    file.flush()?;

    let path = file.path().to_string_lossy().into_owned();
    git_output(runner, repo, &["commit", "--amend", "-F", &path]).await?;
    Ok(())
}

async fn git_output(runner: &dyn CommandRunner, repo: &Path, args: &[&str]) -> Result<String> {
    Ok(run_git(runner, repo, args).await?.output)
}

async fn run_git(runner: &dyn CommandRunner, repo: &Path, args: &[&str]) -> Result<CommandOutput> {
    let command = GitCommand::new(repo, args.iter().copied());
    let output = runner.run(&command).await?;
    if !output.succeeded {
        return Err(Error::Git(format!("`{command}` failed: {}", output.output)));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {args:?} failed: {output:?}");
        String::from_utf8(output.stdout).unwrap()
    }

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        git(dir.path(), &["config", "user.name", "Alice"]);
        git(dir.path(), &["config", "user.email", "alice@example.com"]);
        git(dir.path(), &["config", "commit.gpgsign", "false"]);
        dir
    }

    fn commit_file(dir: &Path, contents: &str, message: &str) {
        std::fs::write(dir.join("file.txt"), contents).unwrap();
        git(dir, &["add", "file.txt"]);
        git(dir, &["commit", "-q", "-m", message]);
    }

    #[tokio::test]
    async fn test_diff_ending_in_blank_context_line_is_kept_verbatim() {
        let repo = init_repo();
        commit_file(repo.path(), "a\nb\nc\n\n", "Initial");
        commit_file(repo.path(), "a\nB\nc\n\n", "Capitalize b");

        let commit = read_head_commit(&ProcessRunner, repo.path()).await.unwrap();

        let expected = git(repo.path(), &["show", "--format="]);
        assert!(expected.ends_with(" c\n \n"));
        assert_eq!(commit.diff, expected);
        assert_eq!(commit.subject, "Capitalize b");
        assert_eq!(commit.message, "Capitalize b");
    }

    #[tokio::test]
    async fn test_amend_appends_trailer_to_head_commit() {
        let repo = init_repo();
        commit_file(repo.path(), "one\n", "Add file\n\nLonger body.");

        let commit = read_head_commit(&ProcessRunner, repo.path()).await.unwrap();
        amend_with_trailer(&ProcessRunner, repo.path(), &commit.message, 7)
            .await
            .unwrap();

        let amended = read_head_commit(&ProcessRunner, repo.path()).await.unwrap();
        assert_eq!(trailer::find_merge_request_id(&amended.message), Some(7));
        assert_eq!(amended.diff, commit.diff);
    }
}
