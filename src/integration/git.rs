//! Git command execution
//!
//! Git runs as an external process. The [`CommandRunner`] trait is the
//! seam: production uses [`ProcessRunner`], tests substitute a scripted
//! fake. Composed operations log every invocation into the caller's
//! [`IntegrationLog`].

use super::log::IntegrationLog;
use super::workspace::Workspace;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

/// A git invocation: working directory plus arguments after `git`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    /// Directory the command runs in
    pub cwd: PathBuf,
    /// Arguments passed to `git`
    pub args: Vec<String>,
}

impl GitCommand {
    /// Build a command running in `cwd`
    pub fn new<I, S>(cwd: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cwd: cwd.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The git subcommand (`clone`, `am`, ...)
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl std::fmt::Display for GitCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cd {} && git {}", self.cwd.display(), self.args.join(" "))
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code was zero
    pub succeeded: bool,
    /// Standard output followed by standard error, trimmed
    pub output: String,
    /// Standard output exactly as written
    pub stdout: String,
}

impl CommandOutput {
    /// A successful result with the given output
    pub fn success(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            succeeded: true,
            stdout: output.clone(),
            output,
        }
    }

    /// A failed (non-zero exit) result with the given output
    pub fn failure(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            succeeded: false,
            stdout: output.clone(),
            output,
        }
    }
}

/// Executes git commands
///
/// A non-zero exit is reported through [`CommandOutput::succeeded`]; `Err`
/// is reserved for failing to run the process at all.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion
    async fn run(&self, command: &GitCommand) -> Result<CommandOutput>;
}

/// Runs git as a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &GitCommand) -> Result<CommandOutput> {
        debug!(%command, "running git");
        let output = tokio::process::Command::new("git")
            .args(&command.args)
            .current_dir(&command.cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Git(format!("failed to run `{command}`: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut combined = stdout.clone();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(%command, status = ?output.status.code(), "git finished");
        Ok(CommandOutput {
            succeeded: output.status.success(),
            output: combined.trim().to_string(),
            stdout,
        })
    }
}

/// Run a command and record it in `log`. Returns whether it succeeded.
pub async fn call(
    runner: &dyn CommandRunner,
    log: &mut IntegrationLog,
    command: GitCommand,
) -> Result<bool> {
    let result = runner.run(&command).await?;
    log.record_command(&command.to_string(), &result.output);
    Ok(result.succeeded)
}

/// Shallow-clone `repository_url` into the workspace and hard-reset it to
/// `origin/<branch>`.
pub async fn clone_and_reset(
    runner: &dyn CommandRunner,
    log: &mut IntegrationLog,
    workspace: &Workspace,
    repository_url: &str,
    branch: &str,
) -> Result<bool> {
    let cloned = call(
        runner,
        log,
        GitCommand::new(
            workspace.base_dir(),
            ["clone", "--depth", "1", repository_url, workspace.name()],
        ),
    )
    .await?;
    if !cloned {
        return Ok(false);
    }

    call(
        runner,
        log,
        GitCommand::new(
            workspace.path(),
            ["reset".to_string(), "--hard".to_string(), format!("origin/{branch}")],
        ),
    )
    .await
}

/// Write `patch_text` to a transient file and `git am` it in `dir`
pub async fn apply_patch(
    runner: &dyn CommandRunner,
    log: &mut IntegrationLog,
    dir: &Path,
    patch_text: &str,
) -> Result<bool> {
    let mut file = tempfile::Builder::new().prefix("patch").tempfile()?;
    file.write_all(patch_text.as_bytes())?;
    file.flush()?;

    let patch_path = file.path().to_string_lossy().into_owned();
    call(runner, log, GitCommand::new(dir, ["am".to_string(), patch_path])).await
}

/// Push `local_ref` to `remote_branch` on origin
pub async fn push_branch(
    runner: &dyn CommandRunner,
    log: &mut IntegrationLog,
    dir: &Path,
    local_ref: &str,
    remote_branch: &str,
) -> Result<bool> {
    call(
        runner,
        log,
        GitCommand::new(
            dir,
            [
                "push".to_string(),
                "origin".to_string(),
                format!("{local_ref}:{remote_branch}"),
            ],
        ),
    )
    .await
}

/// Commit hash of HEAD in `dir`, or `None` if `git rev-parse` fails
pub async fn head_commit(
    runner: &dyn CommandRunner,
    log: &mut IntegrationLog,
    dir: &Path,
) -> Result<Option<String>> {
    let command = GitCommand::new(dir, ["rev-parse", "HEAD"]);
    let result = runner.run(&command).await?;
    log.record_command(&command.to_string(), &result.output);
    Ok(result.succeeded.then(|| result.output.trim().to_string()))
}
