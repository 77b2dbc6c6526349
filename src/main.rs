//! reviewit - merge request tracking with out-of-band patch integration

mod cli;

use anstream::eprintln;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cli::style::Stylize;
use cli::{CommandContext, ProjectOptions, PushOptions};
use reviewit::error::Result;
use reviewit::types::MergeRequestFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reviewit")]
#[command(about = "Review merge requests and integrate accepted patches upstream")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/reviewit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the store (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TokenArg {
    /// API token of the acting user
    #[arg(long, env = "REVIEWIT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Create or update a merge request from the HEAD commit
    Push {
        #[command(flatten)]
        auth: TokenArg,

        /// Project to push to
        #[arg(long)]
        project: u64,

        /// Target branch of a new merge request
        #[arg(long)]
        target: Option<String>,

        /// Description of this patch
        #[arg(long, short = 'm', default_value = "")]
        description: String,

        /// Mark the patch as passing the linter
        #[arg(long)]
        linter_ok: bool,

        /// Local repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// List a project's merge requests
    List {
        #[command(flatten)]
        auth: TokenArg,

        /// Project to list
        #[arg(long)]
        project: u64,

        /// Which merge requests to show
        #[arg(long, value_enum, default_value_t = ListFilter::All)]
        filter: ListFilter,
    },

    /// Show a merge request
    Show {
        #[command(flatten)]
        auth: TokenArg,

        /// Merge request ID
        id: u64,

        /// Also print the latest integration log
        #[arg(long)]
        log: bool,
    },

    /// Accept a merge request and integrate its current patch
    Integrate {
        #[command(flatten)]
        auth: TokenArg,

        /// Merge request ID
        id: u64,

        /// Print the integration log when done
        #[arg(long)]
        log: bool,
    },

    /// Abandon a merge request
    Abandon {
        #[command(flatten)]
        auth: TokenArg,

        /// Merge request ID
        id: u64,

        /// Don't ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Change the target branch of a merge request
    Retarget {
        #[command(flatten)]
        auth: TokenArg,

        /// Merge request ID
        id: u64,

        /// New target branch
        branch: String,
    },

    /// Push the current patch to its CI branch
    CiPush {
        #[command(flatten)]
        auth: TokenArg,

        /// Merge request ID
        id: u64,
    },

    /// Show the CI build status of the current patch
    CiStatus {
        #[command(flatten)]
        auth: TokenArg,

        /// Merge request ID
        id: u64,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user and print their API token
    Add {
        /// Display name
        name: String,
        /// Email address
        email: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    Add {
        /// Project name
        name: String,
        /// Upstream clone URL
        repository_url: String,
        /// CI access token
        #[arg(long, requires = "ci_url")]
        ci_token: Option<String>,
        /// CI project base URL
        #[arg(long, requires = "ci_token")]
        ci_url: Option<String>,
    },

    /// Grant a user access to a project
    AddMember {
        /// Project ID
        project: u64,
        /// User ID
        user: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFilter {
    All,
    Pending,
    Closed,
}

impl From<ListFilter> for MergeRequestFilter {
    fn from(filter: ListFilter) -> Self {
        match filter {
            ListFilter::All => Self::All,
            ListFilter::Pending => Self::Pending,
            ListFilter::Closed => Self::Closed,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "reviewit=debug" } else { "reviewit=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "Error:".warn());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = CommandContext::new(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::User {
            command: UserCommands::Add { name, email },
        } => cli::run_user_add(&ctx, &name, &email).await,
        Commands::Project { command } => match command {
            ProjectCommands::Add {
                name,
                repository_url,
                ci_token,
                ci_url,
            } => {
                cli::run_project_add(
                    &ctx,
                    ProjectOptions {
                        name,
                        repository_url,
                        ci_token,
                        ci_project_url: ci_url,
                    },
                )
                .await
            }
            ProjectCommands::AddMember { project, user } => {
                cli::run_add_member(&ctx, project, user).await
            }
        },
        Commands::Push {
            auth,
            project,
            target,
            description,
            linter_ok,
            repo,
        } => {
            cli::run_push(
                &ctx,
                auth.token.as_deref(),
                PushOptions {
                    repo,
                    project_id: project,
                    target_branch: target,
                    description,
                    linter_ok,
                },
            )
            .await
        }
        Commands::List {
            auth,
            project,
            filter,
        } => cli::run_list(&ctx, auth.token.as_deref(), project, filter.into()).await,
        Commands::Show { auth, id, log } => {
            cli::run_show(&ctx, auth.token.as_deref(), id, log).await
        }
        Commands::Integrate { auth, id, log } => {
            cli::run_integrate(&ctx, auth.token.as_deref(), id, log).await
        }
        Commands::Abandon { auth, id, yes } => {
            cli::run_abandon(&ctx, auth.token.as_deref(), id, yes).await
        }
        Commands::Retarget { auth, id, branch } => {
            cli::run_retarget(&ctx, auth.token.as_deref(), id, &branch).await
        }
        Commands::CiPush { auth, id } => cli::run_ci_push(&ctx, auth.token.as_deref(), id).await,
        Commands::CiStatus { auth, id } => {
            cli::run_ci_status(&ctx, auth.token.as_deref(), id).await
        }
    }
}
