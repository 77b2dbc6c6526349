//! CLI command implementations

pub mod admin;
pub mod context;
pub mod push;
pub mod review;
pub mod show;
pub mod style;

pub use admin::{ProjectOptions, run_add_member, run_project_add, run_user_add};
pub use context::CommandContext;
pub use push::{PushOptions, run_push};
pub use review::{run_abandon, run_ci_push, run_ci_status, run_integrate, run_retarget};
pub use show::{run_list, run_show};
