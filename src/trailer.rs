//! Commit trailer linking a local commit to its merge request
//!
//! A commit whose message carries `Rme-MR-id: <id>` updates that merge
//! request when pushed; a commit without one creates a new request and is
//! amended to carry its id.

use regex::Regex;
use std::sync::LazyLock;

/// Trailer key
pub const TRAILER_KEY: &str = "Rme-MR-id";

static TRAILER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Rme-MR-id: (\d+)$").expect("valid trailer regex"));

/// Merge request ID carried by `message`, if any
pub fn find_merge_request_id(message: &str) -> Option<u64> {
    TRAILER
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `message` with a trailer for `mr_id` appended
pub fn append_merge_request_id(message: &str, mr_id: u64) -> String {
    format!("{message}\n\n{TRAILER_KEY}: {mr_id}\n")
}
