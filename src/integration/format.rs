//! Patch formatting for `git am`
//!
//! The output is mbox-like text that `git am` parses byte-for-byte, so the
//! layout here is exact: header lines, a blank line, the indented commit
//! message, the optional reviewer stamp, the raw diff, and a signature.

use crate::types::{Identity, MergeRequest, Patch};

/// `strftime` layout of the `Date:` header
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Formatted input for `git am`, tied to the patch it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPatch {
    /// ID of the formatted patch
    pub patch_id: u64,
    /// Text to feed to `git am`
    pub text: String,
}

/// Format the current patch of `mr`.
///
/// Returns `None` when the request has no patches.
pub fn format_patch(mr: &MergeRequest) -> Option<FormattedPatch> {
    let patch = mr.current_patch()?;
    Some(FormattedPatch {
        patch_id: patch.id,
        text: render(patch, &mr.author, mr.reviewer.as_ref(), mr.id),
    })
}

/// Render `patch` with the given author and reviewer
pub fn render(patch: &Patch, author: &Identity, reviewer: Option<&Identity>, mr_id: u64) -> String {
    let reviewer_stamp = reviewer
        .map(|r| format!("\nReviewed by {} on MR #{mr_id}\n", r.name))
        .unwrap_or_default();

    format!(
        "From: {} <{}>\nDate: {}\n\n{}\n{}\n{}\n--\nreview it!\n",
        author.name,
        author.email,
        patch.created_at.format(DATE_FORMAT),
        indent(&patch.commit_message),
        indent(&reviewer_stamp),
        patch.diff,
    )
}

/// Prefix every line (including empty ones) with four spaces
fn indent(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| format!("    {line}"))
        .collect()
}
