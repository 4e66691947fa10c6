//! Prompt-payload sanitizer.
//!
//! User-provided free text is embedded into prompts verbatim, so control
//! characters and newline runs are stripped first. The cleaned text is what
//! gets hashed for provenance.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum accepted size for any single user text (job postings cap lower).
pub const MAX_TEXT_LEN: usize = 40 * 1024;

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip control characters, collapse all whitespace (including newlines)
/// into single spaces, trim, and cap length.
pub fn sanitize_text(raw: &str) -> String {
    let without_ctrl: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == ' ' || c.is_whitespace())
        .collect();
    let collapsed = whitespace_runs().replace_all(&without_ctrl, " ");
    let trimmed = collapsed.trim();
    trimmed.chars().take(MAX_TEXT_LEN).collect()
}
