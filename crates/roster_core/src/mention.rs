//! Email mention parsing for notification text.
//!
//! # Responsibility
//! - Extract `@email` mentions from free text.
//! - Provide the shared email-shape check used by request validation.
//!
//! # Invariants
//! - Extraction is pure and never fails; unmatched input yields an empty list.
//! - Extracted mentions keep first-occurrence order with duplicates removed;
//!   addresses differing only in ASCII case count as duplicates.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})").expect("valid mention regex")
});
static EMAIL_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

/// Extracts email addresses mentioned as `@address` in `text`.
///
/// Rules:
/// - A mention is `@` immediately followed by an email-shaped token.
/// - The leading sigil is stripped from the returned values.
/// - Repeated mentions are reported once, at their first position and in
///   their first spelling. Repeats are matched ignoring ASCII case.
pub fn extract_mentioned_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut emails = Vec::new();
    for caps in EMAIL_MENTION_RE.captures_iter(text) {
        let Some(address) = caps.get(1) else {
            continue;
        };
        if seen.insert(address.as_str().to_ascii_lowercase()) {
            emails.push(address.as_str().to_string());
        }
    }
    emails
}

/// Returns whether the trimmed `value` is a single email-shaped address.
pub fn is_email_address(value: &str) -> bool {
    EMAIL_ADDRESS_RE.is_match(value.trim())
}
