//! Pure nickname rules: deriving a base from an identity and building probe candidates.

use crate::constants::user::{FALLBACK_NICKNAME, NICKNAME_MAX_LEN};

/// Derives the base nickname for a first-time login.
///
/// The provider's display-name hint wins when present; otherwise the local part of the
/// email is used. Whitespace is stripped since nicknames end up in URLs.
#[must_use]
pub fn base_nickname(hint: Option<&str>, email: &str) -> String {
    let raw = hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| email_local_part(email));

    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        FALLBACK_NICKNAME.to_string()
    } else {
        truncate_chars(&cleaned, NICKNAME_MAX_LEN)
    }
}

/// Text before the first `@`, or the whole string when there is none.
#[must_use]
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Candidate for the given probe suffix, shortening the base so the result fits the column.
#[must_use]
pub fn with_suffix(base: &str, suffix: u32) -> String {
    let suffix = suffix.to_string();
    let room = NICKNAME_MAX_LEN.saturating_sub(suffix.len());
    format!("{}{suffix}", truncate_chars(base, room))
}

#[must_use]
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[must_use]
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_takes_precedence_over_email() {
        assert_eq!(base_nickname(Some("john"), "someone@example.com"), "john");
    }

    #[test]
    fn falls_back_to_email_local_part() {
        assert_eq!(base_nickname(None, "susan@example.com"), "susan");
        assert_eq!(base_nickname(Some(""), "susan@example.com"), "susan");
        assert_eq!(base_nickname(Some("   "), "susan@example.com"), "susan");
    }

    #[test]
    fn strips_whitespace_from_display_names() {
        assert_eq!(base_nickname(Some("John Smith"), "js@example.com"), "JohnSmith");
    }

    #[test]
    fn empty_local_part_uses_fallback() {
        assert_eq!(base_nickname(None, "@example.com"), FALLBACK_NICKNAME);
    }

    #[test]
    fn suffix_keeps_candidate_within_limit() {
        assert_eq!(with_suffix("john", 2), "john2");

        let long = "x".repeat(NICKNAME_MAX_LEN);
        let candidate = with_suffix(&long, 123);
        assert_eq!(char_len(&candidate), NICKNAME_MAX_LEN);
        assert!(candidate.ends_with("123"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
