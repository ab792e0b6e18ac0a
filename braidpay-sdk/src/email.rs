//! Email-shape validation used before a payment attempt is registered.
//!
//! The grammar is deliberately conservative: a dot-separated local part with
//! no whitespace or special characters (or a quoted local part), and a domain
//! that is either a bracketed IPv4 literal or at least two labels ending in an
//! alphabetic TLD of two or more letters.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("EMAIL_REGEX: invalid regex pattern")
});

/// Returns `true` when `email` has a plausible `local@domain` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        assert!(is_valid_email("buyer@example.com"));
        assert!(is_valid_email("first.last@sub.example.co.uk"));
        assert!(is_valid_email("first+tag@example.io"));
        assert!(is_valid_email("\"odd name\"@example.com"));
        assert!(is_valid_email("user@[192.168.0.1]"));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@example.c"));
        assert!(!is_valid_email("user name@example.com"));
        assert!(!is_valid_email(".user@example.com"));
        assert!(!is_valid_email("user..dots@example.com"));
        assert!(!is_valid_email("user@example..com"));
    }
}
