//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Vendor addresses, storage paths, and webhook URLs appear in spans and
//! logs only in redacted form.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the local part of a mail address, keeping its first character and
/// the domain.
///
/// - `alice@example.com` → `a***@example.com`
/// - `not-an-address` → `***`
pub fn redact_address(address: &str) -> String {
    match address.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

/// Strips userinfo and the query string from a URL.
///
/// - `https://user:pw@hooks.example.com/x?token=abc` → `https://****@hooks.example.com/x`
pub fn redact_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let after_scheme = &without_query[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..authority_end].rfind('@') {
            let scheme = &without_query[..scheme_end + 3];
            return format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    without_query.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/var/lib/rfp/attachments/1700000000000_quote.pdf")),
            "1700000000000_quote.pdf"
        );
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_address() {
        assert_eq!(redact_address("alice@example.com"), "a***@example.com");
        assert_eq!(redact_address(" Bob@X.com "), "B***@X.com");
        assert_eq!(redact_address("not-an-address"), "***");
        assert_eq!(redact_address("@example.com"), "***");
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://user:pw@hooks.example.com/x?token=abc"),
            "https://****@hooks.example.com/x"
        );
        assert_eq!(
            redact_url("https://hooks.example.com/x?token=abc"),
            "https://hooks.example.com/x"
        );
        assert_eq!(
            redact_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1"
        );
    }
}
