//! Heuristic extraction of proposal fields from free-text email bodies.
//!
//! Every extractor is independent and returns `None` when its label is not
//! found or the captured number does not parse.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Characters of body text kept as the fallback approach summary.
pub const APPROACH_LIMIT: usize = 1000;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:price|cost|budget)[:\s]*\$?\s*([0-9,]+)").expect("valid price regex")
});

static TIMELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:timeline|duration|time)[:\s]*([0-9]+)\s*(days|weeks|months)")
        .expect("valid timeline regex")
});

static EXPERIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:experience|years)[:\s]*([0-9]+)\s*(?:years?)")
        .expect("valid experience regex")
});

static TEAM_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:team size|members)[:\s]*([0-9]+)").expect("valid team size regex")
});

/// Candidate proposal fields found in a message body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub proposed_price: Option<f64>,
    pub timeline: Option<String>,
    pub experience: Option<String>,
    pub team_size: Option<u32>,
    pub approach: Option<String>,
}

/// Runs every extractor over `text`.
pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        proposed_price: extract_price(text),
        timeline: extract_timeline(text),
        experience: extract_experience(text),
        team_size: extract_team_size(text),
        approach: approach_summary(text),
    }
}

/// A number after a price, cost, or budget label, thousands separators removed.
pub fn extract_price(text: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(text)?;
    let digits: String = caps.get(1)?.as_str().chars().filter(|c| *c != ',').collect();
    digits.parse::<f64>().ok()
}

/// A quantity and unit after a timeline, duration, or time label, e.g. `"6 weeks"`.
pub fn extract_timeline(text: &str) -> Option<String> {
    let caps = TIMELINE_RE.captures(text)?;
    let quantity = caps.get(1)?.as_str();
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("days");
    Some(format!("{} {}", quantity, unit))
}

/// Years of experience, rendered as `"<n> years"`.
pub fn extract_experience(text: &str) -> Option<String> {
    let caps = EXPERIENCE_RE.captures(text)?;
    Some(format!("{} years", caps.get(1)?.as_str()))
}

/// A number after a team size or members label.
pub fn extract_team_size(text: &str) -> Option<u32> {
    let caps = TEAM_SIZE_RE.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// The first [`APPROACH_LIMIT`] characters of the body, if any.
pub fn approach_summary(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, APPROACH_LIMIT))
}

/// Truncates to at most `limit` characters on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_strips_thousands_separators() {
        assert_eq!(extract_price("Proposed price: $12,500"), Some(12500.0));
        assert_eq!(extract_price("Total COST 1,250,000 USD"), Some(1_250_000.0));
        assert_eq!(extract_price("budget:$ 900"), Some(900.0));
    }

    #[test]
    fn test_price_absent() {
        assert_eq!(extract_price("We look forward to working with you."), None);
        // A label followed only by separators yields no number.
        assert_eq!(extract_price("price: ,,,"), None);
    }

    #[test]
    fn test_timeline() {
        assert_eq!(extract_timeline("Timeline: 6 weeks"), Some("6 weeks".to_string()));
        assert_eq!(
            extract_timeline("Estimated duration 3 months"),
            Some("3 months".to_string())
        );
        assert_eq!(extract_timeline("Timeline: soon"), None);
    }

    #[test]
    fn test_experience_and_team_size() {
        assert_eq!(
            extract_experience("Experience: 12 years in web"),
            Some("12 years".to_string())
        );
        assert_eq!(extract_experience("years: 1 year"), Some("1 years".to_string()));
        assert_eq!(extract_team_size("Team size: 5 engineers"), Some(5));
        assert_eq!(extract_team_size("members 8"), Some(8));
        assert_eq!(extract_team_size("a small team"), None);
    }

    #[test]
    fn test_extract_fields_is_independent_per_field() {
        let fields = extract_fields("Hello,\nProposed price: $12,500\nThanks");
        assert_eq!(fields.proposed_price, Some(12500.0));
        assert_eq!(fields.timeline, None);
        assert_eq!(fields.experience, None);
        assert_eq!(fields.team_size, None);
        assert!(fields.approach.unwrap().starts_with("Hello"));
    }

    #[test]
    fn test_approach_is_truncated() {
        let long = "é".repeat(APPROACH_LIMIT + 50);
        let approach = approach_summary(&long).unwrap();
        assert_eq!(approach.chars().count(), APPROACH_LIMIT);
        assert_eq!(approach_summary("   "), None);
    }
}
