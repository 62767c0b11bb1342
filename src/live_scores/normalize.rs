//! Helpers shared by every per-source normalizer.
//!
//! Upstream status vocabularies are inconsistent and undocumented, so status
//! classification is a single token-list classifier instead of per-source
//! string matching. Timestamp parsing is best effort: anything unrecognised
//! becomes `None` ("unknown start") rather than an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::MatchStatus;

/// Phrases that mark a match as finished. Checked before the live list, so
/// "completed (live stats)" style strings read as finished.
pub const FINAL_TOKENS: &[&str] = &[
    "final", "completed", "complete", "finished", "ended", "over", "postgame",
];

/// Phrases that mark a match as in progress.
pub const LIVE_TOKENS: &[&str] = &[
    "live", "in progress", "inprogress", "ongoing", "halftime", "half time",
];

/// Phrases that mark a match as not yet started.
pub const SCHEDULED_TOKENS: &[&str] = &[
    "scheduled", "upcoming", "unstarted", "not started", "pre", "pregame", "tbd",
];

/// Classify a free-text upstream status.
pub fn classify_status(text: &str) -> MatchStatus {
    let words = normalize_words(text);
    if words.is_empty() {
        return MatchStatus::Unknown;
    }
    let padded = format!(" {} ", words);
    let has = |tokens: &[&str]| tokens.iter().any(|t| padded.contains(&format!(" {} ", t)));

    if has(FINAL_TOKENS) {
        MatchStatus::Final
    } else if has(LIVE_TOKENS) {
        MatchStatus::Live
    } else if has(SCHEDULED_TOKENS) {
        MatchStatus::Scheduled
    } else {
        MatchStatus::Unknown
    }
}

/// Lowercase, split camelCase-free punctuation into single spaces:
/// "STATUS_IN_PROGRESS" → "status in progress".
pub fn normalize_words(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a JSON timestamp that may be an epoch number or a date string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Parse a timestamp string.
///
/// Accepts epoch seconds or millis (numbers above 1e11 are millis), RFC 3339,
/// ESPN's minute-precision `2024-01-15T00:30Z`, naive date-times (taken as
/// UTC) and bare dates (midnight UTC).
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%MZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    let millis = if n > 1e11 { n } else { n * 1000.0 };
    if millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// "Team Liquid" → "team-liquid".
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Deterministic id for upstreams that do not expose one, so the same
/// unfinished match collapses to one record across polls.
pub fn fallback_match_id(team_a: &str, team_b: &str) -> String {
    format!("{}-vs-{}", slugify(team_a), slugify(team_b))
}

/// First non-empty string among the JSON values, trimmed.
pub fn first_text<'a>(candidates: impl IntoIterator<Item = Option<&'a Value>>) -> Option<String> {
    candidates.into_iter().flatten().find_map(value_text)
}

/// String or number rendered as text; empty strings count as missing.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_classify_live_variants() {
        for s in ["Live", "in progress", "inProgress", "STATUS_IN_PROGRESS", "ongoing", "Halftime", "LIVE NOW"] {
            assert_eq!(classify_status(s), MatchStatus::Live, "{s}");
        }
    }

    #[test]
    fn test_classify_final_variants() {
        for s in ["Final", "Final/OT", "completed", "Match ended", "Game over", "FINISHED"] {
            assert_eq!(classify_status(s), MatchStatus::Final, "{s}");
        }
    }

    #[test]
    fn test_classify_scheduled_and_unknown() {
        assert_eq!(classify_status("unstarted"), MatchStatus::Scheduled);
        assert_eq!(classify_status("Not Started"), MatchStatus::Scheduled);
        assert_eq!(classify_status("Upcoming"), MatchStatus::Scheduled);
        assert_eq!(classify_status("7:30 pm ET"), MatchStatus::Unknown);
        assert_eq!(classify_status(""), MatchStatus::Unknown);
    }

    #[test]
    fn test_classify_matches_whole_words_only() {
        // "overtime" must not read as "over", "delivered" must not read as "live"
        assert_eq!(classify_status("overtime"), MatchStatus::Unknown);
        assert_eq!(classify_status("delivered"), MatchStatus::Unknown);
    }

    #[test]
    fn test_final_wins_over_live() {
        assert_eq!(classify_status("completed (was live)"), MatchStatus::Final);
    }

    #[test]
    fn test_parse_epoch_seconds_and_millis() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 0, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&json!(1705278600)), Some(expected));
        assert_eq!(parse_timestamp(&json!(1705278600000i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("1705278600")), Some(expected));
    }

    #[test]
    fn test_parse_date_strings() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 0, 30, 0).unwrap();
        assert_eq!(parse_timestamp_str("2024-01-15T00:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp_str("2024-01-14T19:30:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp_str("2024-01-15T00:30Z"), Some(expected));
        assert_eq!(parse_timestamp_str("2024-01-15 00:30:00"), Some(expected));
        assert_eq!(parse_timestamp_str("2024-01-15T00:30:00.000"), Some(expected));
        assert_eq!(
            parse_timestamp_str("2024-01-15"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_garbage_is_unknown() {
        assert_eq!(parse_timestamp_str("tomorrow-ish"), None);
        assert_eq!(parse_timestamp_str(""), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!(-5)), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
        assert_eq!(parse_timestamp(&json!(1e300)), None);
    }

    #[test]
    fn test_fallback_match_id_is_deterministic() {
        assert_eq!(fallback_match_id("Team Liquid", "G2 Esports"), "team-liquid-vs-g2-esports");
        assert_eq!(
            fallback_match_id("Team Liquid", "G2 Esports"),
            fallback_match_id("team liquid ", "G2  esports")
        );
    }

    #[test]
    fn test_first_text_skips_blanks() {
        let v = json!({"a": "", "b": 42, "c": "x"});
        assert_eq!(first_text([v.get("a"), v.get("missing"), v.get("b")]), Some("42".into()));
    }
}
