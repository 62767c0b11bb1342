//! Merge, order and filter canonical match lists.
//!
//! Every provider funnels its normalized matches through [`assemble`], which
//! applies the same dedup, staleness, ordering and upcoming-window rules to
//! every sport.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{CanonicalMatch, ProviderResult};

/// Maximum number of labels offered when a lookup finds nothing.
pub const MAX_SUGGESTIONS: usize = 20;

/// Time windows shared by all providers.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindows {
    /// How far ahead a scheduled match still counts as upcoming
    pub upcoming: Duration,
    /// Non-live matches that started longer ago than this are dropped
    pub stale_cutoff: Duration,
}

impl Default for TimeWindows {
    fn default() -> Self {
        TimeWindows {
            upcoming: Duration::hours(12),
            stale_cutoff: Duration::hours(6),
        }
    }
}

/// Live matches first, then ascending start time, unknown starts last.
pub fn compare_matches(a: &CanonicalMatch, b: &CanonicalMatch) -> Ordering {
    let live_rank = |m: &CanonicalMatch| if m.is_live() { 0u8 } else { 1u8 };
    live_rank(a)
        .cmp(&live_rank(b))
        .then_with(|| a.start_sort_key().cmp(&b.start_sort_key()))
}

/// Stable sort with [`compare_matches`].
pub fn sort_matches(games: &mut [CanonicalMatch]) {
    games.sort_by(compare_matches);
}

/// Collapse entries sharing a `match_id`. The last occurrence wins, placed
/// where the id was first seen.
pub fn dedup_by_id(games: Vec<CanonicalMatch>) -> Vec<CanonicalMatch> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CanonicalMatch> = Vec::with_capacity(games.len());
    for game in games {
        match position.get(&game.match_id) {
            Some(&idx) => out[idx] = game,
            None => {
                position.insert(game.match_id.clone(), out.len());
                out.push(game);
            }
        }
    }
    out
}

/// A non-live match whose start is older than the cutoff is stale.
/// Matches with an unknown start are kept.
pub fn is_stale(game: &CanonicalMatch, now: DateTime<Utc>, cutoff: Duration) -> bool {
    if game.is_live() {
        return false;
    }
    match game.start_time {
        Some(start) => start < now - cutoff,
        None => false,
    }
}

pub fn drop_stale(games: Vec<CanonicalMatch>, now: DateTime<Utc>, cutoff: Duration) -> Vec<CanonicalMatch> {
    games
        .into_iter()
        .filter(|g| !is_stale(g, now, cutoff))
        .collect()
}

/// Known start within `[now, now + window]`.
pub fn in_upcoming_window(game: &CanonicalMatch, now: DateTime<Utc>, window: Duration) -> bool {
    match game.start_time {
        Some(start) => start >= now && start <= now + window,
        None => false,
    }
}

/// Sorted subset of `games` that starts within the window.
pub fn upcoming(games: &[CanonicalMatch], now: DateTime<Utc>, window: Duration) -> Vec<CanonicalMatch> {
    let mut soon: Vec<CanonicalMatch> = games
        .iter()
        .filter(|g| in_upcoming_window(g, now, window))
        .cloned()
        .collect();
    sort_matches(&mut soon);
    soon
}

/// Dedup, drop stale, sort and derive `upcoming`.
pub fn assemble(
    games: Vec<CanonicalMatch>,
    now: DateTime<Utc>,
    windows: TimeWindows,
    warning: Option<String>,
) -> ProviderResult {
    let mut games = drop_stale(dedup_by_id(games), now, windows.stale_cutoff);
    sort_matches(&mut games);
    let upcoming = upcoming(&games, now, windows.upcoming);
    ProviderResult {
        games,
        upcoming,
        warning,
    }
}

/// Sanity check for sources prone to serving frozen payloads: at least one
/// match must be live or start within `[now - stale cutoff, now + upcoming]`.
pub fn looks_fresh(games: &[CanonicalMatch], now: DateTime<Utc>, windows: TimeWindows) -> bool {
    games.iter().any(|g| {
        g.is_live()
            || g.start_time.is_some_and(|start| {
                start >= now - windows.stale_cutoff && start <= now + windows.upcoming
            })
    })
}

/// Lowercased, trimmed query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Generic lookup: exact id, then every query token contained in
/// `match_id label league`. An empty query selects the top of the list.
pub fn pick_by_query(games: &[CanonicalMatch], query: &str) -> Option<CanonicalMatch> {
    let q = normalize_query(query);
    if q.is_empty() {
        return games.first().cloned();
    }
    if let Some(exact) = games.iter().find(|g| g.match_id.to_lowercase() == q) {
        return Some(exact.clone());
    }
    games
        .iter()
        .find(|g| {
            contains_all_tokens(&format!("{} {} {}", g.match_id, g.label, g.league), &q)
        })
        .cloned()
}

/// AND semantics: every whitespace-separated query token must appear.
pub fn contains_all_tokens(haystack: &str, query: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let mut tokens = query.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return false;
    }
    tokens.all(|t| haystack.contains(&t.to_lowercase()))
}

/// Labels offered back to the client when a lookup fails.
pub fn suggestions(games: &[CanonicalMatch]) -> Vec<String> {
    games
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|g| g.label.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchStatus;

    fn game(id: &str, status: MatchStatus, start_offset_mins: Option<i64>, now: DateTime<Utc>) -> CanonicalMatch {
        let mut m = CanonicalMatch::new(id, format!("{id} vs other"), "Test League");
        m.status = status;
        m.start_time = start_offset_mins.map(|mins| now + Duration::minutes(mins));
        m
    }

    #[test]
    fn test_live_first_then_soonest() {
        let now = Utc::now();
        let mut games = vec![
            game("a", MatchStatus::Scheduled, Some(120), now),
            game("b", MatchStatus::Live, Some(60), now),
            game("c", MatchStatus::Scheduled, Some(60), now),
        ];
        sort_matches(&mut games);
        let ids: Vec<_> = games.iter().map(|g| g.match_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_unknown_start_sorts_last_and_sort_is_stable() {
        let now = Utc::now();
        let mut games = vec![
            game("x", MatchStatus::Scheduled, None, now),
            game("y", MatchStatus::Scheduled, None, now),
            game("z", MatchStatus::Scheduled, Some(30), now),
        ];
        sort_matches(&mut games);
        let ids: Vec<_> = games.iter().map(|g| g.match_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "x", "y"]);
    }

    #[test]
    fn test_dedup_last_write_wins() {
        let now = Utc::now();
        let first = game("dup", MatchStatus::Scheduled, Some(10), now);
        let mut second = game("dup", MatchStatus::Live, Some(10), now);
        second.score = Some("1-0".into());
        let out = dedup_by_id(vec![first, game("other", MatchStatus::Scheduled, None, now), second]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].match_id, "dup");
        assert_eq!(out[0].score.as_deref(), Some("1-0"));
    }

    #[test]
    fn test_stale_non_live_dropped_but_live_kept() {
        let now = Utc::now();
        let cutoff = Duration::hours(6);
        let games = vec![
            game("old", MatchStatus::Scheduled, Some(-7 * 60), now),
            game("old-live", MatchStatus::Live, Some(-7 * 60), now),
            game("unknown", MatchStatus::Scheduled, None, now),
            game("recent", MatchStatus::Final, Some(-60), now),
        ];
        let ids: Vec<_> = drop_stale(games, now, cutoff)
            .into_iter()
            .map(|g| g.match_id)
            .collect();
        assert_eq!(ids, vec!["old-live", "unknown", "recent"]);
    }

    #[test]
    fn test_upcoming_window_bounds() {
        let now = Utc::now();
        let window = Duration::hours(12);
        let games = vec![
            game("past", MatchStatus::Scheduled, Some(-5), now),
            game("soon", MatchStatus::Scheduled, Some(90), now),
            game("later", MatchStatus::Scheduled, Some(13 * 60), now),
            game("unknown", MatchStatus::Scheduled, None, now),
            game("sooner", MatchStatus::Scheduled, Some(30), now),
        ];
        let ids: Vec<_> = upcoming(&games, now, window)
            .into_iter()
            .map(|g| g.match_id)
            .collect();
        assert_eq!(ids, vec!["sooner", "soon"]);
    }

    #[test]
    fn test_assemble_upcoming_is_subset_of_games() {
        let now = Utc::now();
        let result = assemble(
            vec![
                game("a", MatchStatus::Scheduled, Some(30), now),
                game("a", MatchStatus::Scheduled, Some(45), now),
                game("b", MatchStatus::Live, Some(-30), now),
                game("c", MatchStatus::Scheduled, Some(-10 * 60), now),
            ],
            now,
            TimeWindows::default(),
            None,
        );
        let ids: Vec<_> = result.games.iter().map(|g| g.match_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(result.upcoming.iter().all(|u| result.games.contains(u)));
        assert_eq!(result.upcoming.len(), 1);
        assert_eq!(result.upcoming[0].start_time, Some(now + Duration::minutes(45)));
    }

    #[test]
    fn test_looks_fresh() {
        let now = Utc::now();
        let windows = TimeWindows::default();
        let frozen = vec![
            game("a", MatchStatus::Scheduled, Some(-3 * 24 * 60), now),
            game("b", MatchStatus::Scheduled, None, now),
        ];
        assert!(!looks_fresh(&frozen, now, windows));
        assert!(looks_fresh(&[game("c", MatchStatus::Scheduled, Some(60), now)], now, windows));
        assert!(looks_fresh(&[game("d", MatchStatus::Live, None, now)], now, windows));
        assert!(!looks_fresh(&[], now, windows));
    }

    #[test]
    fn test_pick_empty_query_returns_first() {
        let now = Utc::now();
        let games = vec![game("a", MatchStatus::Live, None, now), game("b", MatchStatus::Scheduled, None, now)];
        assert_eq!(pick_by_query(&games, "  ").map(|g| g.match_id), Some("a".to_string()));
        assert_eq!(pick_by_query(&[], ""), None);
    }

    #[test]
    fn test_pick_requires_all_tokens() {
        let now = Utc::now();
        let mut americas = game("1", MatchStatus::Scheduled, None, now);
        americas.label = "Sentinels vs LOUD".into();
        americas.league = "VCT Americas".into();
        let mut emea = game("2", MatchStatus::Scheduled, None, now);
        emea.label = "Fnatic vs Team Heretics".into();
        emea.league = "VCT EMEA".into();
        let mut other_americas = game("3", MatchStatus::Scheduled, None, now);
        other_americas.label = "Americas Cup Qualifier".into();
        other_americas.league = "Community".into();
        let games = vec![emea, other_americas, americas];

        let hit = pick_by_query(&games, "VCT Americas").unwrap();
        assert_eq!(hit.match_id, "1");
        assert!(pick_by_query(&games, "vct pacific").is_none());
    }

    #[test]
    fn test_pick_exact_id_first() {
        let now = Utc::now();
        let mut a = game("12", MatchStatus::Scheduled, None, now);
        a.label = "Team 123 vs X".into();
        let b = game("123", MatchStatus::Scheduled, None, now);
        assert_eq!(pick_by_query(&[a, b], "123").unwrap().match_id, "123");
    }

    #[test]
    fn test_suggestions_capped() {
        let now = Utc::now();
        let games: Vec<_> = (0..30)
            .map(|i| game(&i.to_string(), MatchStatus::Scheduled, None, now))
            .collect();
        assert_eq!(suggestions(&games).len(), MAX_SUGGESTIONS);
    }
}
