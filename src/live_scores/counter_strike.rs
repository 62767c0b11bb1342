//! Counter-Strike matches from community HLTV JSON mirrors, tried in order.
//!
//! The mirrors are unofficial and drift apart in shape, and a mirror whose
//! scraper died keeps serving the last payload it saw. Items are therefore
//! walked loosely and every payload has to pass a freshness check before it
//! is trusted.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde_json::Value;
use tracing::info;
use url::Url;

use super::aggregate::{assemble, drop_stale, looks_fresh};
use super::combinator::{describe_failures, first_usable, Attempt, SourceFailure};
use super::fetcher::SourceFetcher;
use super::normalize::{classify_status, fallback_match_id, first_text, parse_timestamp, value_text};
use super::placeholder::degraded;
use super::provider::{ProviderSettings, SportProvider};
use crate::models::{CanonicalMatch, MatchStatus, ProviderResult, Sport};

pub const HLTV_MIRRORS: &[&str] = &[
    "https://hltv-api-steel.vercel.app/api/matches",
    "https://hltv-api.vercel.app/api/matches.json",
    "https://csgo-hltv-api.vercel.app/api/matches",
];

/// Keys that may carry the start time, most precise first.
const TIME_KEYS: &[&str] = &["date_unix", "unix", "time", "startTime", "date"];

/// Name of one side: `team1: {name}`, `team1: "name"` or `teams[i].name`.
fn side_name(item: &Value, key: &str, index: usize) -> String {
    let field = item.get(key);
    first_text([
        field.and_then(|t| t.get("name")),
        field,
        item.get("teams").and_then(|t| t.get(index)).and_then(|t| t.get("name")),
    ])
    .unwrap_or_else(|| "TBD".to_string())
}

fn side_score(item: &Value, key: &str, index: usize) -> Option<u32> {
    [
        item.get(key).and_then(|t| t.get("score")),
        item.get("teams").and_then(|t| t.get(index)).and_then(|t| t.get("score")),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| value_text(v).and_then(|s| s.parse().ok()))
}

fn normalize_cs_item(item: &Value, now: DateTime<Utc>) -> CanonicalMatch {
    let team_a = side_name(item, "team1", 0);
    let team_b = side_name(item, "team2", 1);

    let start_time = TIME_KEYS
        .iter()
        .filter_map(|k| item.get(*k))
        .find(|v| !v.is_null() && value_text(v).is_some())
        .and_then(parse_timestamp);

    let flagged_live = item.get("live").and_then(Value::as_bool).unwrap_or(false);
    let status_text = value_text(item.get("status").unwrap_or(&Value::Null));
    let classified = classify_status(status_text.as_deref().unwrap_or_default());
    let status = match classified {
        MatchStatus::Final => MatchStatus::Final,
        _ if flagged_live => MatchStatus::Live,
        MatchStatus::Unknown => MatchStatus::Scheduled,
        other => other,
    };

    let match_id = value_text(item.get("id").unwrap_or(&Value::Null))
        .unwrap_or_else(|| fallback_match_id(&team_a, &team_b));
    let league = first_text([
        item.get("event").and_then(|e| e.get("name")),
        item.get("event"),
        item.get("tournament"),
    ])
    .unwrap_or_else(|| "Counter-Strike".to_string());

    let mut game = CanonicalMatch::new(match_id, format!("{team_a} vs {team_b}"), league);
    game.status = status;
    game.status_text = status_text.or_else(|| flagged_live.then(|| "Live".to_string()));
    game.start_time = start_time;
    if status == MatchStatus::Live {
        game.score = match (side_score(item, "team1", 0), side_score(item, "team2", 1)) {
            (Some(a), Some(b)) => Some(format!("{a}-{b}")),
            _ => None,
        };
    }
    game.last_updated = now;
    game
}

/// Host of a mirror URL, for warnings and logs.
fn mirror_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

pub struct CounterStrikeProvider {
    fetcher: SourceFetcher,
    mirrors: Vec<String>,
    settings: ProviderSettings,
}

impl CounterStrikeProvider {
    pub fn new(fetcher: SourceFetcher, mirrors: Vec<String>, settings: ProviderSettings) -> Self {
        CounterStrikeProvider {
            fetcher,
            mirrors,
            settings,
        }
    }

    async fn from_mirror(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<CanonicalMatch>, SourceFailure> {
        let name = mirror_name(url);
        let payload: Value = self
            .fetcher
            .fetch_json(url, &self.fetcher.options())
            .await
            .map_err(|e| SourceFailure::new(&name, e))?;

        let items: &[Value] = match &payload {
            Value::Array(items) => items,
            other => other
                .get("matches")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };
        let games: Vec<CanonicalMatch> = items
            .iter()
            .map(|item| normalize_cs_item(item, now))
            .filter(|g| g.status != MatchStatus::Final)
            .collect();
        let games = drop_stale(games, now, self.settings.windows.stale_cutoff);

        if games.is_empty() {
            return Err(SourceFailure::new(&name, "no current matches"));
        }
        if !looks_fresh(&games, now, self.settings.windows) {
            return Err(SourceFailure::new(&name, "payload looks frozen"));
        }
        Ok(games)
    }
}

#[async_trait]
impl SportProvider for CounterStrikeProvider {
    fn sport(&self) -> Sport {
        Sport::Csgo
    }

    fn name(&self) -> &str {
        "HLTV mirrors"
    }

    async fn get_data(&self) -> Result<ProviderResult> {
        let now = Utc::now();
        let windows = self.settings.windows;
        let attempts: Vec<Attempt<'_, Vec<CanonicalMatch>>> = self
            .mirrors
            .iter()
            .map(|url| self.from_mirror(url, now).boxed())
            .collect();

        match first_usable(attempts).await {
            Ok(settled) => {
                let warning = (settled.rank > 0).then(|| {
                    let used = mirror_name(&self.mirrors[settled.rank]);
                    info!("Counter-Strike served from mirror {}", used);
                    format!(
                        "Using Counter-Strike mirror {} ({})",
                        used,
                        describe_failures(&settled.failures)
                    )
                });
                Ok(assemble(settled.value, now, windows, warning))
            }
            Err(failures) => {
                let reason = if failures.is_empty() {
                    "no mirrors configured".to_string()
                } else {
                    describe_failures(&failures)
                };
                Ok(degraded(Sport::Csgo, &reason, now, windows, self.settings.placeholders))
            }
        }
    }
}
