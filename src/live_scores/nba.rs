//! NBA scores from the league CDN scoreboard, raced against ESPN's public
//! scoreboard.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::Deserialize;
use tracing::{info, warn};

use super::aggregate::{assemble, contains_all_tokens, drop_stale, normalize_query};
use super::combinator::{describe_failures, race_first_success, Attempt, SourceFailure};
use super::fetcher::SourceFetcher;
use super::normalize::{classify_status, fallback_match_id, parse_timestamp_str};
use super::placeholder::degraded;
use super::provider::{ProviderSettings, SportProvider};
use crate::models::{CanonicalMatch, MatchStatus, ProviderResult, Sport, TeamLine};

pub const CDN_SCOREBOARD_URL: &str =
    "https://cdn.nba.com/static/json/liveData/scoreboard/todaysScoreboard_00.json";
pub const ESPN_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/scoreboard";

const CDN_SOURCE: &str = "NBA CDN";
const ESPN_SOURCE: &str = "ESPN";

/// Accepted search aliases per team code, all lowercase. Single words match
/// whole query words; phrases match anywhere in the query.
const TEAM_ALIASES: &[(&str, &[&str])] = &[
    ("ATL", &["atl", "hawks", "atlanta"]),
    ("BOS", &["bos", "celtics", "boston"]),
    ("BKN", &["bkn", "nets", "brooklyn"]),
    ("CHA", &["cha", "hornets", "charlotte"]),
    ("CHI", &["chi", "bulls", "chicago"]),
    ("CLE", &["cle", "cavaliers", "cavs", "cleveland"]),
    ("DAL", &["dal", "mavericks", "mavs", "dallas"]),
    ("DEN", &["den", "nuggets", "denver"]),
    ("DET", &["det", "pistons", "detroit"]),
    ("GSW", &["gsw", "warriors", "golden state", "goldenstate"]),
    ("HOU", &["hou", "rockets", "houston"]),
    ("IND", &["ind", "pacers", "indiana"]),
    ("LAC", &["lac", "clippers", "la clippers"]),
    ("LAL", &["lal", "lakers", "la lakers"]),
    ("MEM", &["mem", "grizzlies", "memphis"]),
    ("MIA", &["mia", "heat", "miami"]),
    ("MIL", &["mil", "bucks", "milwaukee"]),
    ("MIN", &["min", "timberwolves", "wolves", "minnesota"]),
    ("NOP", &["nop", "pelicans", "new orleans", "no"]),
    ("NYK", &["nyk", "knicks", "new york"]),
    ("OKC", &["okc", "thunder", "oklahoma city"]),
    ("ORL", &["orl", "magic", "orlando"]),
    ("PHI", &["phi", "76ers", "sixers", "philadelphia"]),
    ("PHX", &["phx", "suns", "phoenix"]),
    ("POR", &["por", "trail blazers", "blazers", "portland"]),
    ("SAC", &["sac", "kings", "sacramento"]),
    ("SAS", &["sas", "spurs", "san antonio"]),
    ("TOR", &["tor", "raptors", "toronto"]),
    ("UTA", &["uta", "jazz", "utah"]),
    ("WAS", &["was", "wizards", "washington"]),
];

// ---------------------------------------------------------------------------
// NBA CDN wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct CdnPayload {
    #[serde(default)]
    scoreboard: CdnScoreboard,
}

#[derive(Debug, Deserialize, Default)]
struct CdnScoreboard {
    #[serde(default)]
    games: Vec<CdnGame>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CdnGame {
    game_id: Option<String>,
    /// 1 scheduled, 2 live, 3 final
    game_status: Option<u8>,
    game_status_text: Option<String>,
    period: Option<u32>,
    /// ISO-8601 duration, "PT07M18.00S"
    game_clock: Option<String>,
    #[serde(rename = "gameTimeUTC")]
    game_time_utc: Option<String>,
    game_et: Option<String>,
    #[serde(default)]
    home_team: CdnTeam,
    #[serde(default)]
    away_team: CdnTeam,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CdnTeam {
    team_tricode: Option<String>,
    team_name: Option<String>,
    team_city: Option<String>,
    score: Option<u32>,
}

// ---------------------------------------------------------------------------
// ESPN wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct EspnScoreboard {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize, Default)]
struct EspnEvent {
    id: Option<String>,
    date: Option<String>,
    status: Option<EspnStatus>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Deserialize, Default)]
struct EspnCompetition {
    status: Option<EspnStatus>,
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct EspnStatus {
    period: Option<u32>,
    #[serde(rename = "displayClock")]
    display_clock: Option<String>,
    #[serde(rename = "type")]
    status_type: Option<EspnStatusType>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct EspnStatusType {
    /// "pre" | "in" | "post"
    state: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "shortDetail")]
    short_detail: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EspnCompetitor {
    #[serde(rename = "homeAway")]
    home_away: Option<String>,
    /// ESPN sends scores as strings
    score: Option<String>,
    team: Option<EspnTeam>,
}

#[derive(Debug, Deserialize, Default)]
struct EspnTeam {
    abbreviation: Option<String>,
    name: Option<String>,
    location: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalizers
// ---------------------------------------------------------------------------

fn normalize_cdn_game(game: &CdnGame, now: DateTime<Utc>) -> CanonicalMatch {
    let status = match game.game_status {
        Some(1) => MatchStatus::Scheduled,
        Some(2) => MatchStatus::Live,
        Some(3) => MatchStatus::Final,
        _ => classify_status(game.game_status_text.as_deref().unwrap_or_default()),
    };
    let home = cdn_team_line(&game.home_team, "HOME", status);
    let away = cdn_team_line(&game.away_team, "AWAY", status);
    let start_time = game
        .game_time_utc
        .as_deref()
        .and_then(parse_timestamp_str)
        .or_else(|| game.game_et.as_deref().and_then(parse_timestamp_str));
    let clock = (status == MatchStatus::Live)
        .then(|| format_clock(game.period.unwrap_or(1), game.game_clock.as_deref().unwrap_or_default()));

    build_game(
        game.game_id.clone(),
        status,
        game.game_status_text.clone(),
        start_time,
        clock,
        home,
        away,
        now,
    )
}

fn cdn_team_line(team: &CdnTeam, placeholder: &str, status: MatchStatus) -> TeamLine {
    TeamLine {
        code: team
            .team_tricode
            .clone()
            .unwrap_or_else(|| placeholder.to_string()),
        name: team.team_name.clone().unwrap_or_default(),
        city: team.team_city.clone().unwrap_or_default(),
        score: if status == MatchStatus::Scheduled { None } else { team.score },
    }
}

fn normalize_espn_event(event: &EspnEvent, now: DateTime<Utc>) -> CanonicalMatch {
    let competition = event.competitions.first();
    let espn_status = competition
        .and_then(|c| c.status.clone())
        .or_else(|| event.status.clone())
        .unwrap_or_default();
    let status_type = espn_status.status_type.clone().unwrap_or_default();
    let status_text = status_type
        .short_detail
        .clone()
        .or_else(|| status_type.description.clone());
    let status = match status_type.state.as_deref() {
        Some("pre") => MatchStatus::Scheduled,
        Some("in") => MatchStatus::Live,
        Some("post") => MatchStatus::Final,
        _ => classify_status(
            status_type
                .description
                .as_deref()
                .or(status_type.name.as_deref())
                .unwrap_or_default(),
        ),
    };

    let competitors: &[EspnCompetitor] = competition.map(|c| c.competitors.as_slice()).unwrap_or_default();
    let side = |wanted: &str, index: usize| {
        competitors
            .iter()
            .find(|c| c.home_away.as_deref() == Some(wanted))
            .or_else(|| competitors.get(index))
    };
    let away = espn_team_line(side("away", 0), "AWAY", status);
    let home = espn_team_line(side("home", 1), "HOME", status);

    let clock = (status == MatchStatus::Live).then(|| {
        format_clock(
            espn_status.period.unwrap_or(1),
            espn_status.display_clock.as_deref().unwrap_or_default(),
        )
    });

    build_game(
        event.id.clone(),
        status,
        status_text,
        event.date.as_deref().and_then(parse_timestamp_str),
        clock,
        home,
        away,
        now,
    )
}

fn espn_team_line(competitor: Option<&EspnCompetitor>, placeholder: &str, status: MatchStatus) -> TeamLine {
    let team = competitor.and_then(|c| c.team.as_ref());
    let code = team
        .and_then(|t| t.abbreviation.as_deref())
        .map(canonical_tricode)
        .unwrap_or_else(|| placeholder.to_string());
    let score = if status == MatchStatus::Scheduled {
        None
    } else {
        competitor
            .and_then(|c| c.score.as_deref())
            .and_then(|s| s.trim().parse().ok())
    };
    TeamLine {
        code,
        name: team.and_then(|t| t.name.clone()).unwrap_or_default(),
        city: team.and_then(|t| t.location.clone()).unwrap_or_default(),
        score,
    }
}

/// ESPN uses short forms for a handful of teams; map them onto league tricodes
/// so both sources resolve the same aliases.
fn canonical_tricode(abbreviation: &str) -> String {
    let upper = abbreviation.trim().to_uppercase();
    match upper.as_str() {
        "GS" => "GSW".to_string(),
        "NY" => "NYK".to_string(),
        "SA" => "SAS".to_string(),
        "NO" => "NOP".to_string(),
        "UTAH" => "UTA".to_string(),
        "WSH" => "WAS".to_string(),
        _ => upper,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_game(
    id: Option<String>,
    status: MatchStatus,
    status_text: Option<String>,
    start_time: Option<DateTime<Utc>>,
    clock: Option<String>,
    home: TeamLine,
    away: TeamLine,
    now: DateTime<Utc>,
) -> CanonicalMatch {
    let match_id = id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| fallback_match_id(&away.code, &home.code));
    let label = format!("{} @ {}", away.code, home.code);
    let score = match (status, away.score, home.score) {
        (MatchStatus::Scheduled, _, _) => None,
        (_, a, h) => Some(format!("{}-{}", a.unwrap_or(0), h.unwrap_or(0))),
    };

    let mut game = CanonicalMatch::new(match_id, label, "NBA");
    game.status = status;
    game.status_text = status_text;
    game.start_time = start_time;
    game.score = score;
    game.clock = clock;
    game.last_updated = now;
    game.home = Some(home);
    game.away = Some(away);
    game
}

/// "Q3 07:18", "OT1 02:00". A game clock that cannot be read leaves just the
/// period.
pub fn format_clock(period: u32, raw_clock: &str) -> String {
    let period = period.max(1);
    let prefix = if period > 4 {
        format!("OT{}", period - 4)
    } else {
        format!("Q{period}")
    };
    match parse_game_clock(raw_clock) {
        Some(time) => format!("{prefix} {time}"),
        None => prefix,
    }
}

/// Read "PT07M18.00S" (CDN), "7:18" or "45.3" (ESPN) into "mm:ss". Tenths
/// are kept only in the last minute.
fn parse_game_clock(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (minutes, seconds): (u32, f64) = if let Some(rest) = raw.strip_prefix("PT") {
        let rest = rest.strip_suffix('S').unwrap_or(rest);
        match rest.split_once('M') {
            Some((m, s)) => (m.parse().ok()?, if s.is_empty() { 0.0 } else { s.parse().ok()? }),
            None => (0, rest.parse().ok()?),
        }
    } else if let Some((m, s)) = raw.split_once(':') {
        (m.parse().ok()?, s.parse().ok()?)
    } else {
        (0, raw.parse().ok()?)
    };
    if !seconds.is_finite() || seconds < 0.0 || seconds >= 60.0 {
        return None;
    }

    let whole = seconds.trunc() as u32;
    let tenths = ((seconds - seconds.trunc()) * 10.0).round() as u32;
    if minutes == 0 && tenths > 0 && tenths < 10 {
        Some(format!("00:{whole:02}.{tenths}"))
    } else {
        Some(format!("{minutes:02}:{whole:02}"))
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Team codes mentioned in the query, in the order they appear.
fn teams_in_query(query: &str) -> Vec<&'static str> {
    let words = word_spans(query);
    let mut found: Vec<(usize, &'static str)> = TEAM_ALIASES
        .iter()
        .filter_map(|(code, aliases)| {
            aliases
                .iter()
                .filter_map(|alias| {
                    if alias.contains(' ') {
                        query.find(alias)
                    } else {
                        words.iter().find(|(_, w)| w == alias).map(|(pos, _)| *pos)
                    }
                })
                .min()
                .map(|pos| (pos, *code))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, code)| code).collect()
}

/// Byte offset and text of every alphanumeric word.
fn word_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            spans.push((s, &text[s..i]));
        }
    }
    if let Some(s) = start {
        spans.push((s, &text[s..]));
    }
    spans
}

fn plays_in(game: &CanonicalMatch, code: &str) -> bool {
    game.team_codes().any(|c| c.eq_ignore_ascii_case(code))
}

/// Exact id, then team aliases ("lakers celtics", "golden state"), then
/// every query word against the label, team names and cities.
pub fn pick_nba(games: &[CanonicalMatch], query: &str) -> Option<CanonicalMatch> {
    let q = normalize_query(query);
    if q.is_empty() {
        return games.first().cloned();
    }
    if let Some(exact) = games.iter().find(|g| g.match_id.to_lowercase() == q) {
        return Some(exact.clone());
    }

    let teams = teams_in_query(&q);
    if let [first, second, ..] = teams.as_slice() {
        if let Some(both) = games.iter().find(|g| plays_in(g, first) && plays_in(g, second)) {
            return Some(both.clone());
        }
    }
    if let Some(first) = teams.first() {
        if let Some(one) = games.iter().find(|g| plays_in(g, first)) {
            return Some(one.clone());
        }
    }

    games
        .iter()
        .find(|g| {
            let teams = g
                .away
                .iter()
                .chain(g.home.iter())
                .map(|t| format!("{} {}", t.city, t.name))
                .collect::<Vec<_>>()
                .join(" ");
            contains_all_tokens(&format!("{} {} {} {}", g.match_id, g.label, teams, g.league), &q)
        })
        .cloned()
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct NbaProvider {
    fetcher: SourceFetcher,
    settings: ProviderSettings,
    cdn_url: String,
    espn_url: String,
}

impl NbaProvider {
    pub fn new(fetcher: SourceFetcher, settings: ProviderSettings, cdn_url: &str, espn_url: &str) -> Self {
        NbaProvider {
            fetcher,
            settings,
            cdn_url: cdn_url.to_string(),
            espn_url: espn_url.to_string(),
        }
    }

    async fn from_cdn(&self, now: DateTime<Utc>) -> Result<Vec<CanonicalMatch>, SourceFailure> {
        let payload: CdnPayload = self
            .fetcher
            .fetch_json(&self.cdn_url, &self.fetcher.options())
            .await
            .map_err(|e| SourceFailure::new(CDN_SOURCE, e))?;
        let games = payload
            .scoreboard
            .games
            .iter()
            .map(|g| normalize_cdn_game(g, now))
            .collect();
        self.usable(CDN_SOURCE, games, now)
    }

    async fn from_espn(&self, now: DateTime<Utc>) -> Result<Vec<CanonicalMatch>, SourceFailure> {
        let payload: EspnScoreboard = self
            .fetcher
            .fetch_json(&self.espn_url, &self.fetcher.options())
            .await
            .map_err(|e| SourceFailure::new(ESPN_SOURCE, e))?;
        let games = payload
            .events
            .iter()
            .map(|e| normalize_espn_event(e, now))
            .collect();
        self.usable(ESPN_SOURCE, games, now)
    }

    /// A source counts only if something current is left after stale pruning.
    /// The CDN file in particular keeps serving yesterday's slate for hours.
    fn usable(
        &self,
        source: &str,
        games: Vec<CanonicalMatch>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CanonicalMatch>, SourceFailure> {
        let games = drop_stale(games, now, self.settings.windows.stale_cutoff);
        if games.is_empty() {
            Err(SourceFailure::new(source, "no current games"))
        } else {
            Ok(games)
        }
    }
}

#[async_trait]
impl SportProvider for NbaProvider {
    fn sport(&self) -> Sport {
        Sport::Nba
    }

    fn name(&self) -> &str {
        "NBA CDN + ESPN"
    }

    async fn get_data(&self) -> Result<ProviderResult> {
        let now = Utc::now();
        let attempts: Vec<Attempt<'_, Vec<CanonicalMatch>>> =
            vec![self.from_cdn(now).boxed(), self.from_espn(now).boxed()];

        match race_first_success(attempts).await {
            Ok(settled) => {
                let warning = (settled.rank > 0).then(|| {
                    info!("NBA served from {} fallback", ESPN_SOURCE);
                    if settled.failures.is_empty() {
                        format!("Using {ESPN_SOURCE} fallback for NBA scores")
                    } else {
                        format!(
                            "Using {ESPN_SOURCE} fallback for NBA scores ({})",
                            describe_failures(&settled.failures)
                        )
                    }
                });
                Ok(assemble(settled.value, now, self.settings.windows, warning))
            }
            Err(failures) => {
                warn!("NBA sources exhausted");
                Ok(degraded(
                    Sport::Nba,
                    &describe_failures(&failures),
                    now,
                    self.settings.windows,
                    self.settings.placeholders,
                ))
            }
        }
    }

    fn pick(&self, data: &ProviderResult, query: &str) -> Option<CanonicalMatch> {
        pick_nba(&data.games, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_scores::placeholder::DEMO_STATUS_TEXT;
    use crate::live_scores::testing::serve;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use chrono::Duration as ChronoDuration;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn cdn_game(id: &str, status: u8, away: &str, home: &str, start: DateTime<Utc>) -> Value {
        json!({
            "gameId": id,
            "gameStatus": status,
            "gameStatusText": match status { 1 => "7:30 pm ET", 2 => "Q3 7:18", _ => "Final" },
            "period": 3,
            "gameClock": "PT07M18.00S",
            "gameTimeUTC": start.to_rfc3339(),
            "homeTeam": {"teamTricode": home, "teamName": "Home Name", "teamCity": "Home City", "score": 77},
            "awayTeam": {"teamTricode": away, "teamName": "Away Name", "teamCity": "Away City", "score": 80}
        })
    }

    fn espn_event(id: &str, state: &str, away: &str, home: &str, start: DateTime<Utc>) -> Value {
        json!({
            "id": id,
            "date": start.format("%Y-%m-%dT%H:%MZ").to_string(),
            "competitions": [{
                "status": {
                    "period": 2,
                    "displayClock": "4:05",
                    "type": {"state": state, "name": "STATUS_IN_PROGRESS", "description": "In Progress", "shortDetail": "4:05 - 2nd"}
                },
                "competitors": [
                    {"homeAway": "home", "score": "51", "team": {"abbreviation": home, "name": "Celtics", "location": "Boston"}},
                    {"homeAway": "away", "score": "48", "team": {"abbreviation": away, "name": "Warriors", "location": "Golden State"}}
                ]
            }]
        })
    }

    fn game(id: &str, away: &str, home: &str, away_city: &str, home_city: &str) -> CanonicalMatch {
        let mut g = CanonicalMatch::new(id, format!("{away} @ {home}"), "NBA");
        g.away = Some(TeamLine { code: away.into(), name: String::new(), city: away_city.into(), score: None });
        g.home = Some(TeamLine { code: home.into(), name: String::new(), city: home_city.into(), score: None });
        g
    }

    fn slate() -> Vec<CanonicalMatch> {
        vec![
            game("0022300001", "LAL", "DEN", "Los Angeles", "Denver"),
            game("0022300002", "GSW", "BOS", "Golden State", "Boston"),
            game("0022300003", "LAL", "BOS", "Los Angeles", "Boston"),
        ]
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(3, "PT07M18.00S"), "Q3 07:18");
        assert_eq!(format_clock(5, "PT02M00.00S"), "OT1 02:00");
        assert_eq!(format_clock(4, "PT00M45.30S"), "Q4 00:45.3");
        assert_eq!(format_clock(4, "PT00M45.00S"), "Q4 00:45");
        assert_eq!(format_clock(2, "7:18"), "Q2 07:18");
        assert_eq!(format_clock(2, "12:00"), "Q2 12:00");
        assert_eq!(format_clock(4, "45.3"), "Q4 00:45.3");
        assert_eq!(format_clock(0, ""), "Q1");
        assert_eq!(format_clock(2, "halftime"), "Q2");
    }

    #[test]
    fn test_normalize_cdn_live_game() {
        let now = Utc::now();
        let raw: CdnGame = serde_json::from_value(cdn_game("0022300500", 2, "GSW", "BOS", now)).unwrap();
        let g = normalize_cdn_game(&raw, now);
        assert_eq!(g.match_id, "0022300500");
        assert_eq!(g.label, "GSW @ BOS");
        assert_eq!(g.status, MatchStatus::Live);
        assert_eq!(g.score.as_deref(), Some("80-77"));
        assert_eq!(g.clock.as_deref(), Some("Q3 07:18"));
        assert_eq!(g.home.as_ref().unwrap().city, "Home City");
        assert_eq!(g.league, "NBA");
    }

    #[test]
    fn test_normalize_cdn_scheduled_game_has_no_score_or_clock() {
        let now = Utc::now();
        let raw: CdnGame = serde_json::from_value(cdn_game("1", 1, "LAL", "DEN", now)).unwrap();
        let g = normalize_cdn_game(&raw, now);
        assert_eq!(g.status, MatchStatus::Scheduled);
        assert_eq!(g.score, None);
        assert_eq!(g.clock, None);
        assert_eq!(g.status_text.as_deref(), Some("7:30 pm ET"));
    }

    #[test]
    fn test_normalize_cdn_tolerates_missing_fields() {
        let raw: CdnGame = serde_json::from_value(json!({})).unwrap();
        let g = normalize_cdn_game(&raw, Utc::now());
        assert_eq!(g.label, "AWAY @ HOME");
        assert_eq!(g.match_id, "away-vs-home");
        assert_eq!(g.status, MatchStatus::Unknown);
        assert_eq!(g.start_time, None);
    }

    #[test]
    fn test_normalize_espn_maps_short_codes() {
        let now = Utc::now();
        let raw: EspnEvent = serde_json::from_value(espn_event("401585", "in", "GS", "BOS", now)).unwrap();
        let g = normalize_espn_event(&raw, now);
        assert_eq!(g.label, "GSW @ BOS");
        assert_eq!(g.status, MatchStatus::Live);
        assert_eq!(g.score.as_deref(), Some("48-51"));
        assert_eq!(g.clock.as_deref(), Some("Q2 04:05"));
        assert_eq!(g.status_text.as_deref(), Some("4:05 - 2nd"));
        assert!(g.start_time.is_some());
    }

    #[test]
    fn test_teams_in_query_follow_query_order() {
        assert_eq!(teams_in_query("lakers vs celtics"), vec!["LAL", "BOS"]);
        assert_eq!(teams_in_query("boston la lakers"), vec!["BOS", "LAL"]);
        assert_eq!(teams_in_query("golden state"), vec!["GSW"]);
        // whole words only: "nothing" is not "no", "heated" is not "heat"
        assert!(teams_in_query("nothing heated").is_empty());
    }

    #[test]
    fn test_pick_nba_two_teams_prefers_their_game() {
        let games = slate();
        assert_eq!(pick_nba(&games, "Lakers Celtics").unwrap().match_id, "0022300003");
        assert_eq!(pick_nba(&games, "BOS lal").unwrap().match_id, "0022300003");
    }

    #[test]
    fn test_pick_nba_single_team_and_city() {
        let games = slate();
        assert_eq!(pick_nba(&games, "lakers").unwrap().match_id, "0022300001");
        assert_eq!(pick_nba(&games, "  WARRIORS ").unwrap().match_id, "0022300002");
        assert_eq!(pick_nba(&games, "denver").unwrap().match_id, "0022300001");
    }

    #[test]
    fn test_pick_nba_id_empty_and_miss() {
        let games = slate();
        assert_eq!(pick_nba(&games, "0022300002").unwrap().label, "GSW @ BOS");
        assert_eq!(pick_nba(&games, "").unwrap().match_id, "0022300001");
        assert!(pick_nba(&games, "knicks").is_none());
        assert!(pick_nba(&[], "").is_none());
    }

    #[test]
    fn test_pick_nba_falls_back_to_text_search() {
        let games = slate();
        assert_eq!(pick_nba(&games, "los angeles").unwrap().match_id, "0022300001");
        assert_eq!(pick_nba(&games, "golden state boston").unwrap().match_id, "0022300002");
    }

    fn provider(base: &str) -> NbaProvider {
        NbaProvider::new(
            SourceFetcher::new(Duration::from_millis(800)).unwrap(),
            ProviderSettings::default(),
            &format!("{base}/cdn"),
            &format!("{base}/espn"),
        )
    }

    fn json_route(body: Value) -> axum::routing::MethodRouter {
        get(move || {
            let body = body.clone();
            async move { Json(body) }
        })
    }

    #[tokio::test]
    async fn test_cdn_success_has_no_warning() {
        let now = Utc::now();
        let base = serve(
            Router::new()
                .route("/cdn", json_route(json!({"scoreboard": {"games": [
                    cdn_game("a", 1, "LAL", "BOS", now + ChronoDuration::hours(2)),
                    cdn_game("b", 2, "GSW", "DEN", now - ChronoDuration::hours(1)),
                ]}})))
                .route("/espn", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
        )
        .await;

        let data = provider(&base).get_data().await.unwrap();
        assert_eq!(data.warning, None);
        assert_eq!(data.games.len(), 2);
        assert_eq!(data.games[0].match_id, "b");
        assert_eq!(data.upcoming.len(), 1);
        assert_eq!(data.upcoming[0].match_id, "a");
    }

    #[tokio::test]
    async fn test_slow_cdn_falls_back_to_espn_with_warning() {
        let now = Utc::now();
        let base = serve(
            Router::new()
                .route(
                    "/cdn",
                    get(|| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Json(json!({}))
                    }),
                )
                .route("/espn", json_route(json!({"events": [espn_event("401", "in", "NY", "MIA", now)]}))),
        )
        .await;

        let data = provider(&base).get_data().await.unwrap();
        assert_eq!(data.games.len(), 1);
        assert_eq!(data.games[0].label, "NYK @ MIA");
        assert!(data.warning.unwrap().contains("ESPN"));
    }

    #[tokio::test]
    async fn test_frozen_cdn_slate_counts_as_failure() {
        let now = Utc::now();
        let yesterday = now - ChronoDuration::hours(26);
        let base = serve(
            Router::new()
                .route("/cdn", json_route(json!({"scoreboard": {"games": [cdn_game("old", 3, "LAL", "BOS", yesterday)]}})))
                .route("/espn", json_route(json!({"events": [espn_event("new", "pre", "LAL", "BOS", now + ChronoDuration::hours(1))]}))),
        )
        .await;

        let data = provider(&base).get_data().await.unwrap();
        assert_eq!(data.games.len(), 1);
        assert_eq!(data.games[0].match_id, "new");
        assert!(data.warning.unwrap().contains("ESPN"));
    }

    #[tokio::test]
    async fn test_all_sources_down_serves_placeholders() {
        let base = serve(
            Router::new()
                .route("/cdn", get(|| async { StatusCode::BAD_GATEWAY }))
                .route("/espn", get(|| async { "not json" })),
        )
        .await;

        let data = provider(&base).get_data().await.unwrap();
        assert!(!data.games.is_empty());
        assert!(data.games.iter().all(|g| g.status_text.as_deref() == Some(DEMO_STATUS_TEXT)));
        let warning = data.warning.unwrap();
        assert!(warning.contains("NBA CDN"));
        assert!(warning.contains("ESPN"));
    }
}
