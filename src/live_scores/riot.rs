//! League of Legends and VALORANT schedules from Riot's esports gateway.
//!
//! Both titles share the same persisted-gateway shape: one `getSchedule` call
//! per league fanned out concurrently, plus a `getLive` call that says which
//! events are running right now. LoL adds kill counts and game time from the
//! live-stats feed; VALORANT falls back to scraping vlr.gg when Riot has
//! nothing usable.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::FutureExt;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::aggregate::{assemble, drop_stale};
use super::combinator::{describe_failures, first_usable, Attempt, SourceFailure};
use super::fetcher::{FetchOptions, SourceFetcher};
use super::normalize::{classify_status, fallback_match_id, parse_timestamp_str};
use super::placeholder::degraded;
use super::provider::{ProviderSettings, SportProvider};
use crate::models::{CanonicalMatch, MatchStatus, ProviderResult, Sport};

pub const LOL_SCHEDULE_URL: &str = "https://esports-api.lolesports.com/persisted/gw/getSchedule";
pub const LOL_LIVE_URL: &str = "https://esports-api.lolesports.com/persisted/gw/getLive";
pub const LOL_LIVE_STATS_URL: &str = "https://feed.lolesports.com/livestats/v1/window";
pub const VAL_SCHEDULE_URL: &str = "https://esports-api.valorantesports.com/persisted/gw/getSchedule";
pub const VAL_LIVE_URL: &str = "https://esports-api.valorantesports.com/persisted/gw/getLive";
pub const VLR_MATCHES_URL: &str = "https://www.vlr.gg/matches";
/// Public key the lolesports web client ships with.
pub const PUBLIC_API_KEY: &str = "0TvQnueqKa5mxJntVWt0w4LpLfEkrV1Ta8rQBb9Z";

/// A `getLive` entry in the same league starting this close to a scheduled
/// event is taken to be that event.
const LIVE_MATCH_TOLERANCE_MINUTES: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub key: &'static str,
    pub league_id: &'static str,
}

pub const LOL_REGIONS: &[Region] = &[
    Region { key: "LCS", league_id: "98767991299243165" },
    Region { key: "LEC", league_id: "98767991302996019" },
    Region { key: "LPL", league_id: "98767991314006698" },
    Region { key: "LCK", league_id: "98767991310872058" },
];

pub const VAL_REGIONS: &[Region] = &[
    Region { key: "VCT Americas", league_id: "109511549831443335" },
    Region { key: "VCT EMEA", league_id: "109518549825754244" },
    Region { key: "VCT Pacific", league_id: "109518549825754245" },
    Region { key: "VCT CN", league_id: "111559828453472288" },
];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct ScheduleEnvelope {
    #[serde(default)]
    data: ScheduleData,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleData {
    #[serde(default)]
    schedule: Schedule,
}

#[derive(Debug, Deserialize, Default)]
struct Schedule {
    #[serde(default)]
    events: Vec<RiotEvent>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct RiotEvent {
    id: Option<String>,
    start_time: Option<String>,
    /// "unstarted" | "inProgress" | "completed"
    state: Option<String>,
    league: Option<RiotLeague>,
    #[serde(rename = "match")]
    series: Option<RiotSeries>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct RiotLeague {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct RiotSeries {
    id: Option<String>,
    #[serde(default)]
    teams: Vec<RiotTeam>,
    #[serde(default)]
    games: Vec<RiotGame>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct RiotTeam {
    id: Option<String>,
    name: Option<String>,
    result: Option<RiotResult>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct RiotResult {
    outcome: Option<String>,
    game_wins: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct RiotGame {
    id: Option<String>,
    state: Option<String>,
    #[serde(default)]
    teams: Vec<RiotTeam>,
}

#[derive(Debug, Deserialize, Default)]
struct StatsWindow {
    #[serde(default)]
    frames: Vec<StatsFrame>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StatsFrame {
    rfc460_timestamp: Option<String>,
    blue_team: Option<FrameTeam>,
    red_team: Option<FrameTeam>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FrameTeam {
    total_kills: Option<u32>,
}

// ---------------------------------------------------------------------------
// Gateway client
// ---------------------------------------------------------------------------

/// An event `getLive` reports as running.
#[derive(Debug, Clone)]
struct LiveEvent {
    id: Option<String>,
    league_id: Option<String>,
    start: Option<DateTime<Utc>>,
}

/// Schedules gathered from every region that answered.
#[derive(Debug, Default)]
struct RegionSweep {
    events: Vec<(Region, RiotEvent)>,
    failed: Vec<(Region, SourceFailure)>,
}

impl RegionSweep {
    /// "LoL schedule unavailable for LCS, LPL (2 of 4 regions)"
    fn partial_warning(&self, title: &str, total: usize) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.failed.iter().map(|(r, _)| r.key).collect();
        Some(format!(
            "{} schedule unavailable for {} ({} of {} regions)",
            title,
            names.join(", "),
            self.failed.len(),
            total
        ))
    }

    fn failures(&self) -> Vec<SourceFailure> {
        self.failed.iter().map(|(_, f)| f.clone()).collect()
    }
}

/// One Riot esports gateway (lolesports or valorantesports).
pub struct RiotGateway {
    fetcher: SourceFetcher,
    source_name: &'static str,
    schedule_url: String,
    live_url: String,
    api_key: String,
}

impl RiotGateway {
    pub fn new(
        fetcher: SourceFetcher,
        source_name: &'static str,
        schedule_url: &str,
        live_url: &str,
        api_key: &str,
    ) -> Self {
        RiotGateway {
            fetcher,
            source_name,
            schedule_url: schedule_url.to_string(),
            live_url: live_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn options(&self, deadline: Option<std::time::Duration>) -> FetchOptions {
        let base = match deadline {
            Some(d) => FetchOptions::with_deadline(d),
            None => self.fetcher.options(),
        };
        base.header("Accept", "application/json")
            .header("Origin", "https://lolesports.com")
            .header("x-api-key", self.api_key.clone())
    }

    fn gateway_url(&self, base: &str, league_id: Option<&str>) -> Result<Url, SourceFailure> {
        let mut params = vec![("hl", "en-US")];
        if let Some(id) = league_id {
            params.push(("leagueId", id));
        }
        Url::parse_with_params(base, &params).map_err(|e| SourceFailure::new(self.source_name, e))
    }

    async fn schedule(&self, region: Region) -> Result<Vec<RiotEvent>, SourceFailure> {
        let url = self.gateway_url(&self.schedule_url, Some(region.league_id))?;
        let envelope: ScheduleEnvelope = self
            .fetcher
            .fetch_json(url.as_str(), &self.options(None))
            .await
            .map_err(|e| SourceFailure::new(format!("{} {}", self.source_name, region.key), e))?;
        Ok(envelope.data.schedule.events)
    }

    /// Fetch every region concurrently; failed regions are reported, not fatal.
    async fn sweep(&self, regions: &[Region]) -> RegionSweep {
        let results = join_all(regions.iter().map(|&region| async move {
            (region, self.schedule(region).await)
        }))
        .await;

        let mut sweep = RegionSweep::default();
        for (region, outcome) in results {
            match outcome {
                Ok(events) => {
                    debug!("{} {}: {} events", self.source_name, region.key, events.len());
                    sweep.events.extend(events.into_iter().map(|e| (region, e)));
                }
                Err(failure) => {
                    warn!("{}", failure);
                    sweep.failed.push((region, failure));
                }
            }
        }
        sweep
    }

    /// Events currently running. Any failure here only costs live detection,
    /// so it degrades to an empty list.
    async fn live_events(&self, deadline: std::time::Duration) -> Vec<LiveEvent> {
        let url = match self.gateway_url(&self.live_url, None) {
            Ok(url) => url,
            Err(failure) => {
                warn!("{}", failure);
                return Vec::new();
            }
        };
        match self
            .fetcher
            .fetch_json::<ScheduleEnvelope>(url.as_str(), &self.options(Some(deadline)))
            .await
        {
            Ok(envelope) => envelope
                .data
                .schedule
                .events
                .into_iter()
                .filter(|e| classify_status(e.state.as_deref().unwrap_or_default()) == MatchStatus::Live)
                .map(|e| LiveEvent {
                    id: e.id,
                    league_id: e.league.and_then(|l| l.id),
                    start: e.start_time.as_deref().and_then(parse_timestamp_str),
                })
                .collect(),
            Err(e) => {
                warn!("{} live feed unavailable: {}", self.source_name, e);
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn event_status(event: &RiotEvent) -> MatchStatus {
    match classify_status(event.state.as_deref().unwrap_or_default()) {
        MatchStatus::Unknown => MatchStatus::Scheduled,
        status => status,
    }
}

fn team_name(series: Option<&RiotSeries>, index: usize) -> String {
    series
        .and_then(|s| s.teams.get(index))
        .and_then(|t| t.name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "TBD".to_string())
}

/// Common fields of a Riot event; status, score and clock are filled in by
/// the title-specific code.
fn base_match(event: &RiotEvent, region: Region, league_fallback: String, now: DateTime<Utc>) -> CanonicalMatch {
    let series = event.series.as_ref();
    let (team_a, team_b) = (team_name(series, 0), team_name(series, 1));
    let match_id = event
        .id
        .clone()
        .or_else(|| series.and_then(|s| s.id.clone()))
        .unwrap_or_else(|| fallback_match_id(&team_a, &team_b));
    let league = event
        .league
        .as_ref()
        .and_then(|l| l.name.clone())
        .unwrap_or(league_fallback);

    let mut game = CanonicalMatch::new(match_id, format!("{team_a} vs {team_b}"), league);
    game.status_text = event.state.clone();
    game.start_time = event.start_time.as_deref().and_then(parse_timestamp_str);
    game.last_updated = now;
    debug!(region = region.key, id = %game.match_id, "normalized riot event");
    game
}

/// Series wins, counted from completed games when the schedule carries
/// them, otherwise the summary `gameWins`.
fn series_wins(event: &RiotEvent) -> (u32, u32) {
    let Some(series) = event.series.as_ref() else {
        return (0, 0);
    };
    let summary = |i: usize| {
        series
            .teams
            .get(i)
            .and_then(|t| t.result.as_ref())
            .and_then(|r| r.game_wins)
            .unwrap_or(0)
    };
    let completed: Vec<&RiotGame> = series
        .games
        .iter()
        .filter(|g| g.state.as_deref() == Some("completed"))
        .collect();
    if completed.is_empty() {
        return (summary(0), summary(1));
    }

    let team_id = |i: usize| series.teams.get(i).and_then(|t| t.id.as_deref());
    let (mut first, mut second) = (0, 0);
    for game in completed {
        let winner = game
            .teams
            .iter()
            .find(|t| t.result.as_ref().and_then(|r| r.outcome.as_deref()) == Some("win"))
            .and_then(|t| t.id.as_deref());
        match winner {
            Some(w) if Some(w) == team_id(0) => first += 1,
            Some(w) if Some(w) == team_id(1) => second += 1,
            _ => {}
        }
    }
    (first, second)
}

/// Whether `getLive` vouches for this event: same id, or same league and a
/// start within the tolerance.
fn listed_live(event: &RiotEvent, region: Region, live: &[LiveEvent]) -> bool {
    let start = event.start_time.as_deref().and_then(parse_timestamp_str);
    live.iter().any(|l| {
        let same_id = event.id.is_some() && l.id == event.id;
        let near = l.league_id.as_deref() == Some(region.league_id)
            && matches!((l.start, start), (Some(a), Some(b))
                if (a - b).num_minutes().abs() < LIVE_MATCH_TOLERANCE_MINUTES);
        same_id || near
    })
}

/// Game currently being played within a live series.
fn active_game_id(event: &RiotEvent) -> Option<String> {
    event
        .series
        .as_ref()?
        .games
        .iter()
        .find(|g| matches!(g.state.as_deref(), Some("inProgress") | Some("unstarted")))
        .and_then(|g| g.id.clone())
}

#[derive(Debug, PartialEq, Eq)]
struct LiveStats {
    blue_kills: u32,
    red_kills: u32,
    clock: Option<String>,
}

/// Kill totals from the latest frame and elapsed time across the window.
fn summarize_window(window: &StatsWindow) -> Option<LiveStats> {
    let first = window.frames.first()?;
    let last = window.frames.last()?;
    let kills = |team: &Option<FrameTeam>| team.as_ref().and_then(|t| t.total_kills).unwrap_or(0);
    let stamp = |f: &StatsFrame| f.rfc460_timestamp.as_deref().and_then(parse_timestamp_str);

    let clock = match (stamp(first), stamp(last)) {
        (Some(a), Some(b)) if b >= a => {
            let secs = (b - a).num_seconds();
            Some(format!("{}:{:02}", secs / 60, secs % 60))
        }
        _ => None,
    };
    Some(LiveStats {
        blue_kills: kills(&last.blue_team),
        red_kills: kills(&last.red_team),
        clock,
    })
}

// ---------------------------------------------------------------------------
// League of Legends
// ---------------------------------------------------------------------------

pub struct LolProvider {
    gateway: RiotGateway,
    live_stats_url: String,
    settings: ProviderSettings,
}

impl LolProvider {
    pub fn new(gateway: RiotGateway, live_stats_url: &str, settings: ProviderSettings) -> Self {
        LolProvider {
            gateway,
            live_stats_url: live_stats_url.trim_end_matches('/').to_string(),
            settings,
        }
    }

    async fn live_stats(&self, game_id: &str) -> Option<LiveStats> {
        let url = format!("{}/{}", self.live_stats_url, game_id);
        match self
            .gateway
            .fetcher
            .fetch_json::<StatsWindow>(&url, &self.gateway.options(Some(self.settings.live_deadline)))
            .await
        {
            Ok(window) => summarize_window(&window),
            Err(e) => {
                debug!("No live stats for game {}: {}", game_id, e);
                None
            }
        }
    }

    /// Normalize one event; live events with an active game also get stats.
    async fn normalize(
        &self,
        region: Region,
        event: RiotEvent,
        live: &[LiveEvent],
        now: DateTime<Utc>,
    ) -> CanonicalMatch {
        let mut game = base_match(&event, region, format!("LoL {}", region.key), now);
        let is_live = listed_live(&event, region, live) || event_status(&event) == MatchStatus::Live;
        game.status = if is_live { MatchStatus::Live } else { event_status(&event) };

        let (w1, w2) = series_wins(&event);
        game.score = Some(format!("{w1}-{w2}"));
        if is_live {
            if let Some(game_id) = active_game_id(&event) {
                if let Some(stats) = self.live_stats(&game_id).await {
                    game.score = Some(format!("{w1} (K:{})|{w2} (K:{})", stats.blue_kills, stats.red_kills));
                    game.clock = stats.clock;
                }
            }
        }
        game
    }
}

#[async_trait]
impl SportProvider for LolProvider {
    fn sport(&self) -> Sport {
        Sport::Lol
    }

    fn name(&self) -> &str {
        "lolesports"
    }

    async fn get_data(&self) -> Result<ProviderResult> {
        let now = Utc::now();
        let windows = self.settings.windows;
        let (sweep, live) = tokio::join!(
            self.gateway.sweep(LOL_REGIONS),
            self.gateway.live_events(self.settings.live_deadline)
        );

        let pending = sweep
            .events
            .iter()
            .filter(|(_, e)| event_status(e) != MatchStatus::Final)
            .map(|(region, event)| self.normalize(*region, event.clone(), &live, now));
        let games = drop_stale(join_all(pending).await, now, windows.stale_cutoff);

        if games.is_empty() {
            let reason = if sweep.failed.len() == LOL_REGIONS.len() {
                describe_failures(&sweep.failures())
            } else {
                "lolesports: no current matches".to_string()
            };
            return Ok(degraded(Sport::Lol, &reason, now, windows, self.settings.placeholders));
        }

        let warning = sweep.partial_warning("LoL", LOL_REGIONS.len());
        Ok(assemble(games, now, windows, warning))
    }
}

// ---------------------------------------------------------------------------
// VALORANT
// ---------------------------------------------------------------------------

/// What one VALORANT source produced.
#[derive(Debug)]
struct Harvest {
    games: Vec<CanonicalMatch>,
    warning: Option<String>,
}

pub struct ValorantProvider {
    gateway: RiotGateway,
    fetcher: SourceFetcher,
    vlr_url: String,
    settings: ProviderSettings,
}

impl ValorantProvider {
    pub fn new(gateway: RiotGateway, fetcher: SourceFetcher, vlr_url: &str, settings: ProviderSettings) -> Self {
        ValorantProvider {
            gateway,
            fetcher,
            vlr_url: vlr_url.to_string(),
            settings,
        }
    }

    async fn from_riot(&self, now: DateTime<Utc>) -> Result<Harvest, SourceFailure> {
        let (sweep, live) = tokio::join!(
            self.gateway.sweep(VAL_REGIONS),
            self.gateway.live_events(self.settings.live_deadline)
        );
        if sweep.failed.len() == VAL_REGIONS.len() {
            return Err(SourceFailure::new(
                "valorantesports",
                describe_failures(&sweep.failures()),
            ));
        }

        let games: Vec<CanonicalMatch> = sweep
            .events
            .iter()
            .filter(|(_, e)| event_status(e) != MatchStatus::Final)
            .map(|(region, event)| normalize_valorant(event, *region, &live, now))
            .collect();
        let games = drop_stale(games, now, self.settings.windows.stale_cutoff);
        if games.is_empty() {
            return Err(SourceFailure::new("valorantesports", "no current matches"));
        }
        Ok(Harvest {
            warning: sweep.partial_warning("VALORANT", VAL_REGIONS.len()),
            games,
        })
    }

    async fn from_vlr(&self, now: DateTime<Utc>) -> Result<Harvest, SourceFailure> {
        let html = self
            .fetcher
            .fetch_text(&self.vlr_url, &self.fetcher.options())
            .await
            .map_err(|e| SourceFailure::new("vlr.gg", e))?;
        let games = parse_vlr_matches(&html, now).map_err(|reason| SourceFailure::new("vlr.gg", reason))?;
        if games.is_empty() {
            return Err(SourceFailure::new("vlr.gg", "no matches on page"));
        }
        Ok(Harvest { games, warning: None })
    }
}

fn normalize_valorant(event: &RiotEvent, region: Region, live: &[LiveEvent], now: DateTime<Utc>) -> CanonicalMatch {
    let mut game = base_match(event, region, region.key.to_string(), now);
    let own = event_status(event);
    let listed = event.id.is_some() && live.iter().any(|l| l.id == event.id);
    let is_live = (listed || own == MatchStatus::Live) && own != MatchStatus::Final;
    game.status = if is_live { MatchStatus::Live } else { own };
    if is_live {
        let (w1, w2) = series_wins(event);
        game.score = Some(format!("{w1}-{w2}"));
    }
    game
}

/// Matches listed on the vlr.gg matches page. Start times there are relative
/// ("in 2h 15m"), so they are left unknown.
fn parse_vlr_matches(html: &str, now: DateTime<Utc>) -> Result<Vec<CanonicalMatch>, String> {
    let selector = |css: &str| Selector::parse(css).map_err(|e| format!("bad selector {css}: {e:?}"));
    let item_sel = selector("a.match-item")?;
    let team_sel = selector(".match-item-vs-team-name")?;
    let score_sel = selector(".match-item-vs-team-score")?;
    let status_sel = selector(".ml-status")?;
    let event_sel = selector(".match-item-event")?;

    let document = Html::parse_document(html);
    let text_of = |el: ElementRef| el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ");

    let mut games = Vec::new();
    for item in document.select(&item_sel) {
        let teams: Vec<String> = item.select(&team_sel).map(text_of).collect();
        let scores: Vec<u32> = item
            .select(&score_sel)
            .filter_map(|s| text_of(s).parse().ok())
            .collect();
        let status_text = item.select(&status_sel).next().map(text_of).unwrap_or_default();
        let status = match classify_status(&status_text) {
            MatchStatus::Unknown => MatchStatus::Scheduled,
            s => s,
        };
        if status == MatchStatus::Final {
            continue;
        }

        let team_a = teams.first().cloned().filter(|t| !t.is_empty()).unwrap_or_else(|| "TBD".into());
        let team_b = teams.get(1).cloned().filter(|t| !t.is_empty()).unwrap_or_else(|| "TBD".into());
        let href = item.value().attr("href").unwrap_or_default();
        let match_id = href
            .split('/')
            .find(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()))
            .map(|digits| format!("vlr-{digits}"))
            .unwrap_or_else(|| fallback_match_id(&team_a, &team_b));
        // The event cell holds the series stage first and the event name last.
        let league = item
            .select(&event_sel)
            .next()
            .and_then(|el| el.text().map(str::trim).filter(|t| !t.is_empty()).last().map(str::to_string))
            .unwrap_or_else(|| "VALORANT".to_string());

        let mut game = CanonicalMatch::new(match_id, format!("{team_a} vs {team_b}"), league);
        game.status = status;
        game.status_text = (!status_text.is_empty()).then_some(status_text);
        if status == MatchStatus::Live {
            if let [a, b, ..] = scores.as_slice() {
                game.score = Some(format!("{a}-{b}"));
            }
        }
        if href.starts_with('/') {
            game.stream_url = Some(format!("https://www.vlr.gg{href}"));
        }
        game.last_updated = now;
        games.push(game);
    }
    Ok(games)
}

#[async_trait]
impl SportProvider for ValorantProvider {
    fn sport(&self) -> Sport {
        Sport::Valorant
    }

    fn name(&self) -> &str {
        "valorantesports + vlr.gg"
    }

    async fn get_data(&self) -> Result<ProviderResult> {
        let now = Utc::now();
        let windows = self.settings.windows;
        let attempts: Vec<Attempt<'_, Harvest>> = vec![self.from_riot(now).boxed(), self.from_vlr(now).boxed()];

        match first_usable(attempts).await {
            Ok(settled) => {
                let warning = if settled.rank > 0 {
                    info!("VALORANT served from vlr.gg fallback");
                    Some(format!(
                        "Using vlr.gg fallback for VALORANT ({})",
                        describe_failures(&settled.failures)
                    ))
                } else {
                    settled.value.warning
                };
                Ok(assemble(settled.value.games, now, windows, warning))
            }
            Err(failures) => Ok(degraded(
                Sport::Valorant,
                &describe_failures(&failures),
                now,
                windows,
                self.settings.placeholders,
            )),
        }
    }
}
