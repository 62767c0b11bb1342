use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::live_scores::aggregate::TimeWindows;
use crate::live_scores::counter_strike::HLTV_MIRRORS;
use crate::live_scores::nba::{CDN_SCOREBOARD_URL, ESPN_SCOREBOARD_URL};
use crate::live_scores::provider::ProviderSettings;
use crate::live_scores::riot::{
    LOL_LIVE_STATS_URL, LOL_LIVE_URL, LOL_SCHEDULE_URL, PUBLIC_API_KEY, VAL_LIVE_URL, VAL_SCHEDULE_URL,
    VLR_MATCHES_URL,
};

/// Longest deadline accepted for any single upstream request.
const MAX_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Realtime NBA and esports score tracker
#[derive(Parser, Debug, Clone)]
#[command(name = "realtime-scores", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// Serve the tracker client from this directory instead of the built-in page
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// How long a fetched result is served without refreshing (milliseconds)
    #[arg(long, env = "CACHE_TTL_MS", default_value = "800")]
    pub cache_ttl_ms: u64,

    /// Scheduled matches starting within this many hours are listed as upcoming
    #[arg(long, env = "UPCOMING_WINDOW_HOURS", default_value = "12")]
    pub upcoming_window_hours: i64,

    /// Non-live matches that started more than this many hours ago are dropped
    #[arg(long, env = "STALE_CUTOFF_HOURS", default_value = "6")]
    pub stale_cutoff_hours: i64,

    /// Default deadline for one upstream request (milliseconds)
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "5000")]
    pub fetch_timeout_ms: u64,

    /// Deadline for "what is live now" and live-stats requests (milliseconds)
    #[arg(long, env = "LIVE_TIMEOUT_MS", default_value = "4000")]
    pub live_timeout_ms: u64,

    /// Serve clearly labeled demo matches when every source for a sport fails
    #[arg(long, env = "PLACEHOLDERS", default_value_t = true, action = ArgAction::Set)]
    pub placeholders: bool,

    /// NBA CDN scoreboard URL
    #[arg(long, env = "NBA_CDN_URL", default_value = CDN_SCOREBOARD_URL)]
    pub nba_cdn_url: String,

    /// ESPN NBA scoreboard URL
    #[arg(long, env = "ESPN_NBA_URL", default_value = ESPN_SCOREBOARD_URL)]
    pub espn_nba_url: String,

    /// lolesports getSchedule URL
    #[arg(long, env = "LOL_SCHEDULE_URL", default_value = LOL_SCHEDULE_URL)]
    pub lol_schedule_url: String,

    /// lolesports getLive URL
    #[arg(long, env = "LOL_LIVE_URL", default_value = LOL_LIVE_URL)]
    pub lol_live_url: String,

    /// lolesports live-stats window feed
    #[arg(long, env = "LOL_LIVE_STATS_URL", default_value = LOL_LIVE_STATS_URL)]
    pub lol_live_stats_url: String,

    /// Riot esports gateway API key
    #[arg(long, env = "LOL_API_KEY", default_value = PUBLIC_API_KEY)]
    pub lol_api_key: String,

    /// valorantesports getSchedule URL
    #[arg(long, env = "VAL_SCHEDULE_URL", default_value = VAL_SCHEDULE_URL)]
    pub val_schedule_url: String,

    /// valorantesports getLive URL
    #[arg(long, env = "VAL_LIVE_URL", default_value = VAL_LIVE_URL)]
    pub val_live_url: String,

    /// vlr.gg matches page used when the VALORANT gateway has nothing
    #[arg(long, env = "VLR_URL", default_value = VLR_MATCHES_URL)]
    pub vlr_url: String,

    /// Counter-Strike HLTV mirrors, comma separated, in priority order
    #[arg(
        long,
        env = "CS_SOURCES",
        value_delimiter = ',',
        default_values_t = HLTV_MIRRORS.iter().map(|s| s.to_string()).collect::<Vec<String>>()
    )]
    pub cs_sources: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("listen_addr must be host:port, got \"{}\"", self.listen_addr);
        }
        if self.cache_ttl_ms == 0 {
            anyhow::bail!("cache_ttl_ms must be positive");
        }
        for (name, ms) in [
            ("fetch_timeout_ms", self.fetch_timeout_ms),
            ("live_timeout_ms", self.live_timeout_ms),
        ] {
            if ms == 0 || ms > MAX_FETCH_TIMEOUT_MS {
                anyhow::bail!("{} must be between 1 and {}", name, MAX_FETCH_TIMEOUT_MS);
            }
        }
        if self.upcoming_window_hours <= 0 || self.upcoming_window_hours > 24 * 7 {
            anyhow::bail!("upcoming_window_hours must be between 1 and 168");
        }
        if self.stale_cutoff_hours <= 0 || self.stale_cutoff_hours > 24 * 7 {
            anyhow::bail!("stale_cutoff_hours must be between 1 and 168");
        }
        if self.lol_api_key.trim().is_empty() {
            anyhow::bail!("LOL_API_KEY must not be empty");
        }
        if self.cs_sources.is_empty() {
            anyhow::bail!("CS_SOURCES needs at least one mirror");
        }

        let urls = [
            ("nba_cdn_url", &self.nba_cdn_url),
            ("espn_nba_url", &self.espn_nba_url),
            ("lol_schedule_url", &self.lol_schedule_url),
            ("lol_live_url", &self.lol_live_url),
            ("lol_live_stats_url", &self.lol_live_stats_url),
            ("val_schedule_url", &self.val_schedule_url),
            ("val_live_url", &self.val_live_url),
            ("vlr_url", &self.vlr_url),
        ];
        for (name, value) in urls.into_iter().chain(self.cs_sources.iter().map(|u| ("cs_sources", u))) {
            if let Err(e) = url::Url::parse(value) {
                anyhow::bail!("{} is not a valid URL ({}): {}", name, value, e);
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            windows: TimeWindows {
                upcoming: chrono::Duration::hours(self.upcoming_window_hours),
                stale_cutoff: chrono::Duration::hours(self.stale_cutoff_hours),
            },
            placeholders: self.placeholders,
            live_deadline: Duration::from_millis(self.live_timeout_ms),
        }
    }
}
