use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sports the tracker knows how to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Lol,
    Csgo,
    Valorant,
}

impl Sport {
    pub const ALL: [Sport; 4] = [Sport::Nba, Sport::Lol, Sport::Csgo, Sport::Valorant];

    /// Query-string key used by the HTTP API.
    pub fn key(&self) -> &'static str {
        match self {
            Sport::Nba => "nba",
            Sport::Lol => "lol",
            Sport::Csgo => "csgo",
            Sport::Valorant => "valorant",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Sport::Nba => "NBA",
            Sport::Lol => "League of Legends",
            Sport::Csgo => "Counter-Strike",
            Sport::Valorant => "VALORANT",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported sport \"{0}\"")]
pub struct UnknownSport(pub String);

impl FromStr for Sport {
    type Err = UnknownSport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nba" => Ok(Sport::Nba),
            "lol" => Ok(Sport::Lol),
            "csgo" | "cs2" | "cs" => Ok(Sport::Csgo),
            "valorant" => Ok(Sport::Valorant),
            _ => Err(UnknownSport(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Final,
    Unknown,
}

/// One side of a basketball game, kept for alias lookup and the scoreboard view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLine {
    /// Three-letter team code ("LAL")
    pub code: String,
    /// Nickname ("Lakers")
    pub name: String,
    /// City or location ("Los Angeles")
    pub city: String,
    pub score: Option<u32>,
}

/// Source-agnostic representation of one scheduled, live or finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMatch {
    /// Stable identity within one provider's result set
    pub match_id: String,
    /// "TeamA vs TeamB" or "AWY @ HOM"
    pub label: String,
    pub status: MatchStatus,
    /// Upstream wording of the status, or the demo marker for placeholder data
    pub status_text: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub league: String,
    pub score: Option<String>,
    pub clock: Option<String>,
    pub stream_url: Option<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<TeamLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away: Option<TeamLine>,
}

impl CanonicalMatch {
    /// Minimal record with everything optional left empty.
    pub fn new(match_id: impl Into<String>, label: impl Into<String>, league: impl Into<String>) -> Self {
        CanonicalMatch {
            match_id: match_id.into(),
            label: label.into(),
            status: MatchStatus::Unknown,
            status_text: None,
            start_time: None,
            league: league.into(),
            score: None,
            clock: None,
            stream_url: None,
            last_updated: Utc::now(),
            home: None,
            away: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }

    /// Start time in epoch millis, with unknown starts mapped to `i64::MAX`
    /// so comparators stay total.
    pub fn start_sort_key(&self) -> i64 {
        self.start_time
            .map(|t| t.timestamp_millis())
            .unwrap_or(i64::MAX)
    }

    /// Team codes of a basketball game, home first.
    pub fn team_codes(&self) -> impl Iterator<Item = &str> {
        self.home
            .iter()
            .chain(self.away.iter())
            .map(|t| t.code.as_str())
    }
}

/// What a provider hands back for one sport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub games: Vec<CanonicalMatch>,
    /// Subset of `games` starting within the upcoming window
    pub upcoming: Vec<CanonicalMatch>,
    /// Set only when the result is degraded
    pub warning: Option<String>,
}
