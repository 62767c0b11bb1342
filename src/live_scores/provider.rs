use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::aggregate::{pick_by_query, TimeWindows};
use crate::models::{CanonicalMatch, ProviderResult, Sport};

/// Trait that every per-sport provider must implement.
#[async_trait]
pub trait SportProvider: Send + Sync {
    fn sport(&self) -> Sport;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Fetch, merge and order the current matches for this sport.
    ///
    /// Upstream outages are folded into `warning` (and placeholder data when
    /// enabled); an `Err` means something went wrong inside the provider itself.
    async fn get_data(&self) -> Result<ProviderResult>;

    /// Select one match from a previously fetched result.
    fn pick(&self, data: &ProviderResult, query: &str) -> Option<CanonicalMatch> {
        pick_by_query(&data.games, query)
    }
}

/// Knobs shared by every provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSettings {
    pub windows: TimeWindows,
    /// Serve demo matches when every source fails
    pub placeholders: bool,
    /// Deadline for "what is live right now" endpoints
    pub live_deadline: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            windows: TimeWindows::default(),
            placeholders: true,
            live_deadline: Duration::from_secs(4),
        }
    }
}
