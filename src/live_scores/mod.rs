pub mod aggregate;
pub mod combinator;
pub mod counter_strike;
pub mod fetcher;
pub mod nba;
pub mod normalize;
pub mod placeholder;
pub mod provider;
pub mod riot;

#[cfg(test)]
pub(crate) mod testing;

pub use provider::SportProvider;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::models::Sport;
use counter_strike::CounterStrikeProvider;
use fetcher::SourceFetcher;
use nba::NbaProvider;
use riot::{LolProvider, RiotGateway, ValorantProvider};

/// One provider per sport.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Sport, Arc<dyn SportProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the provider for its sport.
    pub fn register(&mut self, provider: Arc<dyn SportProvider>) {
        self.providers.insert(provider.sport(), provider);
    }

    pub fn get(&self, sport: Sport) -> Option<Arc<dyn SportProvider>> {
        self.providers.get(&sport).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Wire every sport to its upstream sources.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = SourceFetcher::new(config.fetch_timeout())?;
        let settings = config.provider_settings();

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(NbaProvider::new(
            fetcher.clone(),
            settings,
            &config.nba_cdn_url,
            &config.espn_nba_url,
        )));
        registry.register(Arc::new(LolProvider::new(
            RiotGateway::new(
                fetcher.clone(),
                "lolesports",
                &config.lol_schedule_url,
                &config.lol_live_url,
                &config.lol_api_key,
            ),
            &config.lol_live_stats_url,
            settings,
        )));
        registry.register(Arc::new(ValorantProvider::new(
            RiotGateway::new(
                fetcher.clone(),
                "valorantesports",
                &config.val_schedule_url,
                &config.val_live_url,
                &config.lol_api_key,
            ),
            fetcher.clone(),
            &config.vlr_url,
            settings,
        )));
        registry.register(Arc::new(CounterStrikeProvider::new(
            fetcher,
            config.cs_sources.clone(),
            settings,
        )));

        for sport in Sport::ALL {
            if let Some(p) = registry.get(sport) {
                info!("Provider for {}: {}", sport.display_name(), p.name());
            }
        }
        Ok(registry)
    }
}
