//! Market catalog: fetches and caches market metadata per event (§2).
//!
//! The engine's scan loop consults the catalog instead of hitting the venue
//! on every tick; a cache entry is refreshed only when [`MarketCatalog::refresh`]
//! is called explicitly (on `watch_event`, or periodically by the caller).

use std::collections::HashMap;

use parking_lot::RwLock;
use venue_kalshi::types::Market;
use venue_kalshi::{KalshiClient, Result};

pub struct MarketCatalog {
    client: std::sync::Arc<KalshiClient>,
    by_event: RwLock<HashMap<String, Vec<Market>>>,
}

impl MarketCatalog {
    #[must_use]
    pub fn new(client: std::sync::Arc<KalshiClient>) -> Self {
        Self {
            client,
            by_event: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches every market for `event_ticker` from the venue and replaces
    /// the cached entry.
    ///
    /// # Errors
    /// Returns an error if the venue request fails.
    pub async fn refresh(&self, event_ticker: &str) -> Result<Vec<Market>> {
        let mut markets = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (page, next_cursor) = self
                .client
                .get_markets(Some(event_ticker), None, Some(100), cursor.as_deref())
                .await?;
            markets.extend(page);
            match next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }
        self.by_event.write().insert(event_ticker.to_string(), markets.clone());
        Ok(markets)
    }

    /// Returns the cached markets for `event_ticker`, if any have been
    /// fetched. Does not hit the network.
    #[must_use]
    pub fn cached(&self, event_ticker: &str) -> Vec<Market> {
        self.by_event.read().get(event_ticker).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn cached_events(&self) -> Vec<String> {
        self.by_event.read().keys().cloned().collect()
    }
}
