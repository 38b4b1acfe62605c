//! Strategy orchestration (§4.8): runs the enabled strategies over a
//! `(markets, books)` snapshot, ranks the candidates, and revalidates a
//! chosen opportunity immediately before submission.

use std::cmp::Ordering;
use std::collections::HashMap;

use venue_kalshi::types::{Action, Market, Orderbook};

use crate::fees::FeeCalculator;
use crate::strategies::correlated::{self, CorrelationRule};
use crate::strategies::{multi_outcome, temporal};
use crate::types::Opportunity;

/// Which strategies are active. All on by default; an operator may disable
/// any subset through configuration.
#[derive(Debug, Clone, Copy)]
pub struct StrategyToggles {
    pub multi_outcome: bool,
    pub temporal: bool,
    pub correlated: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self { multi_outcome: true, temporal: true, correlated: true }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub min_profit_cents: i64,
    pub min_temporal_price_diff: u32,
    pub min_equivalent_diff: u32,
    pub correlation_rules: Vec<CorrelationRule>,
    pub enabled: StrategyToggles,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_profit_cents: 2,
            min_temporal_price_diff: temporal::default_min_price_diff(),
            min_equivalent_diff: correlated::default_min_equivalent_diff(),
            correlation_rules: CorrelationRule::default_rules(),
            enabled: StrategyToggles::default(),
        }
    }
}

/// Coordinates the three pure strategies over one scan tick's snapshot
/// (§4.8). Holds no book/market state of its own — the engine's scan loop
/// supplies a fresh snapshot every call.
pub struct Detector {
    config: DetectorConfig,
    fee_calc: FeeCalculator,
}

impl Detector {
    #[must_use]
    pub fn new(config: DetectorConfig, fee_calc: FeeCalculator) -> Self {
        Self { config, fee_calc }
    }

    /// Runs every enabled strategy over `markets` (assumed to span one or
    /// more events) and `books`, returning every candidate found — callers
    /// typically narrow this with [`Detector::best_of`] per event.
    #[must_use]
    pub fn detect_all(&self, markets: &[Market], books: &HashMap<String, Orderbook>) -> Vec<Opportunity> {
        let mut candidates = Vec::new();

        if self.config.enabled.multi_outcome {
            let mut by_event: HashMap<&str, Vec<Market>> = HashMap::new();
            for market in markets {
                if market.is_tradeable() {
                    by_event.entry(&market.event_ticker).or_default().push(market.clone());
                }
            }
            for event_markets in by_event.values() {
                if let Some(opp) =
                    multi_outcome::detect(event_markets, books, self.config.min_profit_cents, &self.fee_calc)
                {
                    candidates.push(opp);
                }
            }
        }

        if self.config.enabled.temporal {
            for (earlier, later) in temporal::find_temporal_pairs(markets) {
                let (Some(earlier_book), Some(later_book)) =
                    (books.get(&earlier.ticker), books.get(&later.ticker))
                else {
                    continue;
                };
                if let Some(opp) = temporal::detect(
                    &earlier,
                    &later,
                    earlier_book,
                    later_book,
                    self.config.min_profit_cents,
                    self.config.min_temporal_price_diff,
                    &self.fee_calc,
                ) {
                    candidates.push(opp);
                }
            }
        }

        if self.config.enabled.correlated {
            candidates.extend(correlated::detect(
                markets,
                books,
                &self.config.correlation_rules,
                self.config.min_profit_cents,
                self.config.min_equivalent_diff,
                &self.fee_calc,
            ));
        }

        candidates
    }

    /// Picks the best candidate by the lexicographic key
    /// `(net_profit, confidence, max_quantity)`, among profitable ones only.
    #[must_use]
    pub fn best_of(candidates: &[Opportunity]) -> Option<&Opportunity> {
        candidates
            .iter()
            .filter(|o| o.is_profitable())
            .max_by(|a, b| {
                a.net_profit_cents
                    .cmp(&b.net_profit_cents)
                    .then_with(|| a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal))
                    .then_with(|| a.max_quantity.cmp(&b.max_quantity))
            })
    }

    /// Hard gate immediately before submission (§4.8): re-reads `books` and
    /// confirms every BUY leg's implied ask is still at or below its
    /// committed price, every SELL leg's bid is still at or above it, and
    /// the quoted level still carries at least `opportunity.max_quantity`.
    #[must_use]
    pub fn validate(&self, opportunity: &Opportunity, books: &HashMap<String, Orderbook>) -> bool {
        for leg in &opportunity.legs {
            let Some(book) = books.get(&leg.ticker) else {
                return false;
            };
            let current = match leg.action {
                Action::Buy => book.implied_yes_ask(),
                Action::Sell => book.best_yes_bid(),
            };
            let Some(level) = current else {
                return false;
            };
            let price_ok = match leg.action {
                Action::Buy => level.price <= leg.price,
                Action::Sell => level.price >= leg.price,
            };
            if !price_ok || level.count < opportunity.max_quantity {
                return false;
            }
        }
        true
    }
}
