//! Temporal arbitrage: markets on the same underlying with strictly ordered
//! expirations must be priced so that an earlier YES bid never exceeds a
//! later YES ask — if it does, selling the earlier and buying the later
//! locks in a profit regardless of how either resolves (§4.6.2).

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;
use venue_kalshi::types::{Market, Orderbook, Side};

use crate::fees::FeeCalculator;
use crate::types::{Leg, Opportunity, OpportunityType};

const DEFAULT_MIN_PRICE_DIFF: u32 = 3;
/// Time arbitrage's risk profile is well understood — every outcome branch
/// nets the same price difference — so it carries a fixed high confidence
/// rather than a computed one, matching the original implementation.
const CONFIDENCE: f64 = 0.9;

/// Groups `markets` by `event_ticker`, sorts each group by expiration, and
/// returns consecutive (earlier, later) pairs. Markets with no expiration are
/// excluded.
#[must_use]
pub fn find_temporal_pairs(markets: &[Market]) -> Vec<(Market, Market)> {
    let mut by_event: HashMap<&str, Vec<&Market>> = HashMap::new();
    for market in markets {
        if market.expiration_time.is_some() {
            by_event.entry(&market.event_ticker).or_default().push(market);
        }
    }

    let mut pairs = Vec::new();
    for group in by_event.values_mut() {
        if group.len() < 2 {
            continue;
        }
        group.sort_by_key(|m| m.expiration_time);
        for window in group.windows(2) {
            pairs.push((window[0].clone(), window[1].clone()));
        }
    }
    pairs
}

/// Detects a violation between one `(earlier, later)` pair.
#[must_use]
pub fn detect(
    earlier: &Market,
    later: &Market,
    earlier_book: &Orderbook,
    later_book: &Orderbook,
    min_profit_cents: i64,
    min_price_diff: u32,
    fee_calc: &FeeCalculator,
) -> Option<Opportunity> {
    match (earlier.expiration_time, later.expiration_time) {
        (Some(e), Some(l)) if e < l => {}
        _ => return None,
    }

    let bid_early = earlier_book.best_yes_bid()?;
    let ask_late = later_book.implied_yes_ask()?;

    if bid_early.price < ask_late.price {
        return None;
    }
    let price_diff = bid_early.price - ask_late.price;
    if price_diff < min_price_diff {
        return None;
    }

    let legs = vec![
        Leg::sell(&earlier.ticker, Side::Yes, bid_early.price),
        Leg::buy(&later.ticker, Side::Yes, ask_late.price),
    ];

    let gross_profit = i64::from(price_diff);
    // Legs carry quantity 1 at detection time; the executor scales by max_quantity (§4.6.1).
    let fees = fee_calc.estimate_fees(&[ask_late.price], 1) as i64;
    let net_profit = gross_profit - fees;
    if net_profit < min_profit_cents {
        return None;
    }

    let max_quantity = bid_early.count.min(ask_late.count);
    if max_quantity == 0 {
        return None;
    }

    Some(Opportunity {
        id: Uuid::new_v4(),
        opportunity_type: OpportunityType::Temporal,
        event_ticker: earlier.event_ticker.clone(),
        legs,
        total_cost_cents: (i64::from(ask_late.price) - i64::from(bid_early.price)).max(0),
        guaranteed_return_cents: gross_profit,
        gross_profit_cents: gross_profit,
        est_fees_cents: fees,
        net_profit_cents: net_profit,
        max_quantity,
        detected_at: Utc::now(),
        confidence: CONFIDENCE,
    })
}

/// Default minimum price difference used when not overridden by config.
#[must_use]
pub fn default_min_price_diff() -> u32 {
    DEFAULT_MIN_PRICE_DIFF
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use venue_kalshi::types::MarketStatus;

    fn market(ticker: &str, expiration_offset_secs: i64) -> Market {
        Market {
            ticker: ticker.to_string(),
            event_ticker: "KXUNDERLYING".to_string(),
            title: ticker.to_string(),
            status: MarketStatus::Open,
            expiration_time: Some(Utc::now() + Duration::seconds(expiration_offset_secs)),
            yes_bid: None,
            yes_ask: None,
            no_bid: None,
            no_ask: None,
        }
    }

    #[test]
    fn temporal_scenario_from_spec() {
        let earlier = market("KXUNDERLYING-T1", 3600);
        let later = market("KXUNDERLYING-T2", 7200);

        let mut earlier_book = Orderbook::empty(&earlier.ticker);
        earlier_book.apply_delta(Side::Yes, 60, 20);

        let mut later_book = Orderbook::empty(&later.ticker);
        // implied YES ask = 100 - best NO bid = 55 -> NO bid at 45.
        later_book.apply_delta(Side::No, 45, 30);

        let opp = detect(
            &earlier,
            &later,
            &earlier_book,
            &later_book,
            2,
            3,
            &FeeCalculator::default(),
        )
        .unwrap();

        assert_eq!(opp.gross_profit_cents, 5);
        assert!(opp.net_profit_cents >= 2);
        assert_eq!(opp.max_quantity, 20);
        assert_eq!(opp.legs.len(), 2);
        assert_eq!(opp.legs[0].action, venue_kalshi::types::Action::Sell);
        assert_eq!(opp.legs[1].action, venue_kalshi::types::Action::Buy);
    }

    #[test]
    fn price_diff_below_threshold_suppresses_detection() {
        let earlier = market("KXUNDERLYING-T1", 3600);
        let later = market("KXUNDERLYING-T2", 7200);

        let mut earlier_book = Orderbook::empty(&earlier.ticker);
        earlier_book.apply_delta(Side::Yes, 56, 20);

        let mut later_book = Orderbook::empty(&later.ticker);
        later_book.apply_delta(Side::No, 45, 30); // implied ask 55

        assert!(detect(
            &earlier,
            &later,
            &earlier_book,
            &later_book,
            2,
            3,
            &FeeCalculator::default(),
        )
        .is_none());
    }

    #[test]
    fn pairs_are_grouped_by_event_and_sorted_by_expiration() {
        let markets = vec![
            market("KXUNDERLYING-T2", 7200),
            market("KXUNDERLYING-T1", 3600),
            market("KXUNDERLYING-T3", 10800),
        ];
        let pairs = find_temporal_pairs(&markets);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.ticker, "KXUNDERLYING-T1");
        assert_eq!(pairs[0].1.ticker, "KXUNDERLYING-T2");
        assert_eq!(pairs[1].0.ticker, "KXUNDERLYING-T2");
        assert_eq!(pairs[1].1.ticker, "KXUNDERLYING-T3");
    }

    #[test]
    fn markets_without_expiration_are_excluded_from_pairing() {
        let mut no_expiry = market("KXUNDERLYING-T1", 3600);
        no_expiry.expiration_time = None;
        let markets = vec![no_expiry, market("KXUNDERLYING-T2", 7200)];
        assert!(find_temporal_pairs(&markets).is_empty());
    }

    #[test]
    fn reversed_expiration_order_is_rejected() {
        let earlier = market("KXUNDERLYING-T2", 7200);
        let later = market("KXUNDERLYING-T1", 3600);
        let book = Orderbook::empty("x");
        assert!(detect(&earlier, &later, &book, &book, 2, 3, &FeeCalculator::default()).is_none());
    }
}
