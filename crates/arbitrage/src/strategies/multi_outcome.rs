//! Multi-outcome arbitrage: buying YES on every outcome of a mutually
//! exclusive, collectively exhaustive event for less than the guaranteed
//! payout (§4.6.1).

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;
use venue_kalshi::types::{Market, Orderbook, Side};

use crate::fees::FeeCalculator;
use crate::types::{Leg, Opportunity, OpportunityType};

const MIN_MARKETS: usize = 2;
const MAX_MARKETS: usize = 10;
/// Guaranteed payout to the correct side on resolution, cents.
const GUARANTEED_PAYOUT_CENTS: i64 = 100;

/// Detects a sum-of-asks-under-payout opportunity across `markets`.
///
/// `books` is the full set of currently tracked order books, not just the
/// ones for `markets` — coverage is measured against it, matching the
/// original implementation's confidence model.
#[must_use]
pub fn detect(
    markets: &[Market],
    books: &HashMap<String, Orderbook>,
    min_profit_cents: i64,
    fee_calc: &FeeCalculator,
) -> Option<Opportunity> {
    if markets.len() < MIN_MARKETS || markets.len() > MAX_MARKETS {
        return None;
    }

    let mut legs = Vec::with_capacity(markets.len());
    let mut buy_prices = Vec::with_capacity(markets.len());
    let mut quantities = Vec::with_capacity(markets.len());
    let mut total_cost: i64 = 0;

    for market in markets {
        let book = books.get(&market.ticker)?;
        let ask = book.implied_yes_ask()?;
        if ask.count == 0 {
            return None;
        }
        legs.push(Leg::buy(&market.ticker, Side::Yes, ask.price));
        buy_prices.push(ask.price);
        quantities.push(ask.count);
        total_cost += i64::from(ask.price);
    }

    if total_cost >= GUARANTEED_PAYOUT_CENTS {
        return None;
    }

    let max_quantity = quantities.iter().copied().min().unwrap_or(0);
    let gross_profit = GUARANTEED_PAYOUT_CENTS - total_cost;
    // Legs carry quantity 1 at detection time; the executor scales by max_quantity (§4.6.1).
    let fees = fee_calc.estimate_fees(&buy_prices, 1) as i64;
    let net_profit = gross_profit - fees;

    if net_profit < min_profit_cents || max_quantity == 0 {
        return None;
    }

    Some(Opportunity {
        id: Uuid::new_v4(),
        opportunity_type: OpportunityType::MultiOutcome,
        event_ticker: markets[0].event_ticker.clone(),
        legs,
        total_cost_cents: total_cost,
        guaranteed_return_cents: GUARANTEED_PAYOUT_CENTS,
        gross_profit_cents: gross_profit,
        est_fees_cents: fees,
        net_profit_cents: net_profit,
        max_quantity,
        detected_at: Utc::now(),
        confidence: confidence(markets, books, &quantities),
    })
}

/// `0.5 * quantity_score + 0.5 * coverage`, matching the original
/// implementation: `quantity_score` maxes out at 100 contracts of average
/// liquidity, `coverage` is the fraction of tracked books relative to the
/// number of markets in the event.
fn confidence(markets: &[Market], books: &HashMap<String, Orderbook>, quantities: &[u64]) -> f64 {
    if markets.is_empty() {
        return 0.0;
    }
    let avg_qty = quantities.iter().sum::<u64>() as f64 / quantities.len() as f64;
    let quantity_score = (avg_qty / 100.0).min(1.0);
    let coverage = books.len() as f64 / markets.len() as f64;
    quantity_score * 0.5 + coverage * 0.5
}
