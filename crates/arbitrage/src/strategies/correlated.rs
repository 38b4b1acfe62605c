//! Correlated-markets arbitrage: a pair of markets linked by a logical rule
//! (one implies the other, excludes the other, or is equivalent to it)
//! mispriced relative to that relationship (§4.6.3).

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;
use venue_kalshi::types::{Market, Orderbook, Side};

use crate::fees::FeeCalculator;
use crate::types::{Leg, Opportunity, OpportunityType};

/// Minimum bid/ask gap (cents) that counts as a violation for EQUIVALENT
/// rules; IMPLIES and EXCLUDES are violations at any positive gap since they
/// are logical guarantees rather than a statistical correlation.
const DEFAULT_MIN_EQUIVALENT_DIFF: u32 = 2;
const CONFIDENCE: f64 = 0.75;

/// The logical relationship a [`CorrelationRule`] asserts between its two
/// ticker patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// A occurring implies B occurs: `bid_A` must never exceed `ask_B`.
    Implies,
    /// A and B cannot both occur: `ask_A + ask_B` must never fall under 100.
    Excludes,
    /// A and B are the same event under different tickers.
    Equivalent,
}

/// A glob-style pattern pair asserting [`RelationKind`] between any two
/// markets whose tickers match `left` and `right` respectively (in either
/// order — see [`CorrelationRule::matches`]).
#[derive(Debug, Clone)]
pub struct CorrelationRule {
    pub left: String,
    pub right: String,
    pub kind: RelationKind,
}

impl CorrelationRule {
    #[must_use]
    pub fn new(left: impl Into<String>, right: impl Into<String>, kind: RelationKind) -> Self {
        Self { left: left.into(), right: right.into(), kind }
    }

    /// Returns `Some((a, b))` with `a` matching `left` and `b` matching
    /// `right` if the rule applies to `(m1, m2)` in either ordering.
    #[must_use]
    pub fn matches<'a>(&self, m1: &'a Market, m2: &'a Market) -> Option<(&'a Market, &'a Market)> {
        if ticker_glob_match(&self.left, &m1.ticker) && ticker_glob_match(&self.right, &m2.ticker) {
            Some((m1, m2))
        } else if ticker_glob_match(&self.left, &m2.ticker) && ticker_glob_match(&self.right, &m1.ticker) {
            Some((m2, m1))
        } else {
            None
        }
    }

    /// The two illustrative rules from the original system: a championship
    /// or playoffs market implies its corresponding series/round winner, and
    /// a party's nomination implies that candidate winning the primary.
    #[must_use]
    pub fn default_rules() -> Vec<Self> {
        vec![
            Self::new("KX*CHAMP*", "KX*PLAYOFF*", RelationKind::Implies),
            Self::new("KX*NOM*", "KX*PRIMARY*", RelationKind::Implies),
        ]
    }
}

/// Minimal `*`-wildcard matcher (no other metacharacters): `*` consumes any
/// run of characters, everything else must match literally. Sufficient for
/// ticker prefixes/suffixes without pulling in a glob crate nothing else in
/// this codebase depends on.
#[must_use]
pub fn ticker_glob_match(pattern: &str, candidate: &str) -> bool {
    fn inner(pattern: &[u8], candidate: &[u8]) -> bool {
        match pattern.first() {
            None => candidate.is_empty(),
            Some(b'*') => {
                let rest = &pattern[1..];
                (0..=candidate.len()).any(|i| inner(rest, &candidate[i..]))
            }
            Some(&c) => candidate.first() == Some(&c) && inner(&pattern[1..], &candidate[1..]),
        }
    }
    inner(pattern.as_bytes(), candidate.as_bytes())
}

/// Evaluates every rule against every unordered pair of `markets`, returning
/// the first profitable violation found, ranked by discovery order (the
/// detector re-ranks candidates from all strategies afterward).
#[must_use]
pub fn detect(
    markets: &[Market],
    books: &HashMap<String, Orderbook>,
    rules: &[CorrelationRule],
    min_profit_cents: i64,
    min_equivalent_diff: u32,
    fee_calc: &FeeCalculator,
) -> Vec<Opportunity> {
    let mut found = Vec::new();
    for i in 0..markets.len() {
        for j in (i + 1)..markets.len() {
            for rule in rules {
                let Some((a, b)) = rule.matches(&markets[i], &markets[j]) else {
                    continue;
                };
                let Some((book_a, book_b)) = books.get(&a.ticker).zip(books.get(&b.ticker)) else {
                    continue;
                };
                if let Some(opp) = evaluate(
                    a,
                    b,
                    book_a,
                    book_b,
                    rule.kind,
                    min_profit_cents,
                    min_equivalent_diff,
                    fee_calc,
                ) {
                    found.push(opp);
                }
            }
        }
    }
    found
}

fn evaluate(
    a: &Market,
    b: &Market,
    book_a: &Orderbook,
    book_b: &Orderbook,
    kind: RelationKind,
    min_profit_cents: i64,
    min_equivalent_diff: u32,
    fee_calc: &FeeCalculator,
) -> Option<Opportunity> {
    match kind {
        RelationKind::Implies => implies_violation(a, b, book_a, book_b, min_profit_cents, fee_calc),
        RelationKind::Excludes => excludes_violation(a, b, book_a, book_b, min_profit_cents, fee_calc),
        RelationKind::Equivalent => {
            equivalent_violation(a, b, book_a, book_b, min_profit_cents, min_equivalent_diff, fee_calc)
                .or_else(|| equivalent_violation(b, a, book_b, book_a, min_profit_cents, min_equivalent_diff, fee_calc))
        }
    }
}

/// `bid_A > ask_B`: sell the bid on A, buy the ask on B; both legs can never
/// both be on the losing side since A implies B.
fn implies_violation(
    a: &Market,
    b: &Market,
    book_a: &Orderbook,
    book_b: &Orderbook,
    min_profit_cents: i64,
    fee_calc: &FeeCalculator,
) -> Option<Opportunity> {
    let bid_a = book_a.best_yes_bid()?;
    let ask_b = book_b.implied_yes_ask()?;
    if bid_a.price <= ask_b.price {
        return None;
    }
    let gross = i64::from(bid_a.price) - i64::from(ask_b.price);
    // Legs carry quantity 1 at detection time; the executor scales by max_quantity (§4.6.1).
    let fees = fee_calc.estimate_fees(&[ask_b.price], 1) as i64;
    let net = gross - fees;
    if net < min_profit_cents {
        return None;
    }
    let max_quantity = bid_a.count.min(ask_b.count);
    if max_quantity == 0 {
        return None;
    }

    Some(Opportunity {
        id: Uuid::new_v4(),
        opportunity_type: OpportunityType::Correlated,
        event_ticker: a.event_ticker.clone(),
        legs: vec![
            Leg::sell(&a.ticker, Side::Yes, bid_a.price),
            Leg::buy(&b.ticker, Side::Yes, ask_b.price),
        ],
        total_cost_cents: i64::from(ask_b.price).saturating_sub(i64::from(bid_a.price)).max(0),
        guaranteed_return_cents: gross,
        gross_profit_cents: gross,
        est_fees_cents: fees,
        net_profit_cents: net,
        max_quantity,
        detected_at: Utc::now(),
        confidence: CONFIDENCE,
    })
}

/// `ask_A + ask_B < 100`: buying YES on both is structurally a two-leg
/// multi-outcome trade, since at most one of a mutually-exclusive pair pays.
fn excludes_violation(
    a: &Market,
    b: &Market,
    book_a: &Orderbook,
    book_b: &Orderbook,
    min_profit_cents: i64,
    fee_calc: &FeeCalculator,
) -> Option<Opportunity> {
    let ask_a = book_a.implied_yes_ask()?;
    let ask_b = book_b.implied_yes_ask()?;
    let total_cost = i64::from(ask_a.price) + i64::from(ask_b.price);
    if total_cost >= 100 {
        return None;
    }
    let gross = 100 - total_cost;
    let max_quantity = ask_a.count.min(ask_b.count);
    // Legs carry quantity 1 at detection time; the executor scales by max_quantity (§4.6.1).
    let fees = fee_calc.estimate_fees(&[ask_a.price, ask_b.price], 1) as i64;
    let net = gross - fees;
    if net < min_profit_cents || max_quantity == 0 {
        return None;
    }

    Some(Opportunity {
        id: Uuid::new_v4(),
        opportunity_type: OpportunityType::Correlated,
        event_ticker: a.event_ticker.clone(),
        legs: vec![
            Leg::buy(&a.ticker, Side::Yes, ask_a.price),
            Leg::buy(&b.ticker, Side::Yes, ask_b.price),
        ],
        total_cost_cents: total_cost,
        guaranteed_return_cents: 100,
        gross_profit_cents: gross,
        est_fees_cents: fees,
        net_profit_cents: net,
        max_quantity,
        detected_at: Utc::now(),
        confidence: CONFIDENCE,
    })
}

/// `bid_A - ask_B >= threshold`: sell the high bid, buy the low ask on a pair
/// asserted to track the same underlying event.
fn equivalent_violation(
    high: &Market,
    low: &Market,
    book_high: &Orderbook,
    book_low: &Orderbook,
    min_profit_cents: i64,
    min_diff: u32,
    fee_calc: &FeeCalculator,
) -> Option<Opportunity> {
    let bid_high = book_high.best_yes_bid()?;
    let ask_low = book_low.implied_yes_ask()?;
    if bid_high.price <= ask_low.price {
        return None;
    }
    let diff = bid_high.price - ask_low.price;
    if diff < min_diff {
        return None;
    }
    let gross = i64::from(diff);
    let max_quantity = bid_high.count.min(ask_low.count);
    // Legs carry quantity 1 at detection time; the executor scales by max_quantity (§4.6.1).
    let fees = fee_calc.estimate_fees(&[ask_low.price], 1) as i64;
    let net = gross - fees;
    if net < min_profit_cents || max_quantity == 0 {
        return None;
    }

    Some(Opportunity {
        id: Uuid::new_v4(),
        opportunity_type: OpportunityType::Correlated,
        event_ticker: high.event_ticker.clone(),
        legs: vec![
            Leg::sell(&high.ticker, Side::Yes, bid_high.price),
            Leg::buy(&low.ticker, Side::Yes, ask_low.price),
        ],
        total_cost_cents: i64::from(ask_low.price).saturating_sub(i64::from(bid_high.price)).max(0),
        guaranteed_return_cents: gross,
        gross_profit_cents: gross,
        est_fees_cents: fees,
        net_profit_cents: net,
        max_quantity,
        detected_at: Utc::now(),
        confidence: CONFIDENCE,
    })
}

#[must_use]
pub fn default_min_equivalent_diff() -> u32 {
    DEFAULT_MIN_EQUIVALENT_DIFF
}

#[cfg(test)]
mod tests {
    use super::*;
    use venue_kalshi::types::MarketStatus;

    fn market(ticker: &str, event_ticker: &str) -> Market {
        Market {
            ticker: ticker.to_string(),
            event_ticker: event_ticker.to_string(),
            title: ticker.to_string(),
            status: MarketStatus::Open,
            expiration_time: None,
            yes_bid: None,
            yes_ask: None,
            no_bid: None,
            no_ask: None,
        }
    }

    #[test]
    fn glob_matches_prefix_and_suffix_wildcards() {
        assert!(ticker_glob_match("KX*CHAMP*", "KXNBACHAMP-LAL"));
        assert!(!ticker_glob_match("KX*CHAMP*", "KXNBAPLAYOFF-LAL"));
        assert!(ticker_glob_match("*", "anything"));
        assert!(ticker_glob_match("KXEVT-A", "KXEVT-A"));
        assert!(!ticker_glob_match("KXEVT-A", "KXEVT-B"));
    }

    #[test]
    fn rule_matches_either_ordering_of_the_pair() {
        let rule = CorrelationRule::new("KX*CHAMP*", "KX*PLAYOFF*", RelationKind::Implies);
        let champ = market("KXNBACHAMP-LAL", "KXNBA");
        let playoff = market("KXNBAPLAYOFF-LAL", "KXNBA");
        assert!(rule.matches(&champ, &playoff).is_some());
        let (a, b) = rule.matches(&playoff, &champ).unwrap();
        assert_eq!(a.ticker, champ.ticker);
        assert_eq!(b.ticker, playoff.ticker);
    }

    #[test]
    fn implies_violation_when_bid_exceeds_ask() {
        let a = market("KXNBACHAMP-LAL", "KXNBA");
        let b = market("KXNBAPLAYOFF-LAL", "KXNBA");
        let mut book_a = Orderbook::empty(&a.ticker);
        book_a.apply_delta(Side::Yes, 70, 20); // bid_a = 70
        let mut book_b = Orderbook::empty(&b.ticker);
        book_b.apply_delta(Side::No, 40, 30); // implied ask_b = 60

        let rules = vec![CorrelationRule::new("KX*CHAMP*", "KX*PLAYOFF*", RelationKind::Implies)];
        let books: HashMap<_, _> = [(a.ticker.clone(), book_a), (b.ticker.clone(), book_b)].into_iter().collect();
        let opps = detect(&[a, b], &books, &rules, 2, 2, &FeeCalculator::default());
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].gross_profit_cents, 10);
        assert_eq!(opps[0].max_quantity, 20);
    }

    #[test]
    fn no_violation_when_implication_is_priced_consistently() {
        let a = market("KXNBACHAMP-LAL", "KXNBA");
        let b = market("KXNBAPLAYOFF-LAL", "KXNBA");
        let mut book_a = Orderbook::empty(&a.ticker);
        book_a.apply_delta(Side::Yes, 40, 20);
        let mut book_b = Orderbook::empty(&b.ticker);
        book_b.apply_delta(Side::No, 40, 30); // implied ask_b = 60 >= bid_a

        let rules = vec![CorrelationRule::new("KX*CHAMP*", "KX*PLAYOFF*", RelationKind::Implies)];
        let books: HashMap<_, _> = [(a.ticker.clone(), book_a), (b.ticker.clone(), book_b)].into_iter().collect();
        assert!(detect(&[a, b], &books, &rules, 2, 2, &FeeCalculator::default()).is_empty());
    }

    #[test]
    fn excludes_violation_when_asks_sum_under_payout() {
        let a = market("KXA", "KXEVT");
        let b = market("KXB", "KXEVT");
        let mut book_a = Orderbook::empty(&a.ticker);
        book_a.apply_delta(Side::No, 60, 20); // implied ask_a = 40
        let mut book_b = Orderbook::empty(&b.ticker);
        book_b.apply_delta(Side::No, 65, 30); // implied ask_b = 35

        let rules = vec![CorrelationRule::new("KXA", "KXB", RelationKind::Excludes)];
        let books: HashMap<_, _> = [(a.ticker.clone(), book_a), (b.ticker.clone(), book_b)].into_iter().collect();
        let opps = detect(&[a, b], &books, &rules, 2, 2, &FeeCalculator::default());
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].gross_profit_cents, 25);
    }

    #[test]
    fn equivalent_violation_requires_minimum_diff() {
        let a = market("KXA", "KXEVT");
        let b = market("KXB", "KXEVT");
        let mut book_a = Orderbook::empty(&a.ticker);
        book_a.apply_delta(Side::Yes, 51, 20); // bid_a = 51
        let mut book_b = Orderbook::empty(&b.ticker);
        book_b.apply_delta(Side::No, 50, 30); // implied ask_b = 50

        let rules = vec![CorrelationRule::new("KXA", "KXB", RelationKind::Equivalent)];
        let books: HashMap<_, _> = [(a.ticker.clone(), book_a), (b.ticker.clone(), book_b)].into_iter().collect();
        // diff is only 1, below the default minimum of 2.
        assert!(detect(&[a, b], &books, &rules, 0, 2, &FeeCalculator::default()).is_empty());
    }

    #[test]
    fn missing_book_suppresses_detection() {
        let a = market("KXA", "KXEVT");
        let b = market("KXB", "KXEVT");
        let mut book_a = Orderbook::empty(&a.ticker);
        book_a.apply_delta(Side::Yes, 70, 20);
        let rules = vec![CorrelationRule::new("KXA", "KXB", RelationKind::Implies)];
        let books: HashMap<_, _> = [(a.ticker.clone(), book_a)].into_iter().collect();
        assert!(detect(&[a, b], &books, &rules, 2, 2, &FeeCalculator::default()).is_empty());
    }
}
