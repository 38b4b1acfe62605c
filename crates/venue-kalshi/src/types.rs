//! Wire-level data models for the venue's REST and streaming APIs.
//!
//! All prices are integer cents in `1..=99`; quantities are non-negative
//! contract counts. The venue publishes only bid ladders on both the yes and
//! no side of a market — there is no separate ask ladder on the wire. Asks
//! are always implied: `100 - best_opposite_bid` (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Market
// =============================================================================

/// Market status as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Open,
    Closed,
    Settled,
    Paused,
}

/// A tradeable market (one outcome of an event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    pub event_ticker: String,
    pub title: String,
    pub status: MarketStatus,

    /// Settlement/expiration time, when known. Required for the temporal strategy's
    /// pair ordering.
    pub expiration_time: Option<DateTime<Utc>>,

    /// Best quoted prices, cents. Summary fields only — not the full book.
    pub yes_bid: Option<u32>,
    pub yes_ask: Option<u32>,
    pub no_bid: Option<u32>,
    pub no_ask: Option<u32>,
}

impl Market {
    #[must_use]
    pub fn is_tradeable(&self) -> bool {
        self.status == MarketStatus::Open
    }
}

// =============================================================================
// Side / Action / Order type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    #[must_use]
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_api_str().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    #[must_use]
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_api_str().to_uppercase())
    }
}

/// Order type. The venue's IOC semantics are modeled as a short-lived limit
/// order rather than a dedicated wire discriminator — see DESIGN.md (Open
/// Question b).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Request to submit an order (§6 `POST /portfolio/orders`).
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub ticker: String,
    pub side: Side,
    pub action: Action,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub count: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Short time-in-force expiration, used to realize immediate-or-cancel
    /// semantics (§4.9, §9 Open Question b).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ts: Option<i64>,
}

impl OrderRequest {
    /// Builds an IOC limit order: `price` is denominated on `side`.
    #[must_use]
    pub fn ioc_limit(
        ticker: impl Into<String>,
        side: Side,
        action: Action,
        price_cents: u32,
        count: u32,
        client_order_id: impl Into<String>,
    ) -> Self {
        let (yes_price, no_price) = match side {
            Side::Yes => (Some(price_cents), None),
            Side::No => (None, Some(price_cents)),
        };
        Self {
            ticker: ticker.into(),
            side,
            action,
            order_type: OrderType::Limit,
            count,
            yes_price,
            no_price,
            client_order_id: Some(client_order_id.into()),
            // A few seconds out is enough for an immediate cross; anything still
            // resting past this window is treated as unfilled by the executor.
            expiration_ts: Some(Utc::now().timestamp() + 5),
        }
    }

    #[must_use]
    pub fn price_cents(&self) -> Option<u32> {
        self.yes_price.or(self.no_price)
    }
}

/// Status of an order (§3). `Executed`/`Partial`/`Canceled` are terminal —
/// they never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Resting,
    Executed,
    Partial,
    Canceled,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Partial | Self::Canceled)
    }
}

/// An order as reported by the venue, on submission or on a status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub ticker: String,
    pub side: Side,
    pub action: Action,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Option<u32>,
    pub count: u32,
    pub remaining_count: u32,
    pub created_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
}

impl Order {
    #[must_use]
    pub fn filled_count(&self) -> u32 {
        self.count.saturating_sub(self.remaining_count)
    }

    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.status == OrderStatus::Executed
    }
}

// =============================================================================
// Position / Balance / Fill
// =============================================================================

/// A position in one market (§3). `side` is derived from the sign of
/// `net_contracts`, not stored independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    /// Positive = net long YES, negative = net long NO.
    pub net_contracts: i64,
    pub market_exposure_cents: i64,
    pub resting_orders_count: u32,
}

impl Position {
    #[must_use]
    pub fn side(&self) -> Option<Side> {
        match self.net_contracts.cmp(&0) {
            std::cmp::Ordering::Greater => Some(Side::Yes),
            std::cmp::Ordering::Less => Some(Side::No),
            std::cmp::Ordering::Equal => None,
        }
    }

    #[must_use]
    pub fn flat(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            net_contracts: 0,
            market_exposure_cents: 0,
            resting_orders_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub balance_cents: i64,
    pub available_balance_cents: i64,
}

/// A single fill (§3, `GET /portfolio/fills`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub order_id: String,
    pub ticker: String,
    pub side: Side,
    pub action: Action,
    pub price: u32,
    pub count: u32,
    pub created_time: DateTime<Utc>,
    pub is_taker: bool,
}

// =============================================================================
// Orderbook
// =============================================================================

/// One price level. A level with `count == 0` is absent, never stored (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: u32,
    pub count: u64,
}

/// Per-market order book: a yes-bid ladder and a no-bid ladder, nothing else.
/// Both are sorted descending by price with unique prices per ladder (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orderbook {
    pub ticker: String,
    pub yes_bids: Vec<PriceLevel>,
    pub no_bids: Vec<PriceLevel>,
    pub timestamp: DateTime<Utc>,
}

impl Orderbook {
    #[must_use]
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            yes_bids: Vec::new(),
            no_bids: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn ladder(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Yes => &self.yes_bids,
            Side::No => &self.no_bids,
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut Vec<PriceLevel> {
        match side {
            Side::Yes => &mut self.yes_bids,
            Side::No => &mut self.no_bids,
        }
    }

    #[must_use]
    pub fn best_bid(&self, side: Side) -> Option<PriceLevel> {
        self.ladder(side).first().copied()
    }

    #[must_use]
    pub fn best_yes_bid(&self) -> Option<PriceLevel> {
        self.best_bid(Side::Yes)
    }

    #[must_use]
    pub fn best_no_bid(&self) -> Option<PriceLevel> {
        self.best_bid(Side::No)
    }

    /// Price at which `side` can be bought immediately, by crossing the best
    /// bid on the opposite side, and the quantity available there.
    #[must_use]
    pub fn implied_ask(&self, side: Side) -> Option<PriceLevel> {
        let opposite = self.best_bid(side.opposite())?;
        Some(PriceLevel {
            price: 100 - opposite.price,
            count: opposite.count,
        })
    }

    #[must_use]
    pub fn implied_yes_ask(&self) -> Option<PriceLevel> {
        self.implied_ask(Side::Yes)
    }

    #[must_use]
    pub fn implied_no_ask(&self) -> Option<PriceLevel> {
        self.implied_ask(Side::No)
    }

    /// Cost in cents to immediately acquire `quantity` of `side`, or `None`
    /// if the implied ask doesn't have enough quantity at its single best
    /// level (§4.4 — this does not walk the book, only the top level).
    #[must_use]
    pub fn acquisition_cost(&self, side: Side, quantity: u64) -> Option<u64> {
        let ask = self.implied_ask(side)?;
        if ask.count < quantity {
            return None;
        }
        Some(u64::from(ask.price) * quantity)
    }

    /// Replaces the absolute quantity at `price` on `side`. A quantity of 0
    /// removes the level. New levels are inserted keeping descending,
    /// unique-price order (§4.4).
    pub fn apply_delta(&mut self, side: Side, price: u32, quantity: u64) {
        let ladder = self.ladder_mut(side);
        let pos = ladder.iter().position(|l| l.price == price);
        match (pos, quantity) {
            (Some(idx), 0) => {
                ladder.remove(idx);
            }
            (Some(idx), qty) => {
                ladder[idx].count = qty;
            }
            (None, 0) => {}
            (None, qty) => {
                let insert_at = ladder.partition_point(|l| l.price > price);
                ladder.insert(insert_at, PriceLevel { price, count: qty });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Orderbook {
        let mut b = Orderbook::empty("KXTEST");
        b.apply_delta(Side::Yes, 45, 100);
        b.apply_delta(Side::Yes, 44, 200);
        b.apply_delta(Side::No, 53, 150);
        b
    }

    #[test]
    fn ladders_sorted_descending() {
        let b = book();
        assert_eq!(b.yes_bids[0].price, 45);
        assert_eq!(b.yes_bids[1].price, 44);
    }

    #[test]
    fn implied_yes_ask_is_100_minus_best_no_bid() {
        let b = book();
        let ask = b.implied_yes_ask().unwrap();
        assert_eq!(ask.price, 47);
        assert_eq!(ask.count, 150);
    }

    #[test]
    fn implied_no_ask_is_100_minus_best_yes_bid() {
        let b = book();
        let ask = b.implied_no_ask().unwrap();
        assert_eq!(ask.price, 55);
        assert_eq!(ask.count, 100);
    }

    #[test]
    fn zero_quantity_delta_removes_level() {
        let mut b = book();
        b.apply_delta(Side::Yes, 45, 0);
        assert!(b.yes_bids.iter().all(|l| l.price != 45));
    }

    #[test]
    fn repeated_zero_delta_is_idempotent() {
        let mut b = book();
        b.apply_delta(Side::Yes, 45, 0);
        let after_first = b.yes_bids.clone();
        b.apply_delta(Side::Yes, 45, 0);
        assert_eq!(after_first, b.yes_bids);
    }

    #[test]
    fn acquisition_cost_none_when_insufficient_liquidity() {
        let b = book();
        assert_eq!(b.acquisition_cost(Side::Yes, 1_000), None);
    }

    #[test]
    fn acquisition_cost_computed_from_implied_ask() {
        let b = book();
        assert_eq!(b.acquisition_cost(Side::Yes, 10), Some(47 * 10));
    }

    #[test]
    fn new_level_inserted_in_descending_order() {
        let mut b = book();
        b.apply_delta(Side::Yes, 46, 10);
        assert_eq!(
            b.yes_bids.iter().map(|l| l.price).collect::<Vec<_>>(),
            vec![46, 45, 44]
        );
    }

    #[test]
    fn order_status_terminal_states() {
        assert!(OrderStatus::Executed.is_terminal());
        assert!(OrderStatus::Partial.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Resting.is_terminal());
    }

    #[test]
    fn position_side_from_sign() {
        let mut p = Position::flat("KXTEST");
        p.net_contracts = 10;
        assert_eq!(p.side(), Some(Side::Yes));
        p.net_contracts = -5;
        assert_eq!(p.side(), Some(Side::No));
        p.net_contracts = 0;
        assert_eq!(p.side(), None);
    }

    #[test]
    fn ioc_limit_sets_expiration_shortly_out() {
        let req = OrderRequest::ioc_limit("KXTEST", Side::Yes, Action::Buy, 45, 10, "grp-KXTEST");
        assert_eq!(req.yes_price, Some(45));
        assert!(req.expiration_ts.unwrap() > Utc::now().timestamp());
    }
}
