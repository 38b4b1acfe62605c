//! Shared data model for arbitrage detection and execution (§3).
//!
//! Everything here is a value type: strategies produce [`Opportunity`] records,
//! the executor consumes one and produces an [`OrderGroup`], and neither holds
//! a reference back into the book store or the venue client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venue_kalshi::types::{Action, Fill, Order, Side};

/// Which strategy produced an opportunity. Closed set — a new strategy means a
/// new variant, not a string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    MultiOutcome,
    Temporal,
    Correlated,
}

impl OpportunityType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultiOutcome => "multi_outcome",
            Self::Temporal => "temporal",
            Self::Correlated => "correlated",
        }
    }
}

impl std::fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One market component of a multi-market coordinated trade (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub ticker: String,
    pub side: Side,
    pub action: Action,
    /// Committed price in cents, denominated on `side`.
    pub price: u32,
}

impl Leg {
    #[must_use]
    pub fn buy(ticker: impl Into<String>, side: Side, price: u32) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            action: Action::Buy,
            price,
        }
    }

    #[must_use]
    pub fn sell(ticker: impl Into<String>, side: Side, price: u32) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            action: Action::Sell,
            price,
        }
    }
}

/// A candidate risk-free trade across one or more legs of the same logical
/// event group (§3, §4.6). `max_quantity` is the minimum liquidity available
/// across all legs at their committed prices; it bounds, but does not decide,
/// the quantity actually sent by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub opportunity_type: OpportunityType,
    pub event_ticker: String,
    pub legs: Vec<Leg>,
    pub total_cost_cents: i64,
    pub guaranteed_return_cents: i64,
    pub gross_profit_cents: i64,
    pub est_fees_cents: i64,
    pub net_profit_cents: i64,
    pub max_quantity: u64,
    pub detected_at: DateTime<Utc>,
    pub confidence: f64,
}

impl Opportunity {
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.net_profit_cents > 0 && self.max_quantity > 0
    }
}

/// Lifecycle of one submitted [`OrderGroup`] (§3, §4.9). Terminal states never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderGroupStatus {
    Pending,
    Submitting,
    Complete,
    Partial,
    Failed,
    Canceled,
}

impl OrderGroupStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Partial | Self::Failed | Self::Canceled
        )
    }
}

/// All orders submitted for one [`Opportunity`], and the venue's response to
/// each (§3, §4.9). `COMPLETE` iff every leg's order executed in full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderGroup {
    pub id: String,
    pub opportunity_id: Uuid,
    pub quantity: u64,
    pub legs: Vec<Leg>,
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub status: OrderGroupStatus,
    pub error: Option<String>,
}

impl OrderGroup {
    #[must_use]
    pub fn pending(opportunity: &Opportunity, quantity: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            opportunity_id: opportunity.id,
            quantity,
            legs: opportunity.legs.clone(),
            orders: Vec::new(),
            fills: Vec::new(),
            status: OrderGroupStatus::Pending,
            error: None,
        }
    }

    /// Client order id for the leg on `ticker` — `"{group_id}-{ticker}"`,
    /// idempotent across retried submissions of the same group (§4.9).
    #[must_use]
    pub fn client_order_id(&self, ticker: &str) -> String {
        format!("{}-{ticker}", self.id)
    }

    #[must_use]
    pub fn filled_legs(&self) -> usize {
        self.orders.iter().filter(|o| o.is_executed()).count()
    }

    #[must_use]
    pub fn total_filled_count(&self) -> u64 {
        self.orders.iter().map(|o| u64::from(o.filled_count())).sum()
    }

    /// Realized profit in cents if the group completed in full; `None`
    /// otherwise (callers supply the opportunity's `net_profit_cents`).
    #[must_use]
    pub fn realized_profit_cents(&self, net_profit_per_unit: i64) -> Option<i64> {
        if self.status == OrderGroupStatus::Complete {
            Some(net_profit_per_unit * self.quantity as i64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity() -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            opportunity_type: OpportunityType::MultiOutcome,
            event_ticker: "KXEVT".into(),
            legs: vec![Leg::buy("KXEVT-A", Side::Yes, 40)],
            total_cost_cents: 40,
            guaranteed_return_cents: 100,
            gross_profit_cents: 60,
            est_fees_cents: 1,
            net_profit_cents: 59,
            max_quantity: 10,
            detected_at: Utc::now(),
            confidence: 0.8,
        }
    }

    #[test]
    fn profitable_requires_positive_net_and_size() {
        let mut opp = opportunity();
        assert!(opp.is_profitable());
        opp.max_quantity = 0;
        assert!(!opp.is_profitable());
    }

    #[test]
    fn client_order_id_is_deterministic_per_group_and_ticker() {
        let opp = opportunity();
        let group = OrderGroup::pending(&opp, 5);
        let id_a = group.client_order_id("KXEVT-A");
        let id_b = group.client_order_id("KXEVT-A");
        assert_eq!(id_a, id_b);
        assert!(id_a.starts_with(&group.id));
        assert!(id_a.ends_with("KXEVT-A"));
    }

    #[test]
    fn terminal_statuses_are_closed() {
        assert!(OrderGroupStatus::Complete.is_terminal());
        assert!(OrderGroupStatus::Partial.is_terminal());
        assert!(OrderGroupStatus::Failed.is_terminal());
        assert!(OrderGroupStatus::Canceled.is_terminal());
        assert!(!OrderGroupStatus::Pending.is_terminal());
        assert!(!OrderGroupStatus::Submitting.is_terminal());
    }

    #[test]
    fn realized_profit_only_on_complete() {
        let opp = opportunity();
        let mut group = OrderGroup::pending(&opp, 4);
        assert_eq!(group.realized_profit_cents(59), None);
        group.status = OrderGroupStatus::Complete;
        assert_eq!(group.realized_profit_cents(59), Some(236));
    }
}
