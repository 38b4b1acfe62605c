//! Pre-trade notional and position-size check (§4.12).
//!
//! Sits between the detector and the executor: every opportunity must pass
//! through [`ExposureGate::check`] with the quantity the engine intends to
//! send, at the current exposure snapshot the Ledger last refreshed.

use crate::types::Opportunity;
use venue_kalshi::types::Position;

#[derive(Debug, Clone, Copy)]
pub struct ExposureLimits {
    pub max_total_exposure_cents: i64,
    pub max_position_per_market: i64,
    pub max_exposure_per_market_cents: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Approved,
    Denied { max_allowed_quantity: u64 },
}

impl GateDecision {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Per-market position/exposure snapshot the gate checks against. A thin
/// read-only view the Ledger publishes each sync tick (§3 Ledger ownership).
pub struct ExposureSnapshot<'a> {
    pub total_exposure_cents: i64,
    pub positions: &'a dyn Fn(&str) -> Position,
}

/// Stateless check over a config and a snapshot — holds no cache of its own,
/// matching the Ledger-owns-state / gate-reads-state split in §3.
pub struct ExposureGate {
    limits: ExposureLimits,
}

impl ExposureGate {
    #[must_use]
    pub fn new(limits: ExposureLimits) -> Self {
        Self { limits }
    }

    /// Approves `opportunity` at `quantity` iff all three §4.12 inequalities
    /// hold. On denial, computes the largest quantity that would pass via
    /// binary search over the admissibility predicate.
    #[must_use]
    pub fn check(&self, opportunity: &Opportunity, quantity: u64, snapshot: &ExposureSnapshot) -> GateDecision {
        if self.admits(opportunity, quantity, snapshot) {
            return GateDecision::Approved;
        }
        GateDecision::Denied {
            max_allowed_quantity: self.max_allowed_quantity(opportunity, quantity, snapshot),
        }
    }

    fn admits(&self, opportunity: &Opportunity, q: u64, snapshot: &ExposureSnapshot) -> bool {
        let q = q as i64;
        let added_total = opportunity.total_cost_cents * q;
        if snapshot.total_exposure_cents + added_total > self.limits.max_total_exposure_cents {
            return false;
        }
        for leg in &opportunity.legs {
            let position = (snapshot.positions)(&leg.ticker);
            if position.net_contracts + q > self.limits.max_position_per_market {
                return false;
            }
            let added_market = i64::from(leg.price) * q;
            if position.market_exposure_cents + added_market > self.limits.max_exposure_per_market_cents {
                return false;
            }
        }
        true
    }

    /// Largest `q in [0, requested]` for which `admits` holds, via binary
    /// search over the monotone-in-q admissibility predicate (§4.12).
    fn max_allowed_quantity(&self, opportunity: &Opportunity, requested: u64, snapshot: &ExposureSnapshot) -> u64 {
        if requested == 0 || !self.admits(opportunity, 0, snapshot) {
            return 0;
        }
        let (mut low, mut high) = (0u64, requested);
        while low < high {
            let mid = low + (high - low + 1) / 2;
            if self.admits(opportunity, mid, snapshot) {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        low
    }
}
