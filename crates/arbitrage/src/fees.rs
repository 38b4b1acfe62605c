//! Fee estimation for single-venue arbitrage legs (§4.7).
//!
//! The venue charges a fee only on the winning leg of a resolved position.
//! Since strategies don't know in advance which leg wins, the estimator takes
//! the maximum fee across all BUY legs as a conservative upper bound — the
//! true fee on execution can only be lower or equal.

/// Default venue fee rate: 0.7% of potential profit on the winning leg.
pub const DEFAULT_FEE_RATE: f64 = 0.007;

/// Contract payout on resolution, in cents.
pub const PAYOUT_CENTS: u32 = 100;

/// Computes conservative fee estimates for a set of legs.
///
/// Configurable rate so tests (and a future live-schedule sync) can override
/// the default without a code change (§9 Open Question c).
#[derive(Debug, Clone, Copy)]
pub struct FeeCalculator {
    pub fee_rate: f64,
}

impl FeeCalculator {
    #[must_use]
    pub fn new(fee_rate: f64) -> Self {
        Self { fee_rate }
    }

    /// Fee in cents if `price` resolves to the full payout, for one contract.
    /// `ceil`-rounded: fee estimates always round against the bot (§4.7, §8).
    #[must_use]
    pub fn fee_per_contract(&self, price: u32) -> u64 {
        self.fee_for_buy_leg(price, 1)
    }

    /// Total estimated fee for `quantity` contracts bought at `price`.
    /// Ceils the total, not the per-contract fee — `ceil(rate * (100 - price) * quantity)`,
    /// matching §4.7's literal formula rather than rounding up every unit individually.
    #[must_use]
    pub fn fee_for_buy_leg(&self, price: u32, quantity: u64) -> u64 {
        let potential_profit = f64::from(PAYOUT_CENTS.saturating_sub(price));
        (potential_profit * self.fee_rate * quantity as f64).ceil() as u64
    }

    /// Conservative estimate for a whole opportunity: the maximum fee over
    /// its BUY legs at `quantity`, since exactly one leg wins and losing legs
    /// pay nothing. SELL legs are fee-free on this side of the trade.
    #[must_use]
    pub fn estimate_fees(&self, buy_prices: &[u32], quantity: u64) -> u64 {
        buy_prices
            .iter()
            .map(|&price| self.fee_for_buy_leg(price, quantity))
            .max()
            .unwrap_or(0)
    }
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_rounds_up_against_the_bot() {
        let calc = FeeCalculator::default();
        // potential profit 60 * 0.007 = 0.42 -> ceil to 1
        assert_eq!(calc.fee_per_contract(40), 1);
    }

    #[test]
    fn fee_is_monotonic_in_quantity_for_equal_price() {
        let calc = FeeCalculator::default();
        let smaller = calc.fee_for_buy_leg(40, 10);
        let larger = calc.fee_for_buy_leg(40, 20);
        assert!(larger >= smaller);
    }

    #[test]
    fn estimate_takes_max_over_buy_legs() {
        let calc = FeeCalculator::default();
        let fees = calc.estimate_fees(&[40, 30, 25], 1);
        let expected_max = [40u32, 30, 25]
            .iter()
            .map(|&p| calc.fee_for_buy_leg(p, 1))
            .max()
            .unwrap();
        assert_eq!(fees, expected_max);
    }

    #[test]
    fn estimate_ceils_the_total_not_the_per_contract_fee() {
        // 100 - 40 = 60; 0.007 * 60 * 50 = 21.0 exactly -> 21, not 1 * 50 = 50.
        let calc = FeeCalculator::default();
        assert_eq!(calc.fee_for_buy_leg(40, 50), 21);
    }

    #[test]
    fn three_outcome_scenario_from_spec() {
        // Sum of implied YES asks 40 + 30 + 25 = 95, gross profit 5. Legs carry
        // quantity 1 at detection time; the executor scales quantity later (§4.6.1).
        let calc = FeeCalculator::default();
        let fees = calc.estimate_fees(&[40, 30, 25], 1);
        let gross = 100 - (40 + 30 + 25);
        let net = gross - fees as i64;
        assert_eq!(gross, 5);
        assert_eq!(fees, 1);
        assert_eq!(net, 4);
    }

    #[test]
    fn custom_fee_rate_is_honored() {
        let calc = FeeCalculator::new(0.0);
        assert_eq!(calc.fee_per_contract(10), 0);
    }
}
