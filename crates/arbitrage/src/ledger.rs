//! Position/balance ledger (§4.10): caches account balance, per-ticker
//! positions, and a recent-fills buffer, all refreshed by the engine's
//! periodic sync loop. Every other component reads a snapshot; only the
//! sync loop writes (§5).

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use venue_kalshi::types::{Action, Balance, Fill, Position};

use crate::fees::FeeCalculator;

/// Bounds the in-memory fills buffer used for FIFO P&L estimation.
const MAX_FILLS_RETAINED: usize = 2_000;

struct State {
    balance: Balance,
    positions: HashMap<String, Position>,
    fills: VecDeque<Fill>,
}

pub struct Ledger {
    state: RwLock<State>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                balance: Balance {
                    balance_cents: 0,
                    available_balance_cents: 0,
                },
                positions: HashMap::new(),
                fills: VecDeque::new(),
            }),
        }
    }

    /// Replaces the cached balance and positions wholesale; called once per
    /// sync tick (§5 "Ledger caches are updated only by the sync loop").
    pub fn refresh(&self, balance: Balance, positions: Vec<Position>, fills: Vec<Fill>) {
        let mut state = self.state.write();
        state.balance = balance;
        state.positions = positions.into_iter().map(|p| (p.ticker.clone(), p)).collect();
        for fill in fills {
            state.fills.push_back(fill);
        }
        while state.fills.len() > MAX_FILLS_RETAINED {
            state.fills.pop_front();
        }
    }

    #[must_use]
    pub fn balance(&self) -> Balance {
        self.state.read().balance
    }

    /// Returns the cached position for `ticker`, or a flat position if the
    /// ledger has never observed one.
    #[must_use]
    pub fn position(&self, ticker: &str) -> Position {
        self.state
            .read()
            .positions
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| Position::flat(ticker))
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.state.read().positions.values().cloned().collect()
    }

    /// Sum of `market_exposure_cents` across every tracked position (§4.10).
    #[must_use]
    pub fn total_exposure_cents(&self) -> i64 {
        self.state.read().positions.values().map(|p| p.market_exposure_cents).sum()
    }

    /// FIFO-matched realized P&L for `ticker` over the retained fills buffer:
    /// each closing fill consumes the oldest unmatched opening fills in
    /// order; `realized = (sell_price - buy_price) * matched_count` per
    /// matched pair, and fees are accumulated per fill using §4.7's rule.
    #[must_use]
    pub fn realized_pnl_cents(&self, ticker: &str, fee_calc: &FeeCalculator) -> i64 {
        let state = self.state.read();
        let mut buys: VecDeque<(u32, u32)> = VecDeque::new(); // (price, remaining_count)
        let mut realized: i64 = 0;
        let mut fees: i64 = 0;

        for fill in state.fills.iter().filter(|f| f.ticker == ticker) {
            match fill.action {
                Action::Buy => {
                    fees += fee_calc.fee_for_buy_leg(fill.price, u64::from(fill.count)) as i64;
                    buys.push_back((fill.price, fill.count));
                }
                Action::Sell => {
                    let mut remaining = fill.count;
                    while remaining > 0 {
                        let Some((buy_price, buy_remaining)) = buys.front_mut() else {
                            break;
                        };
                        let matched = remaining.min(*buy_remaining);
                        realized += (i64::from(fill.price) - i64::from(*buy_price)) * i64::from(matched);
                        *buy_remaining -= matched;
                        remaining -= matched;
                        if *buy_remaining == 0 {
                            buys.pop_front();
                        }
                    }
                }
            }
        }

        realized - fees
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
