//! Per-market order-book state, reconciled from REST snapshots and streaming
//! deltas into a single consistent view (§4.4).
//!
//! The store owns every [`Orderbook`] exclusively; callers only ever see
//! clones. Change notifications are published through a `tokio::sync::broadcast`
//! channel *after* the mutex guarding the map is released, so a subscriber
//! can safely call back into the store without deadlocking (§5, §9).

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use venue_kalshi::types::{Orderbook, Side};

const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// A change notification published after a mutation lands. Carries no price
/// data itself — subscribers that need the new state call back into
/// [`BookStore::get`].
#[derive(Debug, Clone)]
pub enum BookUpdate {
    Snapshot { ticker: String },
    Delta { ticker: String, side: Side, price: u32 },
}

impl BookUpdate {
    #[must_use]
    pub fn ticker(&self) -> &str {
        match self {
            Self::Snapshot { ticker } | Self::Delta { ticker, .. } => ticker,
        }
    }
}

/// Ticker-keyed map of order books, mutated by the streaming loop and read by
/// every strategy on each scan tick.
pub struct BookStore {
    books: Mutex<HashMap<String, Orderbook>>,
    updates: broadcast::Sender<BookUpdate>,
}

impl BookStore {
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            books: Mutex::new(HashMap::new()),
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookUpdate> {
        self.updates.subscribe()
    }

    /// Atomically replaces the book for `book.ticker`. Fires a `Snapshot`
    /// notification once the lock is released.
    pub fn install_snapshot(&self, book: Orderbook) {
        let ticker = book.ticker.clone();
        {
            let mut books = self.books.lock();
            books.insert(ticker.clone(), book);
        }
        let _ = self.updates.send(BookUpdate::Snapshot { ticker });
    }

    /// Applies one delta. An unknown ticker is logged and dropped rather than
    /// treated as an error — deltas can race the initial snapshot install
    /// (§4.4).
    pub fn apply_delta(&self, ticker: &str, side: Side, price: u32, quantity: u64) {
        let applied = {
            let mut books = self.books.lock();
            match books.get_mut(ticker) {
                Some(book) => {
                    book.apply_delta(side, price, quantity);
                    book.timestamp = chrono::Utc::now();
                    true
                }
                None => {
                    tracing::warn!(ticker, "delta for unknown ticker dropped");
                    false
                }
            }
        };
        if applied {
            let _ = self.updates.send(BookUpdate::Delta {
                ticker: ticker.to_string(),
                side,
                price,
            });
        }
    }

    /// Returns a clone of the current book for `ticker`, if installed.
    #[must_use]
    pub fn get(&self, ticker: &str) -> Option<Orderbook> {
        self.books.lock().get(ticker).cloned()
    }

    /// Returns clones of the current books for every ticker in `tickers` that
    /// has one installed; missing tickers are simply absent from the map.
    #[must_use]
    pub fn get_many(&self, tickers: &[String]) -> HashMap<String, Orderbook> {
        let books = self.books.lock();
        tickers
            .iter()
            .filter_map(|t| books.get(t).map(|b| (t.clone(), b.clone())))
            .collect()
    }

    /// Cost in cents to immediately acquire `quantity` of `side` on `ticker`,
    /// or `None` if the ticker is untracked or lacks sufficient liquidity at
    /// the implied ask.
    #[must_use]
    pub fn acquisition_cost(&self, ticker: &str, side: Side, quantity: u64) -> Option<u64> {
        self.books.lock().get(ticker)?.acquisition_cost(side, quantity)
    }

    #[must_use]
    pub fn tracked_tickers(&self) -> Vec<String> {
        self.books.lock().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.books.lock().clear();
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}
