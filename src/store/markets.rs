//! Market store — market lifecycle, embedded bets, the parlay book, and
//! the archive of declared results.
//!
//! Active markets sit behind per-market mutexes. Settled and cancelled
//! markets leave the active set and are remembered only as a
//! `MarketRecord`, which is what lets parlays spanning already-settled
//! markets resolve later. The archive is append-only: a recorded result
//! is never rewritten, which is the backbone of the exactly-once
//! settlement guarantee.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::{
    Bet, BetId, BetStatus, BookError, Chips, Market, MarketDef, MarketId, MarketOffer,
    MarketStatus, Selection,
};

/// Shared handle to one active market. Lock order: account before market,
/// multiple markets in ascending id order.
pub type MarketHandle = Arc<Mutex<Market>>;

/// Terminal record of a market that has left the active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketRecord {
    /// Settled with this declared winning selection.
    Settled(Selection),
    /// Cancelled by an administrator; stakes were refunded.
    Cancelled,
}

pub struct MarketStore {
    markets: RwLock<HashMap<MarketId, MarketHandle>>,
    /// Parlay bets span markets, so they live beside them rather than
    /// embedded in any single one.
    parlays: Mutex<HashMap<BetId, Bet>>,
    archive: RwLock<HashMap<MarketId, MarketRecord>>,
    next_id: AtomicU64,
}

impl Default for MarketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketStore {
    pub fn new() -> Self {
        Self {
            markets: RwLock::new(HashMap::new()),
            parlays: Mutex::new(HashMap::new()),
            archive: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a new market from an administrator's definition.
    pub fn create(&self, def: MarketDef) -> Result<Market, BookError> {
        def.validate()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let market = Market {
            id,
            participants: def.participants,
            offer: def.offer,
            status: MarketStatus::Open,
            bets: Vec::new(),
            created_at: Utc::now(),
        };
        info!(market_id = id, kind = %market.kind(), participants = %market.participants, "Market created");
        self.markets
            .write()
            .insert(id, Arc::new(Mutex::new(market.clone())));
        Ok(market)
    }

    /// Handle to an active market. Settled and cancelled markets have left
    /// the active set and report `MarketNotFound`.
    pub(crate) fn handle(&self, market_id: MarketId) -> Result<MarketHandle, BookError> {
        self.markets
            .read()
            .get(&market_id)
            .cloned()
            .ok_or(BookError::MarketNotFound(market_id))
    }

    /// Handle for settlement: distinguishes a market that was already
    /// settled from one that never existed.
    pub(crate) fn handle_for_settlement(
        &self,
        market_id: MarketId,
    ) -> Result<MarketHandle, BookError> {
        if let Some(handle) = self.markets.read().get(&market_id) {
            return Ok(Arc::clone(handle));
        }
        match self.archive.read().get(&market_id) {
            Some(MarketRecord::Settled(_)) => Err(BookError::AlreadySettled(market_id)),
            _ => Err(BookError::MarketNotFound(market_id)),
        }
    }

    /// Snapshot of a market, failing unless it is accepting bets — the
    /// guard the chat layer uses before presenting a bet slip.
    pub fn get_open(&self, market_id: MarketId) -> Result<Market, BookError> {
        let handle = self.handle(market_id)?;
        let market = handle.lock();
        market.ensure_open()?;
        Ok(market.clone())
    }

    /// Close betting: Open → Locked. A no-op when already past Open.
    pub fn lock(&self, market_id: MarketId) -> Result<(), BookError> {
        if let Some(handle) = self.markets.read().get(&market_id) {
            let mut market = handle.lock();
            if market.status == MarketStatus::Open {
                market.status = MarketStatus::Locked;
                info!(market_id, "Market locked");
            }
            return Ok(());
        }
        // Already archived: nothing left to lock.
        if self.archive.read().contains_key(&market_id) {
            return Ok(());
        }
        Err(BookError::MarketNotFound(market_id))
    }

    /// Sum of stakes on a selection across the market's attached bets.
    pub fn volume_on(&self, market_id: MarketId, selection: &Selection) -> Result<Chips, BookError> {
        let handle = self.handle(market_id)?;
        let market = handle.lock();
        Ok(market.volume_on(selection))
    }

    /// Replace the offered line of an Open market. The new offer must stay
    /// the same kind, so selections already frozen into bets remain
    /// meaningful; already-placed bets keep their placement price.
    pub fn update_offer(&self, market_id: MarketId, offer: MarketOffer) -> Result<Market, BookError> {
        let handle = self.handle(market_id)?;
        let mut market = handle.lock();
        market.ensure_open()?;
        if market.kind() != offer.kind() {
            return Err(BookError::InvalidDefinition(format!(
                "cannot change a {} market into {}",
                market.kind(),
                offer.kind()
            )));
        }
        MarketDef {
            participants: market.participants.clone(),
            offer: offer.clone(),
        }
        .validate()?;
        market.offer = offer;
        info!(market_id, "Market offer updated");
        Ok(market.clone())
    }

    /// All markets currently accepting bets, in id order.
    pub fn list_open(&self) -> Vec<Market> {
        let mut open: Vec<Market> = self
            .markets
            .read()
            .values()
            .filter_map(|handle| {
                let market = handle.lock();
                market.is_open().then(|| market.clone())
            })
            .collect();
        open.sort_by_key(|m| m.id);
        open
    }

    /// Every pending bet belonging to an account: embedded singles across
    /// active markets plus unresolved parlays, keyed for the account's
    /// pending-bets view.
    pub fn pending_bets_for(&self, account_id: &str) -> HashMap<BetId, Bet> {
        let mut bets = HashMap::new();
        for handle in self.markets.read().values() {
            let market = handle.lock();
            for bet in &market.bets {
                if bet.account_id == account_id && bet.is_pending() {
                    bets.insert(bet.id, bet.clone());
                }
            }
        }
        for bet in self.parlays.lock().values() {
            if bet.account_id == account_id && bet.is_pending() {
                bets.insert(bet.id, bet.clone());
            }
        }
        bets
    }

    // -- Parlay book -------------------------------------------------------

    pub(crate) fn insert_parlay(&self, bet: Bet) {
        debug!(bet_id = %bet.id, account_id = %bet.account_id, "Parlay recorded");
        self.parlays.lock().insert(bet.id, bet);
    }

    /// Run `decide` over every pending parlay; parlays it resolves are
    /// removed from the book and returned with their terminal status set.
    /// `decide` must be pure — it runs under the parlay-book lock.
    pub(crate) fn resolve_parlays<F>(&self, mut decide: F) -> Vec<Bet>
    where
        F: FnMut(&Bet) -> Option<(BetStatus, Chips)>,
    {
        let mut book = self.parlays.lock();
        let mut resolved = Vec::new();
        for bet in book.values_mut() {
            if !bet.is_pending() {
                continue;
            }
            if let Some((status, payout)) = decide(bet) {
                bet.resolve(status, payout);
                resolved.push(bet.clone());
            }
        }
        for bet in &resolved {
            book.remove(&bet.id);
        }
        resolved.sort_by_key(|b| b.placed_at);
        resolved
    }

    // -- Archive -----------------------------------------------------------

    /// Remove a settled market from the active set, recording its declared
    /// result for later parlay resolution.
    pub(crate) fn archive_settled(&self, market_id: MarketId, result: Selection) {
        self.markets.write().remove(&market_id);
        self.archive
            .write()
            .insert(market_id, MarketRecord::Settled(result));
        debug!(market_id, "Market archived as settled");
    }

    /// Remove a cancelled market from the active set.
    pub(crate) fn archive_cancelled(&self, market_id: MarketId) {
        self.markets.write().remove(&market_id);
        self.archive.write().insert(market_id, MarketRecord::Cancelled);
        debug!(market_id, "Market archived as cancelled");
    }

    /// Declared result of an archived market, if any.
    pub fn result_of(&self, market_id: MarketId) -> Option<MarketRecord> {
        self.archive.read().get(&market_id).cloned()
    }

    /// Copy of the whole result archive, for parlay resolution sweeps.
    pub(crate) fn archive_snapshot(&self) -> HashMap<MarketId, MarketRecord> {
        self.archive.read().clone()
    }

    // -- Persistence -------------------------------------------------------

    pub(crate) fn export(&self) -> MarketStoreState {
        MarketStoreState {
            markets: self
                .markets
                .read()
                .iter()
                .map(|(id, handle)| (*id, handle.lock().clone()))
                .collect(),
            parlays: self.parlays.lock().clone(),
            archive: self.archive.read().clone(),
            next_market_id: self.next_id.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn import(&self, state: MarketStoreState) {
        let mut markets = self.markets.write();
        markets.clear();
        for (id, market) in state.markets {
            markets.insert(id, Arc::new(Mutex::new(market)));
        }
        *self.parlays.lock() = state.parlays;
        *self.archive.write() = state.archive;
        self.next_id.store(state.next_market_id, Ordering::Relaxed);
    }
}

/// Serializable contents of the market store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStoreState {
    pub markets: HashMap<MarketId, Market>,
    pub parlays: HashMap<BetId, Bet>,
    pub archive: HashMap<MarketId, MarketRecord>,
    pub next_market_id: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
