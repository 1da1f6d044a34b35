//! Sportsbook facade.
//!
//! Composes the stores and engines and exposes every operation the
//! chat-interface layer calls: account management, market administration,
//! bet placement, settlement, and the read-only queries (open markets,
//! pending bets, history, leaderboard, volume, quotes). The facade owns no
//! state of its own; all mutation flows through the stores' locks.

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use crate::config::BookConfig;
use crate::engine::pricing;
use crate::engine::settlement::{CancellationReport, SettlementEngine, SettlementReport};
use crate::engine::wager::WagerService;
use crate::storage::{Snapshot, SnapshotStore};
use crate::store::{AccountStore, MarketStore};
use crate::types::{
    Account, Bet, BookError, Chips, HistoryEntry, Market, MarketDef, MarketId, MarketOffer,
    Selection,
};

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// What to rank accounts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardKey {
    Balance,
    TotalWon,
    TotalLost,
    BetsWon,
    BetsLost,
}

impl std::str::FromStr for LeaderboardKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "balance" | "money" => Ok(LeaderboardKey::Balance),
            "totalwon" | "won" => Ok(LeaderboardKey::TotalWon),
            "totallost" | "lost" => Ok(LeaderboardKey::TotalLost),
            "betswon" | "wins" => Ok(LeaderboardKey::BetsWon),
            "betslost" | "losses" => Ok(LeaderboardKey::BetsLost),
            _ => Err(anyhow::anyhow!("Unknown leaderboard key: {s}")),
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub account_id: String,
    pub balance: Chips,
    pub bets_won: u64,
    pub bets_lost: u64,
    pub total_won: Chips,
    pub total_lost: Chips,
}

impl fmt::Display for LeaderboardRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} — 💵{} | {}W-{}L",
            self.account_id, self.balance, self.bets_won, self.bets_lost,
        )
    }
}

impl LeaderboardRow {
    fn rank_value(&self, key: LeaderboardKey) -> u64 {
        match key {
            LeaderboardKey::Balance => self.balance,
            LeaderboardKey::TotalWon => self.total_won,
            LeaderboardKey::TotalLost => self.total_lost,
            LeaderboardKey::BetsWon => self.bets_won,
            LeaderboardKey::BetsLost => self.bets_lost,
        }
    }
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// Current price on one selection, with its display moneyline.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLine {
    pub selection: Selection,
    pub price: Decimal,
    pub moneyline: Option<Decimal>,
}

/// Display-oriented price sheet for a market.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub market_id: MarketId,
    pub lines: Vec<QuoteLine>,
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

pub struct Sportsbook {
    config: BookConfig,
    accounts: Arc<AccountStore>,
    markets: Arc<MarketStore>,
    wagers: WagerService,
    settlement: SettlementEngine,
}

impl Sportsbook {
    pub fn new(config: BookConfig) -> Self {
        let accounts = Arc::new(AccountStore::new(config.account.clone()));
        let markets = Arc::new(MarketStore::new());
        let wagers = WagerService::new(
            Arc::clone(&accounts),
            Arc::clone(&markets),
            config.pricing.clone(),
            config.parlay.clone(),
        );
        let settlement = SettlementEngine::new(Arc::clone(&accounts), Arc::clone(&markets));
        Self { config, accounts, markets, wagers, settlement }
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    // -- Accounts ----------------------------------------------------------

    pub fn get_or_create(&self, account_id: &str) -> Account {
        self.accounts.get_or_create(account_id)
    }

    /// Administrative credit/debit. Debits clamp at zero.
    pub fn adjust_balance(&self, account_id: &str, delta: i64) -> Chips {
        self.accounts.adjust_balance(account_id, delta)
    }

    pub fn claim_daily_bonus(
        &self,
        account_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Chips, BookError> {
        self.accounts.claim_daily_bonus(account_id, now)
    }

    // -- Market administration ---------------------------------------------

    pub fn create_market(&self, def: MarketDef) -> Result<Market, BookError> {
        self.markets.create(def)
    }

    pub fn lock_market(&self, market_id: MarketId) -> Result<(), BookError> {
        self.markets.lock(market_id)
    }

    /// Edit an Open market's line. Frozen bet prices are untouched.
    pub fn update_market_offer(
        &self,
        market_id: MarketId,
        offer: MarketOffer,
    ) -> Result<Market, BookError> {
        self.markets.update_offer(market_id, offer)
    }

    /// Cancel a market, voiding and refunding every attached bet.
    pub fn cancel_market(&self, market_id: MarketId) -> Result<CancellationReport, BookError> {
        self.settlement.cancel(market_id)
    }

    // -- Wagers ------------------------------------------------------------

    pub fn place_bet(
        &self,
        account_id: &str,
        market_id: MarketId,
        selection: Selection,
        stake: Chips,
    ) -> Result<Bet, BookError> {
        self.wagers.place_bet(account_id, market_id, selection, stake)
    }

    pub fn place_parlay(
        &self,
        account_id: &str,
        legs: &[(MarketId, Selection)],
        stake: Chips,
    ) -> Result<Bet, BookError> {
        self.wagers.place_parlay(account_id, legs, stake)
    }

    // -- Settlement --------------------------------------------------------

    pub fn settle(
        &self,
        market_id: MarketId,
        result: Selection,
    ) -> Result<SettlementReport, BookError> {
        self.settlement.settle(market_id, result)
    }

    // -- Read-only queries -------------------------------------------------

    pub fn list_open_markets(&self) -> Vec<Market> {
        self.markets.list_open()
    }

    pub fn get_open_market(&self, market_id: MarketId) -> Result<Market, BookError> {
        self.markets.get_open(market_id)
    }

    /// An account's unresolved bets, in the order they were placed.
    pub fn pending_bets_for(&self, account_id: &str) -> Vec<Bet> {
        let by_id = self.markets.pending_bets_for(account_id);
        let account = self.accounts.get_or_create(account_id);
        account
            .pending_bets
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect()
    }

    /// Most recent history entries, oldest first. `limit` defaults to the
    /// configured display depth.
    pub fn history_for(&self, account_id: &str, limit: Option<usize>) -> Vec<HistoryEntry> {
        let depth = limit.unwrap_or(self.config.display.history_depth);
        let account = self.accounts.get_or_create(account_id);
        let start = account.history.len().saturating_sub(depth);
        account.history[start..].to_vec()
    }

    /// Accounts ranked descending by `key`; ties break on account id so
    /// the board is stable. `limit` defaults to the configured size.
    pub fn leaderboard(&self, key: LeaderboardKey, limit: Option<usize>) -> Vec<LeaderboardRow> {
        let size = limit.unwrap_or(self.config.display.leaderboard_size);
        let mut rows: Vec<LeaderboardRow> = self
            .accounts
            .export()
            .into_values()
            .map(|a| LeaderboardRow {
                account_id: a.id,
                balance: a.balance,
                bets_won: a.bets_won,
                bets_lost: a.bets_lost,
                total_won: a.total_won,
                total_lost: a.total_lost,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.rank_value(key)
                .cmp(&a.rank_value(key))
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        rows.truncate(size);
        rows
    }

    pub fn volume_on(&self, market_id: MarketId, selection: &Selection) -> Result<Chips, BookError> {
        self.markets.volume_on(market_id, selection)
    }

    /// Current prices for every selection a market offers.
    pub fn quote(&self, market_id: MarketId) -> Result<MarketQuote, BookError> {
        let market = self.markets.get_open(market_id)?;
        let selections: Vec<Selection> = match &market.offer {
            MarketOffer::Spread { .. } => vec![Selection::Home, Selection::Away],
            MarketOffer::OverUnder { .. } => vec![Selection::Over, Selection::Under],
            MarketOffer::Proposition { outcomes } | MarketOffer::Futures { outcomes } => outcomes
                .iter()
                .map(|o| Selection::Outcome(o.label.clone()))
                .collect(),
        };
        let mut lines = Vec::with_capacity(selections.len());
        for selection in selections {
            let price = pricing::price_for(&market, &selection, &self.config.pricing)?;
            lines.push(QuoteLine {
                selection,
                price,
                moneyline: pricing::moneyline_from_multiplier(price),
            });
        }
        Ok(MarketQuote { market_id, lines })
    }

    // -- Persistence -------------------------------------------------------

    /// Consistent copy of the whole ledger. Taken outside any engine
    /// operation; never while holding engine-level locks.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            accounts: self.accounts.export(),
            markets: self.markets.export(),
        }
    }

    /// Rebuild a book from a snapshot.
    pub fn restore(config: BookConfig, snapshot: Snapshot) -> Self {
        let book = Self::new(config);
        book.accounts.import(snapshot.accounts);
        book.markets.import(snapshot.markets);
        book
    }

    /// Flush the in-memory state to the snapshot store. Called by the chat
    /// layer after mutations; the in-memory result is already complete, so
    /// no lock is held across this await.
    pub async fn flush(&self, store: &dyn SnapshotStore) -> anyhow::Result<()> {
        store.save(&self.snapshot()).await
    }

    /// Restore from the snapshot store, or start fresh when none exists.
    pub async fn load_or_new(
        config: BookConfig,
        store: &dyn SnapshotStore,
    ) -> anyhow::Result<Self> {
        Ok(match store.load().await? {
            Some(snapshot) => Self::restore(config, snapshot),
            None => Self::new(config),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
