//! Wager service — validated placement of single and parlay bets.
//!
//! Placement is the only path that both debits an account and attaches a
//! bet to a market, and it does so atomically: balance check and debit run
//! under the account lock, open-check and attach under the market lock,
//! with the account lock always acquired first and parlay legs locked in
//! ascending market-id order. A rejected placement leaves balances and
//! market volumes untouched.

use std::sync::Arc;
use tracing::info;

use crate::config::{ParlayPolicy, PricingPolicy};
use crate::engine::pricing;
use crate::store::markets::MarketHandle;
use crate::store::{AccountStore, MarketStore};
use crate::types::{Bet, BookError, Chips, HistoryKind, MarketId, ParlayLeg, Selection};

pub struct WagerService {
    accounts: Arc<AccountStore>,
    markets: Arc<MarketStore>,
    pricing: PricingPolicy,
    parlay: ParlayPolicy,
}

impl WagerService {
    pub fn new(
        accounts: Arc<AccountStore>,
        markets: Arc<MarketStore>,
        pricing: PricingPolicy,
        parlay: ParlayPolicy,
    ) -> Self {
        Self { accounts, markets, pricing, parlay }
    }

    /// Place a single bet. The returned bet carries the price frozen at
    /// placement; the quoted potential payout is `stake × price` rounded
    /// half-up.
    pub fn place_bet(
        &self,
        account_id: &str,
        market_id: MarketId,
        selection: Selection,
        stake: Chips,
    ) -> Result<Bet, BookError> {
        if stake == 0 {
            return Err(BookError::InvalidStake);
        }
        let account_handle = self.accounts.entry(account_id);
        let mut account = account_handle.lock();
        if stake > account.balance {
            return Err(BookError::InsufficientFunds {
                needed: stake,
                available: account.balance,
            });
        }

        let market_handle = self.markets.handle(market_id)?;
        let mut market = market_handle.lock();
        market.ensure_open()?;
        // Volume before this bet is attached, so earlier bets keep their terms.
        let price = pricing::price_for(&market, &selection, &self.pricing)?;

        let bet = Bet::single(account_id, market_id, selection, stake, price);
        account.debit(stake, HistoryKind::BetPlaced, bet.describe())?;
        account.pending_bets.push(bet.id);
        market.attach_bet(bet.clone());

        info!(
            account_id,
            market_id,
            bet_id = %bet.id,
            stake,
            price = %price,
            potential = pricing::payout_for(stake, price),
            "Bet placed"
        );
        Ok(bet)
    }

    /// Place a parlay across several markets. Every leg is validated before
    /// any debit; a single bad leg fails the whole placement. Leg prices
    /// are frozen individually and the combined price is their product.
    pub fn place_parlay(
        &self,
        account_id: &str,
        legs: &[(MarketId, Selection)],
        stake: Chips,
    ) -> Result<Bet, BookError> {
        if stake == 0 {
            return Err(BookError::InvalidStake);
        }
        if legs.len() < self.parlay.min_legs || legs.len() > self.parlay.max_legs {
            return Err(BookError::ParlayLegInvalid(format!(
                "a parlay takes {} to {} legs, got {}",
                self.parlay.min_legs,
                self.parlay.max_legs,
                legs.len()
            )));
        }

        let mut market_ids: Vec<MarketId> = legs.iter().map(|(id, _)| *id).collect();
        market_ids.sort_unstable();
        if market_ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(BookError::ParlayLegInvalid(
                "each leg must be on a different market".to_string(),
            ));
        }

        // Resolve handles up front so a missing market fails before any lock.
        let mut handles: Vec<(MarketId, MarketHandle)> = Vec::with_capacity(market_ids.len());
        for market_id in &market_ids {
            let handle = self
                .markets
                .handle(*market_id)
                .map_err(|e| leg_error(*market_id, e))?;
            handles.push((*market_id, handle));
        }

        let account_handle = self.accounts.entry(account_id);
        let mut account = account_handle.lock();
        if stake > account.balance {
            return Err(BookError::InsufficientFunds {
                needed: stake,
                available: account.balance,
            });
        }

        // Ascending id order keeps multi-market acquisition deadlock-free.
        let guards: Vec<(MarketId, parking_lot::MutexGuard<'_, crate::types::Market>)> =
            handles.iter().map(|(id, handle)| (*id, handle.lock())).collect();

        let mut priced_legs = Vec::with_capacity(legs.len());
        for (market_id, selection) in legs {
            let (_, market) = guards
                .iter()
                .find(|(id, _)| id == market_id)
                .ok_or_else(|| leg_error(*market_id, BookError::MarketNotFound(*market_id)))?;
            market.ensure_open().map_err(|e| leg_error(*market_id, e))?;
            let price = pricing::price_for(market, selection, &self.pricing)
                .map_err(|e| leg_error(*market_id, e))?;
            priced_legs.push(ParlayLeg {
                market_id: *market_id,
                selection: selection.clone(),
                price,
            });
        }

        let prices: Vec<_> = priced_legs.iter().map(|leg| leg.price).collect();
        let combined = pricing::combined_parlay_price(&prices);
        let bet = Bet::parlay(account_id, priced_legs, stake, combined);

        account.debit(stake, HistoryKind::BetPlaced, bet.describe())?;
        account.pending_bets.push(bet.id);
        drop(guards);
        self.markets.insert_parlay(bet.clone());

        info!(
            account_id,
            bet_id = %bet.id,
            legs = legs.len(),
            stake,
            price = %combined,
            potential = pricing::payout_for(stake, combined),
            "Parlay placed"
        );
        Ok(bet)
    }
}

fn leg_error(market_id: MarketId, source: BookError) -> BookError {
    match source {
        // Funds problems are not a leg's fault; keep them first-class.
        BookError::InsufficientFunds { .. } => source,
        other => BookError::ParlayLegInvalid(format!("leg on market #{market_id}: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
