//! Settlement engine.
//!
//! Resolves a locked market against a declared result, crediting every
//! winning bet exactly once, then sweeps the parlay book for parlays whose
//! legs have all been declared. Settlement computes and records every bet
//! outcome under the market lock alone — the Open→Locked transition
//! published there is the barrier that keeps new bets out — and only then
//! credits accounts, one account lock at a time. An invalid declared
//! result fails before any bet is touched and leaves the market Locked
//! for a corrected retry.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::pricing;
use crate::store::markets::MarketRecord;
use crate::store::{AccountStore, MarketStore};
use crate::types::{
    Bet, BetId, BetKind, BetStatus, BookError, Chips, HistoryKind, MarketId, MarketStatus,
    Selection,
};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of one completed settlement.
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub market_id: MarketId,
    pub result: Selection,
    pub bets_won: usize,
    pub bets_lost: usize,
    pub chips_paid: Chips,
    pub parlays_resolved: usize,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Market #{} settled {}: {}W/{}L, 💵{} paid, {} parlays resolved",
            self.market_id,
            self.result,
            self.bets_won,
            self.bets_lost,
            self.chips_paid,
            self.parlays_resolved,
        )
    }
}

/// Summary of an administrative cancellation.
#[derive(Debug, Clone)]
pub struct CancellationReport {
    pub market_id: MarketId,
    pub bets_voided: usize,
    pub chips_refunded: Chips,
    pub parlays_voided: usize,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for CancellationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Market #{} cancelled: {} bets voided, 💵{} refunded, {} parlays voided",
            self.market_id, self.bets_voided, self.chips_refunded, self.parlays_voided,
        )
    }
}

/// One account credit owed by a resolution, applied after the market lock
/// is released.
struct Resolution {
    account_id: String,
    bet_id: BetId,
    status: BetStatus,
    stake: Chips,
    payout: Chips,
    detail: String,
}

impl Resolution {
    fn from_bet(bet: &Bet) -> Self {
        Resolution {
            account_id: bet.account_id.clone(),
            bet_id: bet.id,
            status: bet.status,
            stake: bet.stake,
            payout: bet.payout.unwrap_or(0),
            detail: bet.describe(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SettlementEngine {
    accounts: Arc<AccountStore>,
    markets: Arc<MarketStore>,
}

impl SettlementEngine {
    pub fn new(accounts: Arc<AccountStore>, markets: Arc<MarketStore>) -> Self {
        Self { accounts, markets }
    }

    /// Declare `result` as the winning selection of a market and resolve
    /// every attached bet exactly once. Idempotent: re-running against a
    /// settled market fails with `AlreadySettled` and has no side effects.
    pub fn settle(
        &self,
        market_id: MarketId,
        result: Selection,
    ) -> Result<SettlementReport, BookError> {
        let handle = self.markets.handle_for_settlement(market_id)?;

        let resolutions: Vec<Resolution> = {
            let mut market = handle.lock();
            if market.status == MarketStatus::Settled {
                return Err(BookError::AlreadySettled(market_id));
            }
            if market.status == MarketStatus::Open {
                market.status = MarketStatus::Locked;
                info!(market_id, "Market locked for settlement");
            }
            // Validate before touching any bet; an invalid result leaves
            // the market Locked with every bet still Pending.
            if let Err(e) = market.validate_result(&result) {
                warn!(market_id, result = %result, "Rejected settlement result");
                return Err(e);
            }

            let mut resolutions = Vec::new();
            for bet in &mut market.bets {
                // Already-terminal bets are skipped on re-entry.
                if !bet.is_pending() {
                    continue;
                }
                let won = matches!(
                    &bet.kind,
                    BetKind::Single { selection, .. } if *selection == result
                );
                if won {
                    let payout = pricing::payout_for(bet.stake, bet.price);
                    bet.resolve(BetStatus::Won, payout);
                } else {
                    bet.resolve(BetStatus::Lost, 0);
                }
                resolutions.push(Resolution::from_bet(bet));
            }
            market.status = MarketStatus::Settled;
            resolutions
        };

        let (bets_won, bets_lost, chips_paid) = self.apply_resolutions(&resolutions);

        // Every attached bet is terminal; the market can leave the active
        // set and its result joins the archive for parlay resolution.
        self.markets.archive_settled(market_id, result.clone());
        let parlays = self.sweep_parlays();

        let report = SettlementReport {
            market_id,
            result,
            bets_won,
            bets_lost,
            chips_paid: chips_paid
                + parlays.iter().map(|b| b.payout.unwrap_or(0)).sum::<Chips>(),
            parlays_resolved: parlays.len(),
            timestamp: Utc::now(),
        };
        info!(
            market_id,
            result = %report.result,
            won = report.bets_won,
            lost = report.bets_lost,
            paid = report.chips_paid,
            parlays = report.parlays_resolved,
            "Market settled"
        );
        Ok(report)
    }

    /// Cancel a market: void every attached bet, refund its stake, and void
    /// any parlay with a leg on it.
    pub fn cancel(&self, market_id: MarketId) -> Result<CancellationReport, BookError> {
        let handle = self.markets.handle_for_settlement(market_id)?;

        let refunds: Vec<Resolution> = {
            let mut market = handle.lock();
            if market.status == MarketStatus::Settled {
                return Err(BookError::AlreadySettled(market_id));
            }
            let mut refunds = Vec::new();
            for bet in &mut market.bets {
                if !bet.is_pending() {
                    continue;
                }
                bet.resolve(BetStatus::Void, bet.stake);
                refunds.push(Resolution::from_bet(bet));
            }
            // Terminal before leaving the active set.
            market.status = MarketStatus::Settled;
            refunds
        };

        let (_, _, chips_refunded) = self.apply_resolutions(&refunds);

        self.markets.archive_cancelled(market_id);
        let parlays = self.sweep_parlays();

        let report = CancellationReport {
            market_id,
            bets_voided: refunds.len(),
            chips_refunded: chips_refunded
                + parlays.iter().map(|b| b.payout.unwrap_or(0)).sum::<Chips>(),
            parlays_voided: parlays.len(),
            timestamp: Utc::now(),
        };
        info!(
            market_id,
            voided = report.bets_voided,
            refunded = report.chips_refunded,
            "Market cancelled"
        );
        Ok(report)
    }

    /// Resolve every parlay whose legs have all been declared. A parlay
    /// wins iff every leg matches its market's declared result; a cancelled
    /// leg voids the parlay and refunds the stake; an undeclared leg keeps
    /// it Pending.
    fn sweep_parlays(&self) -> Vec<Bet> {
        let archive = self.markets.archive_snapshot();
        let resolved = self.markets.resolve_parlays(|bet| {
            let BetKind::Parlay { legs } = &bet.kind else {
                return None;
            };
            decide_parlay(legs, &archive, bet.stake, bet.price)
        });

        for bet in &resolved {
            self.apply_resolutions(&[Resolution::from_bet(bet)]);
        }
        resolved
    }

    /// Apply credits and history for resolved bets, one account lock at a
    /// time. Returns (won, lost, chips credited).
    fn apply_resolutions(&self, resolutions: &[Resolution]) -> (usize, usize, Chips) {
        let mut won = 0;
        let mut lost = 0;
        let mut credited: Chips = 0;
        for resolution in resolutions {
            let handle = self.accounts.entry(&resolution.account_id);
            let mut account = handle.lock();
            match resolution.status {
                BetStatus::Won => {
                    account.credit(
                        resolution.payout,
                        HistoryKind::BetWon,
                        resolution.detail.clone(),
                    );
                    account.bets_won += 1;
                    account.total_won += resolution.payout;
                    won += 1;
                    credited += resolution.payout;
                }
                BetStatus::Lost => {
                    account.record(HistoryKind::BetLost, 0, resolution.detail.clone());
                    account.bets_lost += 1;
                    account.total_lost += resolution.stake;
                    lost += 1;
                }
                BetStatus::Void => {
                    account.credit(
                        resolution.payout,
                        HistoryKind::BetVoid,
                        resolution.detail.clone(),
                    );
                    credited += resolution.payout;
                }
                BetStatus::Pending => unreachable!("resolutions carry terminal statuses"),
            }
            account.pending_bets.retain(|id| *id != resolution.bet_id);
        }
        (won, lost, credited)
    }
}

/// Pure parlay decision against the result archive.
fn decide_parlay(
    legs: &[crate::types::ParlayLeg],
    archive: &HashMap<MarketId, MarketRecord>,
    stake: Chips,
    price: rust_decimal::Decimal,
) -> Option<(BetStatus, Chips)> {
    let mut any_cancelled = false;
    let mut any_undeclared = false;
    let mut all_won = true;
    for leg in legs {
        match archive.get(&leg.market_id) {
            None => any_undeclared = true,
            Some(MarketRecord::Cancelled) => any_cancelled = true,
            Some(MarketRecord::Settled(winner)) => {
                if *winner != leg.selection {
                    all_won = false;
                }
            }
        }
    }
    if any_cancelled {
        return Some((BetStatus::Void, stake));
    }
    if any_undeclared {
        return None;
    }
    if all_won {
        Some((BetStatus::Won, pricing::payout_for(stake, price)))
    } else {
        Some((BetStatus::Lost, 0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
