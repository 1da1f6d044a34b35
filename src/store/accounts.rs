//! Account store — balances, histories, bonus cooldowns.
//!
//! Owns every `Account` record behind a per-account mutex so concurrent
//! placements and settlements touching different accounts never contend.
//! Engines that need multi-step atomicity (check balance, then debit)
//! take an account handle and hold its lock across the whole step.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AccountPolicy;
use crate::types::{Account, BookError, Chips, HistoryKind};

/// Shared handle to one account. Lock order: account before market.
pub type AccountHandle = Arc<Mutex<Account>>;

pub struct AccountStore {
    policy: AccountPolicy,
    accounts: RwLock<HashMap<String, AccountHandle>>,
}

impl AccountStore {
    pub fn new(policy: AccountPolicy) -> Self {
        Self {
            policy,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &AccountPolicy {
        &self.policy
    }

    /// Handle to an account, creating it with the starting balance on first
    /// reference.
    pub fn entry(&self, account_id: &str) -> AccountHandle {
        if let Some(handle) = self.accounts.read().get(account_id) {
            return Arc::clone(handle);
        }
        let mut accounts = self.accounts.write();
        Arc::clone(accounts.entry(account_id.to_string()).or_insert_with(|| {
            info!(
                account_id,
                starting_balance = self.policy.starting_balance,
                "Account created"
            );
            Arc::new(Mutex::new(Account::new(
                account_id,
                self.policy.starting_balance,
                Utc::now(),
            )))
        }))
    }

    /// Snapshot of an account's current record, creating it if needed.
    pub fn get_or_create(&self, account_id: &str) -> Account {
        self.entry(account_id).lock().clone()
    }

    /// Administrative balance adjustment. Credits always apply; debits are
    /// clamped at zero rather than failing. Returns the new balance.
    pub fn adjust_balance(&self, account_id: &str, delta: i64) -> Chips {
        let handle = self.entry(account_id);
        let mut account = handle.lock();
        if delta >= 0 {
            account.credit(delta as Chips, HistoryKind::Adjustment, "admin adjustment");
        } else {
            let applied = (delta.unsigned_abs()).min(account.balance);
            account.balance -= applied;
            account.record(HistoryKind::Adjustment, -(applied as i64), "admin adjustment");
        }
        info!(account_id, delta, balance = account.balance, "Balance adjusted");
        account.balance
    }

    /// Claim the daily bonus. Succeeds only when the cooldown has elapsed
    /// (or the bonus was never claimed); credits the fixed bonus and stamps
    /// the claim time.
    pub fn claim_daily_bonus(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Chips, BookError> {
        let handle = self.entry(account_id);
        let mut account = handle.lock();
        if let Some(last) = account.daily_claimed_at {
            if now - last < self.policy.cooldown() {
                return Err(BookError::CooldownActive {
                    until: last + self.policy.cooldown(),
                });
            }
        }
        account.credit(self.policy.daily_bonus, HistoryKind::DailyBonus, "daily bonus");
        account.daily_claimed_at = Some(now);
        debug!(account_id, bonus = self.policy.daily_bonus, "Daily bonus claimed");
        Ok(self.policy.daily_bonus)
    }

    /// Clone every account record (leaderboard, persistence).
    pub fn export(&self) -> HashMap<String, Account> {
        self.accounts
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.lock().clone()))
            .collect()
    }

    /// Replace the store contents from a snapshot.
    pub fn import(&self, accounts: HashMap<String, Account>) {
        let mut map = self.accounts.write();
        map.clear();
        for (id, account) in accounts {
            map.insert(id, Arc::new(Mutex::new(account)));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
