//! Configuration loading from TOML.
//!
//! Reads `bookie.toml` and deserializes into strongly-typed structs.
//! Every section has defaults matching the book's house rules, so an
//! embedding chat layer can run with no config file at all.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::types::Chips;

/// Top-level book configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BookConfig {
    #[serde(default)]
    pub account: AccountPolicy,
    #[serde(default)]
    pub pricing: PricingPolicy,
    #[serde(default)]
    pub parlay: ParlayPolicy,
    #[serde(default)]
    pub display: DisplayPolicy,
}

/// House rules for account creation and the daily bonus.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountPolicy {
    /// Balance granted when an account is first referenced.
    pub starting_balance: Chips,
    /// Chips credited per daily-bonus claim.
    pub daily_bonus: Chips,
    /// Hours between daily-bonus claims.
    pub daily_cooldown_hours: i64,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            starting_balance: 100,
            daily_bonus: 25,
            daily_cooldown_hours: 24,
        }
    }
}

impl AccountPolicy {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.daily_cooldown_hours)
    }
}

/// Dynamic pricing curve for line markets. The multiplier on a selection
/// starts at `base` and decays by 1 for every `volume_divisor` chips already
/// staked on it, never dropping below `floor`.
#[derive(Debug, Deserialize, Clone)]
pub struct PricingPolicy {
    pub base: Decimal,
    pub floor: Decimal,
    pub volume_divisor: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base: dec!(1.8),
            floor: dec!(1.1),
            volume_divisor: dec!(1000),
        }
    }
}

/// Bounds on parlay construction.
#[derive(Debug, Deserialize, Clone)]
pub struct ParlayPolicy {
    pub min_legs: usize,
    pub max_legs: usize,
}

impl Default for ParlayPolicy {
    fn default() -> Self {
        Self { min_legs: 2, max_legs: 5 }
    }
}

/// Presentation limits used by the read-only queries.
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayPolicy {
    /// Default number of history lines returned by `history_for`.
    pub history_depth: usize,
    /// Default number of rows returned by `leaderboard`.
    pub leaderboard_size: usize,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self { history_depth: 10, leaderboard_size: 10 }
    }
}

impl BookConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: BookConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}
