//! BOOKIE — community sportsbook wager ledger and settlement engine.
//!
//! Library crate exposing the account and market stores, the pricing,
//! wager, and settlement engines, and the `Sportsbook` facade the
//! chat-interface layer calls.

pub mod book;
pub mod config;
pub mod engine;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod types;
