//! Owned repositories for the ledger's shared mutable state.
//!
//! All mutation goes through these stores (or through guarded handles they
//! hand to the engines); raw collections are never exposed across component
//! boundaries.

pub mod accounts;
pub mod markets;

pub use accounts::AccountStore;
pub use markets::MarketStore;
