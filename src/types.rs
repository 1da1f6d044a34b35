//! Shared types for the BOOKIE ledger.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that store, engine, and facade
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Whole chips — the only currency unit in the book.
pub type Chips = u64;

/// Monotonically assigned market identifier.
pub type MarketId = u64;

/// Unique bet identifier.
pub type BetId = Uuid;

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// Which side or outcome a bet is on.
///
/// `Home`/`Away` apply to spread markets, `Over`/`Under` to totals, and
/// `Outcome` names one of the offered outcomes on a proposition or futures
/// market. Validity against a given market is checked at placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    Home,
    Away,
    Over,
    Under,
    Outcome(String),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Home => write!(f, "HOME"),
            Selection::Away => write!(f, "AWAY"),
            Selection::Over => write!(f, "OVER"),
            Selection::Under => write!(f, "UNDER"),
            Selection::Outcome(label) => write!(f, "{}", label.to_uppercase()),
        }
    }
}

/// Parse a user-entered selection (case-insensitive). Anything that is not
/// a recognised side keyword is treated as a named outcome.
impl std::str::FromStr for Selection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "home" => Selection::Home,
            "away" => Selection::Away,
            "over" => Selection::Over,
            "under" => Selection::Under,
            _ => Selection::Outcome(s.trim().to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// Market kind, used for routing settlement rules and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketKind {
    Spread,
    OverUnder,
    Proposition,
    Futures,
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::Spread => write!(f, "SPREAD"),
            MarketKind::OverUnder => write!(f, "O/U"),
            MarketKind::Proposition => write!(f, "PROP"),
            MarketKind::Futures => write!(f, "FUTURES"),
        }
    }
}

/// Who or what a market is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Participants {
    /// Head-to-head event (spread and over/under markets).
    Matchup { home: String, away: String },
    /// Single subject (proposition and futures markets).
    Subject(String),
}

impl fmt::Display for Participants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participants::Matchup { home, away } => write!(f, "{home} vs {away}"),
            Participants::Subject(subject) => write!(f, "{subject}"),
        }
    }
}

/// An outcome offered on a proposition or futures market, priced by the
/// administrator at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferedOutcome {
    pub label: String,
    /// Fixed decimal-odds multiplier, unchanged by volume.
    pub price: Decimal,
}

/// The bettable line(s) of a market — one variant per market kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketOffer {
    /// Handicap a side must cover. Lines are quoted per side (e.g. +3 / -3).
    Spread { home_line: Decimal, away_line: Decimal },
    /// A combined total to go over or under.
    OverUnder { total: Decimal },
    /// Admin-priced outcomes on a one-off event.
    Proposition { outcomes: Vec<OfferedOutcome> },
    /// Admin-priced outcomes on a long-term result.
    Futures { outcomes: Vec<OfferedOutcome> },
}

impl MarketOffer {
    pub fn kind(&self) -> MarketKind {
        match self {
            MarketOffer::Spread { .. } => MarketKind::Spread,
            MarketOffer::OverUnder { .. } => MarketKind::OverUnder,
            MarketOffer::Proposition { .. } => MarketKind::Proposition,
            MarketOffer::Futures { .. } => MarketKind::Futures,
        }
    }

    /// Offered outcomes for fixed-odds markets, None for line markets.
    pub fn outcomes(&self) -> Option<&[OfferedOutcome]> {
        match self {
            MarketOffer::Proposition { outcomes } | MarketOffer::Futures { outcomes } => {
                Some(outcomes)
            }
            _ => None,
        }
    }

    /// Whether `selection` names a side or outcome this offer can pay.
    pub fn accepts(&self, selection: &Selection) -> bool {
        match (self, selection) {
            (MarketOffer::Spread { .. }, Selection::Home | Selection::Away) => true,
            (MarketOffer::OverUnder { .. }, Selection::Over | Selection::Under) => true,
            (
                MarketOffer::Proposition { outcomes } | MarketOffer::Futures { outcomes },
                Selection::Outcome(label),
            ) => outcomes.iter().any(|o| o.label == *label),
            _ => false,
        }
    }
}

/// Market lifecycle. Transitions are monotonic: Open → Locked → Settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    Locked,
    Settled,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "🟢 OPEN"),
            MarketStatus::Locked => write!(f, "🔒 LOCKED"),
            MarketStatus::Settled => write!(f, "🏁 SETTLED"),
        }
    }
}

/// Definition submitted by an administrator to open a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDef {
    pub participants: Participants,
    pub offer: MarketOffer,
}

impl MarketDef {
    /// Cross-field validation: line markets need a matchup, fixed-odds
    /// markets need a subject and at least one outcome priced above even.
    pub fn validate(&self) -> Result<(), BookError> {
        match (&self.participants, &self.offer) {
            (Participants::Matchup { .. }, MarketOffer::Spread { .. })
            | (Participants::Matchup { .. }, MarketOffer::OverUnder { .. }) => Ok(()),
            (Participants::Subject(_), MarketOffer::Proposition { outcomes })
            | (Participants::Subject(_), MarketOffer::Futures { outcomes }) => {
                validate_outcomes(outcomes)
            }
            (participants, offer) => Err(BookError::InvalidDefinition(format!(
                "{} market cannot be offered on {participants}",
                offer.kind()
            ))),
        }
    }
}

fn validate_outcomes(outcomes: &[OfferedOutcome]) -> Result<(), BookError> {
    if outcomes.is_empty() {
        return Err(BookError::InvalidDefinition(
            "fixed-odds market needs at least one outcome".to_string(),
        ));
    }
    for outcome in outcomes {
        if outcome.label.trim().is_empty() {
            return Err(BookError::InvalidDefinition(
                "outcome label cannot be empty".to_string(),
            ));
        }
        if outcome.price <= Decimal::ONE {
            return Err(BookError::InvalidDefinition(format!(
                "outcome {} priced at {} pays no more than the stake",
                outcome.label, outcome.price
            )));
        }
    }
    let mut labels: Vec<&str> = outcomes.iter().map(|o| o.label.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    if labels.len() != outcomes.len() {
        return Err(BookError::InvalidDefinition(
            "outcome labels must be unique".to_string(),
        ));
    }
    Ok(())
}

/// One bettable event and every single bet attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub participants: Participants,
    pub offer: MarketOffer,
    pub status: MarketStatus,
    /// Single bets, in placement order. Parlays live in the parlay book.
    pub bets: Vec<Bet>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {} ({}, {} bets)",
            self.id,
            self.kind(),
            self.participants,
            self.status,
            self.bets.len(),
        )
    }
}

impl Market {
    pub fn kind(&self) -> MarketKind {
        self.offer.kind()
    }

    pub fn is_open(&self) -> bool {
        self.status == MarketStatus::Open
    }

    /// Guard used before accepting a bet.
    pub fn ensure_open(&self) -> Result<(), BookError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BookError::MarketNotOpen(self.id))
        }
    }

    /// Reject selections that do not belong to this market's offer.
    pub fn validate_selection(&self, selection: &Selection) -> Result<(), BookError> {
        if self.offer.accepts(selection) {
            Ok(())
        } else {
            Err(BookError::InvalidSelection {
                market_id: self.id,
                selection: selection.clone(),
            })
        }
    }

    /// Reject declared results that do not belong to this market's offer.
    pub fn validate_result(&self, result: &Selection) -> Result<(), BookError> {
        if self.offer.accepts(result) {
            Ok(())
        } else {
            Err(BookError::InvalidResult {
                market_id: self.id,
                reason: format!(
                    "{result} is not a declarable outcome of this {} market",
                    self.kind()
                ),
            })
        }
    }

    /// Sum of stakes over attached bets on exactly this selection.
    pub fn volume_on(&self, selection: &Selection) -> Chips {
        self.bets
            .iter()
            .filter_map(|b| match &b.kind {
                BetKind::Single { selection: s, .. } if s == selection => Some(b.stake),
                _ => None,
            })
            .sum()
    }

    /// Fixed multiplier of an offered outcome, if this is a fixed-odds market.
    pub fn fixed_price_of(&self, selection: &Selection) -> Option<Decimal> {
        let Selection::Outcome(label) = selection else {
            return None;
        };
        self.offer
            .outcomes()?
            .iter()
            .find(|o| o.label == *label)
            .map(|o| o.price)
    }

    /// Append a bet. Caller must hold the market lock and have verified
    /// Open status — the store never exposes a mutable market otherwise.
    pub fn attach_bet(&mut self, bet: Bet) {
        self.bets.push(bet);
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// Bet lifecycle. A bet leaves Pending exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    /// Market cancelled before settlement; stake refunded.
    Void,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        *self != BetStatus::Pending
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "PENDING"),
            BetStatus::Won => write!(f, "WON"),
            BetStatus::Lost => write!(f, "LOST"),
            BetStatus::Void => write!(f, "VOID"),
        }
    }
}

/// One leg of a parlay, with its own price frozen at placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayLeg {
    pub market_id: MarketId,
    pub selection: Selection,
    pub price: Decimal,
}

/// What a bet is on: one market, or an ordered set of parlay legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BetKind {
    Single {
        market_id: MarketId,
        selection: Selection,
    },
    Parlay {
        legs: Vec<ParlayLeg>,
    },
}

/// A wager. Immutable once created except for its terminal outcome fields;
/// `price` is frozen at placement and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub account_id: String,
    pub kind: BetKind,
    pub stake: Chips,
    /// Decimal-odds multiplier at placement (combined product for parlays).
    pub price: Decimal,
    pub status: BetStatus,
    /// Chips credited at resolution: winnings, refund for voids, 0 for losses.
    pub payout: Option<Chips>,
    pub placed_at: DateTime<Utc>,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BetKind::Single { market_id, selection } => write!(
                f,
                "💵{} on {selection} @ {} (market #{market_id}, {})",
                self.stake, self.price, self.status,
            ),
            BetKind::Parlay { legs } => write!(
                f,
                "💵{} on {}-leg parlay @ {} ({})",
                self.stake,
                legs.len(),
                self.price,
                self.status,
            ),
        }
    }
}

impl Bet {
    pub fn single(
        account_id: &str,
        market_id: MarketId,
        selection: Selection,
        stake: Chips,
        price: Decimal,
    ) -> Self {
        Bet {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            kind: BetKind::Single { market_id, selection },
            stake,
            price,
            status: BetStatus::Pending,
            payout: None,
            placed_at: Utc::now(),
        }
    }

    pub fn parlay(account_id: &str, legs: Vec<ParlayLeg>, stake: Chips, price: Decimal) -> Self {
        Bet {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            kind: BetKind::Parlay { legs },
            stake,
            price,
            status: BetStatus::Pending,
            payout: None,
            placed_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }

    /// Record the terminal outcome. Must be called at most once.
    pub(crate) fn resolve(&mut self, status: BetStatus, payout: Chips) {
        debug_assert!(self.is_pending());
        debug_assert!(status.is_terminal());
        self.status = status;
        self.payout = Some(payout);
    }

    /// Short label for history entries, e.g. "HOME | market #3".
    pub fn describe(&self) -> String {
        match &self.kind {
            BetKind::Single { market_id, selection } => {
                format!("{selection} | market #{market_id}")
            }
            BetKind::Parlay { legs } => {
                let markets: Vec<String> =
                    legs.iter().map(|l| format!("#{}", l.market_id)).collect();
                format!("PARLAY x{} | markets {}", legs.len(), markets.join(","))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// What moved chips on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    BetPlaced,
    BetWon,
    BetLost,
    BetVoid,
    DailyBonus,
    Adjustment,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryKind::BetPlaced => write!(f, "PLACED"),
            HistoryKind::BetWon => write!(f, "WIN"),
            HistoryKind::BetLost => write!(f, "LOSS"),
            HistoryKind::BetVoid => write!(f, "VOID"),
            HistoryKind::DailyBonus => write!(f, "DAILY"),
            HistoryKind::Adjustment => write!(f, "ADJUST"),
        }
    }
}

/// One line in an account's append-only transaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub kind: HistoryKind,
    /// Signed chips applied to the balance by this event.
    pub delta: i64,
    pub balance_after: Chips,
    pub detail: String,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | 💵{:+}",
            self.at.format("%m/%d %H:%M"),
            self.kind,
            self.detail,
            self.delta,
        )
    }
}

/// A user's ledger record: balance, bonus cooldown, history, and the
/// win/loss tallies backing the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub balance: Chips,
    pub daily_claimed_at: Option<DateTime<Utc>>,
    pub history: Vec<HistoryEntry>,
    /// Ids of this account's unresolved bets (owned by the market store).
    pub pending_bets: Vec<BetId>,
    pub bets_won: u64,
    pub bets_lost: u64,
    /// Chips credited by winning bets, gross of stake.
    pub total_won: Chips,
    /// Chips staked on losing bets.
    pub total_lost: Chips,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | 💵{} | {}W-{}L | {} pending",
            self.id,
            self.balance,
            self.bets_won,
            self.bets_lost,
            self.pending_bets.len(),
        )
    }
}

impl Account {
    pub fn new(id: &str, starting_balance: Chips, now: DateTime<Utc>) -> Self {
        Account {
            id: id.to_string(),
            balance: starting_balance,
            daily_claimed_at: None,
            history: Vec::new(),
            pending_bets: Vec::new(),
            bets_won: 0,
            bets_lost: 0,
            total_won: 0,
            total_lost: 0,
            created_at: now,
        }
    }

    /// Win rate over resolved bets as a percentage. 0.0 with no resolutions.
    pub fn win_rate(&self) -> f64 {
        let resolved = self.bets_won + self.bets_lost;
        if resolved == 0 {
            0.0
        } else {
            (self.bets_won as f64 / resolved as f64) * 100.0
        }
    }

    /// Append a history line mirroring a balance change that has already
    /// been applied. Every mutation goes through credit/debit, which call
    /// this exactly once.
    pub(crate) fn record(&mut self, kind: HistoryKind, delta: i64, detail: impl Into<String>) {
        self.history.push(HistoryEntry {
            at: Utc::now(),
            kind,
            delta,
            balance_after: self.balance,
            detail: detail.into(),
        });
    }

    /// Credit chips. Never rejected.
    pub(crate) fn credit(&mut self, amount: Chips, kind: HistoryKind, detail: impl Into<String>) {
        self.balance += amount;
        self.record(kind, amount as i64, detail);
    }

    /// Debit chips, failing if the balance cannot cover it.
    pub(crate) fn debit(
        &mut self,
        amount: Chips,
        kind: HistoryKind,
        detail: impl Into<String>,
    ) -> Result<(), BookError> {
        if amount > self.balance {
            return Err(BookError::InsufficientFunds {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.record(kind, -(amount as i64), detail);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for BOOKIE. All are local, synchronous
/// failures; any rejected operation leaves balances and volumes unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookError {
    #[error("insufficient funds: need 💵{needed}, have 💵{available}")]
    InsufficientFunds { needed: Chips, available: Chips },

    #[error("market #{0} not found")]
    MarketNotFound(MarketId),

    #[error("market #{0} is no longer open for betting")]
    MarketNotOpen(MarketId),

    #[error("invalid selection {selection} for market #{market_id}")]
    InvalidSelection {
        market_id: MarketId,
        selection: Selection,
    },

    #[error("stake must be a positive amount of chips")]
    InvalidStake,

    #[error("daily bonus already claimed; next claim at {until}")]
    CooldownActive { until: DateTime<Utc> },

    #[error("market #{0} has already been settled")]
    AlreadySettled(MarketId),

    #[error("invalid result for market #{market_id}: {reason}")]
    InvalidResult { market_id: MarketId, reason: String },

    #[error("invalid parlay: {0}")]
    ParlayLegInvalid(String),

    #[error("invalid market definition: {0}")]
    InvalidDefinition(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spread_def() -> MarketDef {
        MarketDef {
            participants: Participants::Matchup {
                home: "Sharks".to_string(),
                away: "Jets".to_string(),
            },
            offer: MarketOffer::Spread {
                home_line: dec!(3),
                away_line: dec!(-3),
            },
        }
    }

    fn sample_market(offer: MarketOffer) -> Market {
        let participants = match offer.kind() {
            MarketKind::Spread | MarketKind::OverUnder => Participants::Matchup {
                home: "Sharks".to_string(),
                away: "Jets".to_string(),
            },
            _ => Participants::Subject("Season MVP".to_string()),
        };
        Market {
            id: 1,
            participants,
            offer,
            status: MarketStatus::Open,
            bets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    // -- Selection tests --

    #[test]
    fn test_selection_parse() {
        assert_eq!("home".parse::<Selection>().unwrap(), Selection::Home);
        assert_eq!("  OVER ".parse::<Selection>().unwrap(), Selection::Over);
        assert_eq!(
            "Sharks to win".parse::<Selection>().unwrap(),
            Selection::Outcome("Sharks to win".to_string())
        );
    }

    #[test]
    fn test_selection_display() {
        assert_eq!(format!("{}", Selection::Home), "HOME");
        assert_eq!(format!("{}", Selection::Under), "UNDER");
        assert_eq!(format!("{}", Selection::Outcome("mvp".into())), "MVP");
    }

    // -- MarketOffer tests --

    #[test]
    fn test_offer_accepts_by_kind() {
        let spread = MarketOffer::Spread { home_line: dec!(3), away_line: dec!(-3) };
        assert!(spread.accepts(&Selection::Home));
        assert!(spread.accepts(&Selection::Away));
        assert!(!spread.accepts(&Selection::Over));
        assert!(!spread.accepts(&Selection::Outcome("Sharks".into())));

        let total = MarketOffer::OverUnder { total: dec!(45.5) };
        assert!(total.accepts(&Selection::Over));
        assert!(!total.accepts(&Selection::Home));

        let prop = MarketOffer::Proposition {
            outcomes: vec![OfferedOutcome { label: "Sharks".into(), price: dec!(2.5) }],
        };
        assert!(prop.accepts(&Selection::Outcome("Sharks".into())));
        assert!(!prop.accepts(&Selection::Outcome("Jets".into())));
        assert!(!prop.accepts(&Selection::Home));
    }

    // -- MarketDef tests --

    #[test]
    fn test_def_validate_ok() {
        assert!(spread_def().validate().is_ok());
    }

    #[test]
    fn test_def_rejects_subject_spread() {
        let def = MarketDef {
            participants: Participants::Subject("MVP".into()),
            offer: MarketOffer::Spread { home_line: dec!(3), away_line: dec!(-3) },
        };
        assert!(matches!(def.validate(), Err(BookError::InvalidDefinition(_))));
    }

    #[test]
    fn test_def_rejects_empty_outcomes() {
        let def = MarketDef {
            participants: Participants::Subject("MVP".into()),
            offer: MarketOffer::Proposition { outcomes: vec![] },
        };
        assert!(matches!(def.validate(), Err(BookError::InvalidDefinition(_))));
    }

    #[test]
    fn test_def_rejects_price_at_or_below_even() {
        let def = MarketDef {
            participants: Participants::Subject("MVP".into()),
            offer: MarketOffer::Proposition {
                outcomes: vec![OfferedOutcome { label: "X".into(), price: dec!(1.0) }],
            },
        };
        assert!(matches!(def.validate(), Err(BookError::InvalidDefinition(_))));
    }

    #[test]
    fn test_def_rejects_duplicate_outcomes() {
        let def = MarketDef {
            participants: Participants::Subject("MVP".into()),
            offer: MarketOffer::Futures {
                outcomes: vec![
                    OfferedOutcome { label: "X".into(), price: dec!(2.0) },
                    OfferedOutcome { label: "X".into(), price: dec!(3.0) },
                ],
            },
        };
        assert!(matches!(def.validate(), Err(BookError::InvalidDefinition(_))));
    }

    // -- Market tests --

    #[test]
    fn test_market_ensure_open() {
        let mut market = sample_market(MarketOffer::OverUnder { total: dec!(45) });
        assert!(market.ensure_open().is_ok());
        market.status = MarketStatus::Locked;
        assert_eq!(market.ensure_open(), Err(BookError::MarketNotOpen(1)));
        market.status = MarketStatus::Settled;
        assert_eq!(market.ensure_open(), Err(BookError::MarketNotOpen(1)));
    }

    #[test]
    fn test_market_volume_counts_only_matching_selection() {
        let mut market = sample_market(MarketOffer::Spread {
            home_line: dec!(3),
            away_line: dec!(-3),
        });
        market.attach_bet(Bet::single("ann", 1, Selection::Home, 100, dec!(1.8)));
        market.attach_bet(Bet::single("bob", 1, Selection::Home, 250, dec!(1.8)));
        market.attach_bet(Bet::single("cal", 1, Selection::Away, 400, dec!(1.8)));

        assert_eq!(market.volume_on(&Selection::Home), 350);
        assert_eq!(market.volume_on(&Selection::Away), 400);
        assert_eq!(market.volume_on(&Selection::Over), 0);
    }

    #[test]
    fn test_market_fixed_price_lookup() {
        let market = sample_market(MarketOffer::Futures {
            outcomes: vec![
                OfferedOutcome { label: "Sharks".into(), price: dec!(4.0) },
                OfferedOutcome { label: "Jets".into(), price: dec!(1.5) },
            ],
        });
        assert_eq!(
            market.fixed_price_of(&Selection::Outcome("Sharks".into())),
            Some(dec!(4.0))
        );
        assert_eq!(market.fixed_price_of(&Selection::Outcome("Bears".into())), None);
        assert_eq!(market.fixed_price_of(&Selection::Home), None);
    }

    #[test]
    fn test_market_validate_result_message() {
        let market = sample_market(MarketOffer::Spread {
            home_line: dec!(3),
            away_line: dec!(-3),
        });
        let err = market.validate_result(&Selection::Over).unwrap_err();
        assert!(matches!(err, BookError::InvalidResult { market_id: 1, .. }));
    }

    // -- Bet tests --

    #[test]
    fn test_bet_resolve_sets_terminal_state() {
        let mut bet = Bet::single("ann", 1, Selection::Home, 100, dec!(1.8));
        assert!(bet.is_pending());
        bet.resolve(BetStatus::Won, 180);
        assert_eq!(bet.status, BetStatus::Won);
        assert_eq!(bet.payout, Some(180));
    }

    #[test]
    fn test_bet_describe() {
        let bet = Bet::single("ann", 3, Selection::Home, 100, dec!(1.8));
        assert_eq!(bet.describe(), "HOME | market #3");

        let legs = vec![
            ParlayLeg { market_id: 1, selection: Selection::Home, price: dec!(1.5) },
            ParlayLeg { market_id: 2, selection: Selection::Over, price: dec!(1.6) },
        ];
        let parlay = Bet::parlay("ann", legs, 100, dec!(2.4));
        assert_eq!(parlay.describe(), "PARLAY x2 | markets #1,#2");
    }

    // -- Account tests --

    #[test]
    fn test_account_new() {
        let account = Account::new("ann", 100, Utc::now());
        assert_eq!(account.balance, 100);
        assert!(account.daily_claimed_at.is_none());
        assert!(account.history.is_empty());
        assert_eq!(account.win_rate(), 0.0);
    }

    #[test]
    fn test_account_debit_and_history_mirror() {
        let mut account = Account::new("ann", 100, Utc::now());
        account.debit(40, HistoryKind::BetPlaced, "HOME | market #1").unwrap();
        assert_eq!(account.balance, 60);
        assert_eq!(account.history.len(), 1);
        assert_eq!(account.history[0].delta, -40);
        assert_eq!(account.history[0].balance_after, 60);
    }

    #[test]
    fn test_account_debit_insufficient() {
        let mut account = Account::new("ann", 30, Utc::now());
        let err = account.debit(40, HistoryKind::BetPlaced, "HOME").unwrap_err();
        assert_eq!(err, BookError::InsufficientFunds { needed: 40, available: 30 });
        assert_eq!(account.balance, 30);
        assert!(account.history.is_empty());
    }

    #[test]
    fn test_account_credit_never_rejected() {
        let mut account = Account::new("ann", 0, Utc::now());
        account.credit(180, HistoryKind::BetWon, "HOME | market #1");
        assert_eq!(account.balance, 180);
        assert_eq!(account.history[0].delta, 180);
    }

    #[test]
    fn test_account_win_rate() {
        let mut account = Account::new("ann", 100, Utc::now());
        account.bets_won = 7;
        account.bets_lost = 3;
        assert!((account.win_rate() - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_history_entry_display() {
        let entry = HistoryEntry {
            at: Utc::now(),
            kind: HistoryKind::BetWon,
            delta: 180,
            balance_after: 580,
            detail: "HOME | market #1".to_string(),
        };
        let line = format!("{entry}");
        assert!(line.contains("WIN"));
        assert!(line.contains("💵+180"));
    }

    // -- Serde shape --

    #[test]
    fn test_market_serialization_roundtrip() {
        let mut market = sample_market(MarketOffer::Spread {
            home_line: dec!(3),
            away_line: dec!(-3),
        });
        market.attach_bet(Bet::single("ann", 1, Selection::Home, 100, dec!(1.8)));

        let json = serde_json::to_string(&market).unwrap();
        let parsed: Market = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, 1);
        assert_eq!(parsed.bets.len(), 1);
        assert_eq!(parsed.bets[0].kind, market.bets[0].kind);
        assert_eq!(parsed.status, MarketStatus::Open);
    }

    // -- BookError tests --

    #[test]
    fn test_book_error_display() {
        let e = BookError::InsufficientFunds { needed: 100, available: 40 };
        assert_eq!(format!("{e}"), "insufficient funds: need 💵100, have 💵40");

        let e = BookError::MarketNotOpen(7);
        assert!(format!("{e}").contains("#7"));
    }
}
