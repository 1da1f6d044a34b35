//! Pricing engine.
//!
//! Pure functions of market state and requested selection — no persisted
//! state of its own. Line markets (spread, over/under) are priced with a
//! bounded decaying function of the volume already staked on the same
//! selection: early bettors on a side get close to even-money-plus odds,
//! and a crowded side decays toward the floor, approximating pari-mutuel
//! rebalancing without a matched-book guarantee. Proposition and futures
//! markets carry administrator-declared fixed odds, unchanged by volume.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::PricingPolicy;
use crate::types::{BookError, Chips, Market, MarketOffer, Selection};

/// Current decimal-odds multiplier for a selection on a market.
///
/// Uses the volume *before* the candidate bet is attached, so the quoted
/// price is the one frozen into the bet.
pub fn price_for(
    market: &Market,
    selection: &Selection,
    policy: &PricingPolicy,
) -> Result<Decimal, BookError> {
    market.validate_selection(selection)?;
    match &market.offer {
        MarketOffer::Spread { .. } | MarketOffer::OverUnder { .. } => {
            Ok(dynamic_multiplier(market.volume_on(selection), policy))
        }
        MarketOffer::Proposition { .. } | MarketOffer::Futures { .. } => market
            .fixed_price_of(selection)
            .ok_or_else(|| BookError::InvalidSelection {
                market_id: market.id,
                selection: selection.clone(),
            }),
    }
}

/// `clamp(base − volume/divisor, floor, base)`.
pub fn dynamic_multiplier(volume_on_selection: Chips, policy: &PricingPolicy) -> Decimal {
    let decayed = policy.base - Decimal::from(volume_on_selection) / policy.volume_divisor;
    decayed.clamp(policy.floor, policy.base)
}

/// Combined price of a parlay: the product of each leg's frozen multiplier.
pub fn combined_parlay_price(leg_prices: &[Decimal]) -> Decimal {
    leg_prices.iter().product()
}

/// Chips returned on a winning bet: stake × price, rounded half-up to a
/// whole chip.
pub fn payout_for(stake: Chips, price: Decimal) -> Chips {
    (Decimal::from(stake) * price)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .unwrap_or(Chips::MAX)
}

/// American-odds representation of a decimal multiplier, for display only.
/// Undefined for multipliers at or below even money.
pub fn moneyline_from_multiplier(multiplier: Decimal) -> Option<Decimal> {
    if multiplier <= Decimal::ONE {
        return None;
    }
    if multiplier >= dec!(2) {
        Some(dec!(100) * (multiplier - Decimal::ONE))
    } else {
        Some(dec!(-100) / (multiplier - Decimal::ONE))
    }
}

/// Decimal multiplier for an American moneyline, for display only.
pub fn multiplier_from_moneyline(moneyline: Decimal) -> Option<Decimal> {
    if moneyline > Decimal::ZERO {
        Some(Decimal::ONE + moneyline / dec!(100))
    } else if moneyline < Decimal::ZERO {
        Some(Decimal::ONE + dec!(100) / -moneyline)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bet, MarketStatus, OfferedOutcome, Participants};
    use chrono::Utc;

    fn policy() -> PricingPolicy {
        PricingPolicy::default()
    }

    fn spread_market() -> Market {
        Market {
            id: 1,
            participants: Participants::Matchup {
                home: "Sharks".to_string(),
                away: "Jets".to_string(),
            },
            offer: MarketOffer::Spread { home_line: dec!(3), away_line: dec!(-3) },
            status: MarketStatus::Open,
            bets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fresh_selection_prices_at_base() {
        assert_eq!(dynamic_multiplier(0, &policy()), dec!(1.8));
    }

    #[test]
    fn test_multiplier_decays_with_volume() {
        assert_eq!(dynamic_multiplier(500, &policy()), dec!(1.3));
        assert_eq!(dynamic_multiplier(1000, &policy()), dec!(1.1));
    }

    #[test]
    fn test_multiplier_floors_on_crowded_side() {
        assert_eq!(dynamic_multiplier(5000, &policy()), dec!(1.1));
    }

    #[test]
    fn test_price_for_uses_volume_on_exact_selection() {
        let mut market = spread_market();
        market.attach_bet(Bet::single("ann", 1, Selection::Home, 500, dec!(1.8)));
        market.attach_bet(Bet::single("bob", 1, Selection::Home, 500, dec!(1.3)));

        // 1000 staked on home, none on away.
        assert_eq!(price_for(&market, &Selection::Home, &policy()).unwrap(), dec!(1.1));
        assert_eq!(price_for(&market, &Selection::Away, &policy()).unwrap(), dec!(1.8));
    }

    #[test]
    fn test_price_for_rejects_foreign_selection() {
        let market = spread_market();
        let err = price_for(&market, &Selection::Over, &policy()).unwrap_err();
        assert!(matches!(err, BookError::InvalidSelection { .. }));
    }

    #[test]
    fn test_fixed_odds_ignore_volume() {
        let mut market = Market {
            id: 2,
            participants: Participants::Subject("Season MVP".to_string()),
            offer: MarketOffer::Futures {
                outcomes: vec![OfferedOutcome { label: "Sharks".into(), price: dec!(4.0) }],
            },
            status: MarketStatus::Open,
            bets: Vec::new(),
            created_at: Utc::now(),
        };
        let sharks = Selection::Outcome("Sharks".into());
        market.attach_bet(Bet::single("ann", 2, sharks.clone(), 2000, dec!(4.0)));

        assert_eq!(price_for(&market, &sharks, &policy()).unwrap(), dec!(4.0));
    }

    #[test]
    fn test_parlay_price_is_leg_product() {
        let combined = combined_parlay_price(&[dec!(1.5), dec!(1.6), dec!(1.7)]);
        assert_eq!(combined, dec!(4.08));
    }

    #[test]
    fn test_payout_rounds_half_up() {
        assert_eq!(payout_for(100, dec!(1.8)), 180);
        assert_eq!(payout_for(100, dec!(4.08)), 408);
        assert_eq!(payout_for(25, dec!(1.1)), 28); // 27.5 rounds up
        assert_eq!(payout_for(3, dec!(1.8)), 5); // 5.4 rounds down
    }

    #[test]
    fn test_moneyline_conversions() {
        assert_eq!(moneyline_from_multiplier(dec!(1.8)), Some(dec!(-125)));
        assert_eq!(moneyline_from_multiplier(dec!(2.5)), Some(dec!(150)));
        assert_eq!(moneyline_from_multiplier(dec!(2.0)), Some(dec!(100)));
        assert_eq!(moneyline_from_multiplier(dec!(1.0)), None);

        assert_eq!(multiplier_from_moneyline(dec!(-125)), Some(dec!(1.8)));
        assert_eq!(multiplier_from_moneyline(dec!(150)), Some(dec!(2.5)));
        assert_eq!(multiplier_from_moneyline(Decimal::ZERO), None);
    }

    #[test]
    fn test_moneyline_round_trip() {
        for multiplier in [dec!(1.1), dec!(1.8), dec!(2.0), dec!(4.08)] {
            let ml = moneyline_from_multiplier(multiplier).unwrap();
            assert_eq!(multiplier_from_moneyline(ml), Some(multiplier));
        }
    }
}
