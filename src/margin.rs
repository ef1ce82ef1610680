//! Margin requirement calculation.
//!
//! Initial margin is required when opening or increasing a position;
//! maintenance margin is the floor for keeping one open. Both are flat
//! fractions of mark-priced notional, read from the risk registry.

use crate::account::MarginAccount;
use crate::registry::RiskParams;
use crate::types::{Price, Quote};
use rust_decimal::Decimal;

/// Requirement basis for a margin check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginBasis {
    /// Position opened or increased by the operation under check.
    Initial,
    /// Existing position merely marked or reduced.
    Maintenance,
}

pub fn required_margin(
    account: &MarginAccount,
    mark: Price,
    basis: MarginBasis,
    params: &RiskParams,
) -> Quote {
    let rate = match basis {
        MarginBasis::Initial => params.initial_margin_rate,
        MarginBasis::Maintenance => params.maintenance_margin_rate,
    };
    account.notional(mark).mul(rate)
}

/// equity / notional. A flat account is infinitely collateralized.
pub fn margin_ratio(account: &MarginAccount, mark: Price) -> Decimal {
    let notional = account.notional(mark);
    if notional.value().is_zero() {
        return Decimal::MAX;
    }
    account.equity(mark).value() / notional.value()
}

pub fn meets_requirement(
    account: &MarginAccount,
    mark: Price,
    basis: MarginBasis,
    params: &RiskParams,
) -> bool {
    account.equity(mark) >= required_margin(account, mark, basis, params)
}

/// True when equity over notional has fallen below the maintenance rate.
pub fn is_liquidatable(account: &MarginAccount, mark: Price, params: &RiskParams) -> bool {
    if account.is_flat() {
        return false;
    }
    margin_ratio(account, mark) < params.maintenance_margin_rate
}

/// Pool health: equity over the pool's own initial-margin requirement.
/// Checked against the open/liquidate thresholds. A flat pool is healthy.
pub fn pool_health_ratio(pool: &MarginAccount, mark: Price, params: &RiskParams) -> Decimal {
    let required = pool.notional(mark).mul(params.initial_margin_rate);
    if required.value() <= Decimal::ZERO {
        return Decimal::MAX;
    }
    pool.equity(mark).value() / required.value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use rust_decimal_macros::dec;

    fn params() -> RiskParams {
        RiskParams::default() // 10% initial, 5% maintenance
    }

    fn long_account(size: Decimal, entry: Decimal, cash: Decimal) -> MarginAccount {
        let mut acct = MarginAccount::new();
        acct.credit(Quote::new(cash));
        acct.apply_fill(
            Side::Long,
            size,
            Quote::new(size * entry),
            Price::new_unchecked(entry),
        );
        acct
    }

    #[test]
    fn requirement_scales_with_notional() {
        let acct = long_account(dec!(1), dec!(100), dec!(1000));
        let mark = Price::new_unchecked(dec!(100));

        let initial = required_margin(&acct, mark, MarginBasis::Initial, &params());
        let maintenance = required_margin(&acct, mark, MarginBasis::Maintenance, &params());

        assert_eq!(initial.value(), dec!(10));
        assert_eq!(maintenance.value(), dec!(5));
    }

    #[test]
    fn well_funded_account_meets_both_bases() {
        let acct = long_account(dec!(1), dec!(100), dec!(1000));
        let mark = Price::new_unchecked(dec!(100));

        assert!(meets_requirement(&acct, mark, MarginBasis::Initial, &params()));
        assert!(meets_requirement(&acct, mark, MarginBasis::Maintenance, &params()));
        assert!(!is_liquidatable(&acct, mark, &params()));
    }

    #[test]
    fn adverse_move_makes_long_liquidatable() {
        // 10 base at 100 with only 60 cash: 10x-ish leverage
        let acct = long_account(dec!(10), dec!(100), dec!(60));

        // at mark 100 equity is 60, maintenance needs 50: safe
        assert!(!is_liquidatable(&acct, Price::new_unchecked(dec!(100)), &params()));

        // mark 98: equity 60 - 20 = 40, maintenance needs 49: liquidatable
        assert!(is_liquidatable(&acct, Price::new_unchecked(dec!(98)), &params()));
    }

    #[test]
    fn flat_account_never_liquidatable() {
        let mut acct = MarginAccount::new();
        acct.debit(Quote::new(dec!(500))); // pure debt, no position
        assert!(!is_liquidatable(&acct, Price::new_unchecked(dec!(100)), &params()));
        assert_eq!(margin_ratio(&acct, Price::new_unchecked(dec!(100))), Decimal::MAX);
    }

    #[test]
    fn pool_health_against_required_margin() {
        let mut pool = MarginAccount::new();
        pool.credit(Quote::new(dec!(50)));
        pool.apply_fill(
            Side::Short,
            dec!(1),
            Quote::new(dec!(100)),
            Price::new_unchecked(dec!(100)),
        );

        // equity 50, required margin 10: health 5x
        let health = pool_health_ratio(&pool, Price::new_unchecked(dec!(100)), &params());
        assert_eq!(health, dec!(5));
    }

    #[test]
    fn flat_pool_is_healthy() {
        let pool = MarginAccount::new();
        let health = pool_health_ratio(&pool, Price::new_unchecked(dec!(100)), &params());
        assert_eq!(health, Decimal::MAX);
    }
}
