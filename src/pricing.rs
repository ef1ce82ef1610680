// 2.0 pricing.rs: the execution curve. pure functions of pool state, no
// external calls and no mutation; callers commit the returned pool figures.
//
// marginal price at base inventory B is mark * (1 - k + k * B0^2 / B^2)
// where B0 is the balanced (zero slippage) target. integrating along the
// fill gives the quote leg:
//
//   Q = mark * delta * ((1 - k) + k * B0^2 / (B1 * B2))
//
// with B1 the pre-trade balance and B2 the post-trade balance. k = 0
// collapses to oracle-pegged constant price, k = 1 approaches a constant
// product curve. the same expression serves both directions: buying base
// drains inventory below target and charges a premium, selling into an
// oversupplied pool earns a deepening concession.

use crate::types::{Price, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("trade amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("curve coefficient k must lie in [0, 1], got {0}")]
    InvalidK(Decimal),

    #[error("pool has no base liquidity target")]
    Unfunded,

    #[error("trade of {amount} exceeds pool base inventory {available}")]
    InsufficientDepth { amount: Decimal, available: Decimal },
}

// 2.1: aggregate base/quote target and balance pair. targets mark the
// balanced point and move only on pool-side liquidity events; balances
// track actual holdings and move on every fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub base_target: Decimal,
    pub base_balance: Decimal,
    pub quote_target: Decimal,
    pub quote_balance: Decimal,
}

impl PoolState {
    pub fn empty() -> Self {
        Self {
            base_target: Decimal::ZERO,
            base_balance: Decimal::ZERO,
            quote_target: Decimal::ZERO,
            quote_balance: Decimal::ZERO,
        }
    }

    pub fn is_funded(&self) -> bool {
        self.base_target > Decimal::ZERO
    }

    /// Retarget around new liquidity, preserving the current
    /// balance-vs-target imbalance so a top-up never erases open exposure.
    pub fn retarget(&self, new_base_target: Decimal, new_quote_target: Decimal) -> Self {
        let base_imbalance = self.base_balance - self.base_target;
        let quote_imbalance = self.quote_balance - self.quote_target;
        Self {
            base_target: new_base_target,
            base_balance: new_base_target + base_imbalance,
            quote_target: new_quote_target,
            quote_balance: new_quote_target + quote_imbalance,
        }
    }
}

// 2.2: per-market curve configuration. rates are fractions of the raw
// quote amount; lp fee stays in the pool, mt fee goes to the maintainer sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveParams {
    pub k: Decimal,
    pub lp_fee_rate: Decimal,
    pub mt_fee_rate: Decimal,
}

impl CurveParams {
    pub fn new(k: Decimal, lp_fee_rate: Decimal, mt_fee_rate: Decimal) -> Result<Self, CurveError> {
        if k < Decimal::ZERO || k > Decimal::ONE {
            return Err(CurveError::InvalidK(k));
        }
        Ok(Self {
            k,
            lp_fee_rate,
            mt_fee_rate,
        })
    }
}

/// Everything a caller needs to settle one fill: the raw quote leg, the fee
/// split, the pool figures to commit, and the post-trade marginal price for
/// the premium check.
#[derive(Debug, Clone, Copy)]
pub struct CurveQuote {
    pub quote_amount: Quote,
    pub lp_fee: Quote,
    pub mt_fee: Quote,
    pub new_pool: PoolState,
    pub post_trade_price: Price,
}

impl CurveQuote {
    /// Quote the trader pays on a buy (fees added on top).
    pub fn buy_cost(&self) -> Quote {
        self.quote_amount.add(self.lp_fee).add(self.mt_fee)
    }

    /// Quote the trader receives on a sell (fees taken out).
    pub fn sell_proceeds(&self) -> Quote {
        self.quote_amount.sub(self.lp_fee).sub(self.mt_fee)
    }
}

/// Price one fill against the pool. `side` is the trader's side of the base
/// leg: `Long` buys base from the pool, `Short` sells base to it.
pub fn quote(
    side: Side,
    base_amount: Decimal,
    pool: &PoolState,
    mark: Price,
    params: &CurveParams,
) -> Result<CurveQuote, CurveError> {
    if base_amount <= Decimal::ZERO {
        return Err(CurveError::NonPositiveAmount(base_amount));
    }
    if params.k < Decimal::ZERO || params.k > Decimal::ONE {
        return Err(CurveError::InvalidK(params.k));
    }
    if !pool.is_funded() {
        return Err(CurveError::Unfunded);
    }

    let b0 = pool.base_target;
    let b1 = pool.base_balance;
    let b2 = match side {
        Side::Long => b1 - base_amount,
        Side::Short => b1 + base_amount,
    };

    if b2 <= Decimal::ZERO || b1 <= Decimal::ZERO {
        return Err(CurveError::InsufficientDepth {
            amount: base_amount,
            available: b1.max(Decimal::ZERO),
        });
    }

    let premium_factor = (Decimal::ONE - params.k) + params.k * b0 * b0 / (b1 * b2);

    // the factor carries full precision up to here; the settled legs are
    // rounded to the quote scale
    let quote_amount = (mark.value() * base_amount * premium_factor).round_dp(Quote::SCALE);

    let lp_fee = (quote_amount * params.lp_fee_rate).round_dp(Quote::SCALE);
    let mt_fee = (quote_amount * params.mt_fee_rate).round_dp(Quote::SCALE);

    let new_pool = PoolState {
        base_target: pool.base_target,
        base_balance: b2,
        quote_target: pool.quote_target,
        quote_balance: match side {
            Side::Long => pool.quote_balance + quote_amount,
            Side::Short => pool.quote_balance - quote_amount,
        },
    };

    Ok(CurveQuote {
        quote_amount: Quote::new(quote_amount),
        lp_fee: Quote::new(lp_fee),
        mt_fee: Quote::new(mt_fee),
        new_pool,
        post_trade_price: marginal_price(&new_pool, mark, params),
    })
}

/// Instantaneous execution price at the pool's current base inventory.
pub fn marginal_price(pool: &PoolState, mark: Price, params: &CurveParams) -> Price {
    if !pool.is_funded() || pool.base_balance <= Decimal::ZERO {
        return mark;
    }
    let ratio = pool.base_target / pool.base_balance;
    let factor = (Decimal::ONE - params.k) + params.k * ratio * ratio;
    Price::new_unchecked(mark.value() * factor)
}

/// Premium of the pool's execution price over the oracle mark, as an
/// absolute fraction. Checked against the registry's premium limit.
pub fn premium(pool: &PoolState, mark: Price, params: &CurveParams) -> Decimal {
    let exec = marginal_price(pool, mark, params);
    ((exec.value() - mark.value()) / mark.value()).abs()
}
