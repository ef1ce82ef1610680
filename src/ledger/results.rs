// 8.0.2: result types and errors for ledger operations.

use crate::oracle::OracleError;
use crate::pricing::CurveError;
use crate::registry::RegistryError;
use crate::types::{Address, GasPrice, Price, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settlement summary for one executed (or simulated) trade. A simulation
/// query produces exactly the receipt the committing call would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub side: Side,
    pub base_amount: Decimal,
    /// Raw curve quote, before fees.
    pub quote_amount: Quote,
    pub lp_fee: Quote,
    pub mt_fee: Quote,
    /// What the trader's side of the quote leg settles at: cost including
    /// fees on a buy, proceeds net of fees on a sell.
    pub total: Quote,
    pub mark_price: Price,
    pub post_trade_price: Price,
    /// Realized pnl from any closed portion of the position.
    pub realized_pnl: Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    pub trader: Address,
    pub side: Side,
    pub size: Decimal,
    pub mark_price: Price,
    pub realized_pnl: Quote,
    /// Full penalty assessed, `liquidation_penalty_rate * notional`.
    pub penalty: Quote,
    /// Portion actually collected from the trader's cash (floored at zero).
    pub penalty_collected: Quote,
    /// Credited to the pool account, `liquidation_penalty_pool_rate * notional`.
    pub pool_credit: Quote,
    /// Collected penalty beyond the pool credit, discarded.
    pub burned: Quote,
    /// Residual debt left on the trader's flat account.
    pub bad_debt: Quote,
    pub trader_cash_after: Quote,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("{feature} is disabled for this market")]
    FeatureDisabled { feature: &'static str },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Quote, available: Quote },

    #[error("gas price {gas_price} exceeds limit {limit}")]
    GasPriceExceeded { gas_price: GasPrice, limit: GasPrice },

    #[error("slippage bound violated: settled {settled}, bound {bound}")]
    SlippageExceeded { settled: Quote, bound: Quote },

    #[error("pool premium {premium} exceeds limit {limit}")]
    PremiumExceeded { premium: Decimal, limit: Decimal },

    #[error("margin insufficient: equity {equity}, required {required}")]
    MarginInsufficient { equity: Quote, required: Quote },

    #[error("pool health {health} below threshold {threshold}")]
    PoolUnhealthy { health: Decimal, threshold: Decimal },

    #[error("trade amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("account {0} has no open position")]
    NoPosition(Address),

    #[error("account {0} is above the maintenance margin")]
    NotLiquidatable(Address),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("pricing error: {0}")]
    Curve(#[from] CurveError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
