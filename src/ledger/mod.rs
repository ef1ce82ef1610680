// 8.0: the margin ledger. owns every margin account and the pool state for
// one market, routes trades through the pricing curve, enforces registry
// constraints, and applies liquidation. each operation validates on staged
// copies and commits last, so any failure leaves state untouched.

mod config;
mod core;
mod liquidations;
mod results;
mod trades;

pub use self::config::LedgerConfig;
pub use self::core::MarginLedger;
pub use self::results::{LedgerError, LiquidationOutcome, TradeReceipt};
