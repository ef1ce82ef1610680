// perp-amm: perpetual swap AMM engine.
// margin-first architecture: every account change re-checks collateral.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, Side, Price, Quote, GasPrice
//   2.x  pricing.rs: execution curve, pool state, premium
//   3.x  margin.rs: IM/MM requirements, pool health
//   4.x  account.rs: margin account, fills, PnL realization
//   6.x  registry.rs: risk parameters and feature flags
//   7.x  factory.rs: market creation, one ledger per oracle
//   8.x  ledger/: margin ledger: collateral, trades, liquidations
//   9.x  oracle.rs: price feed adapters and TWAP window
//   10.x events.rs: state transition events for audit

// core modules
pub mod account;
pub mod factory;
pub mod ledger;
pub mod margin;
pub mod pricing;
pub mod types;

// risk and configuration modules
pub mod oracle;
pub mod registry;

// audit
pub mod events;

// re exports for convenience
pub use account::*;
pub use factory::*;
pub use ledger::*;
pub use margin::*;
pub use pricing::*;
pub use types::*;
pub use events::*;
pub use oracle::{
    FeedOracle, OracleAdapter, OracleError, PriceOracle, PriceReading, SettableOracle, TwapWindow,
};
pub use registry::{RegistryError, RiskParams, RiskRegistry};
