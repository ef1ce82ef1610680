// 7.0 factory.rs: market creation and lookup. one margin ledger per oracle
// address; the factory hands out stable handles and owns every ledger it
// creates. risk parameters start from the factory's template with the
// per-market overrides applied, and each market's maintainer (named at
// creation) tunes them afterwards through the ledger's registry.

use crate::ledger::{LedgerConfig, MarginLedger};
use crate::oracle::OracleAdapter;
use crate::pricing::{CurveError, CurveParams};
use crate::registry::{RiskParams, RiskRegistry};
use crate::types::{Address, GasPrice, MarketId};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("a market already exists for oracle {0}")]
    DuplicateMarket(Address),

    #[error("no market exists for oracle {0}")]
    MarketNotFound(Address),

    #[error("curve configuration rejected: {0}")]
    Curve(#[from] CurveError),
}

/// Stable identity of one created market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketHandle {
    pub market_id: MarketId,
    pub oracle: Address,
    pub quote_token: Address,
    pub symbol: String,
}

#[derive(Debug)]
struct Market {
    handle: MarketHandle,
    ledger: MarginLedger,
}

#[derive(Debug)]
pub struct MarketFactory {
    template: RiskParams,
    ledger_config: LedgerConfig,
    markets: Vec<Market>,
    by_oracle: HashMap<Address, MarketId>,
}

impl MarketFactory {
    pub fn new(template: RiskParams) -> Self {
        Self::with_config(template, LedgerConfig::default())
    }

    pub fn with_config(template: RiskParams, config: LedgerConfig) -> Self {
        Self {
            template,
            ledger_config: config,
            markets: Vec::new(),
            by_oracle: HashMap::new(),
        }
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    /// Create the market for `oracle`, or return the existing handle when
    /// one is already registered. Safe to replay; a replay keeps the
    /// market's original maintainer.
    #[allow(clippy::too_many_arguments)]
    pub fn create_market(
        &mut self,
        maintainer: Address,
        quote_token: Address,
        oracle: Address,
        adapter: OracleAdapter,
        symbol: &str,
        lp_fee_rate: Decimal,
        mt_fee_rate: Decimal,
        k: Decimal,
        max_gas_price: GasPrice,
    ) -> Result<MarketHandle, FactoryError> {
        if let Some(id) = self.by_oracle.get(&oracle) {
            return Ok(self.markets[id.0 as usize].handle.clone());
        }
        self.register(
            maintainer,
            quote_token,
            oracle,
            adapter,
            symbol,
            lp_fee_rate,
            mt_fee_rate,
            k,
            max_gas_price,
        )
    }

    /// Like `create_market` but fails when the oracle already has a market.
    #[allow(clippy::too_many_arguments)]
    pub fn try_create_market(
        &mut self,
        maintainer: Address,
        quote_token: Address,
        oracle: Address,
        adapter: OracleAdapter,
        symbol: &str,
        lp_fee_rate: Decimal,
        mt_fee_rate: Decimal,
        k: Decimal,
        max_gas_price: GasPrice,
    ) -> Result<MarketHandle, FactoryError> {
        if self.by_oracle.contains_key(&oracle) {
            return Err(FactoryError::DuplicateMarket(oracle));
        }
        self.register(
            maintainer,
            quote_token,
            oracle,
            adapter,
            symbol,
            lp_fee_rate,
            mt_fee_rate,
            k,
            max_gas_price,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &mut self,
        maintainer: Address,
        quote_token: Address,
        oracle: Address,
        adapter: OracleAdapter,
        symbol: &str,
        lp_fee_rate: Decimal,
        mt_fee_rate: Decimal,
        k: Decimal,
        max_gas_price: GasPrice,
    ) -> Result<MarketHandle, FactoryError> {
        let curve = CurveParams::new(k, lp_fee_rate, mt_fee_rate)?;
        let params = RiskParams {
            max_gas_price,
            ..self.template.clone()
        };
        let registry = RiskRegistry::new(maintainer, params);

        let market_id = MarketId(self.markets.len() as u32);
        let handle = MarketHandle {
            market_id,
            oracle,
            quote_token,
            symbol: symbol.to_string(),
        };
        let ledger = MarginLedger::new(
            symbol.to_string(),
            quote_token,
            registry,
            curve,
            adapter,
            self.ledger_config.clone(),
        );

        self.markets.push(Market {
            handle: handle.clone(),
            ledger,
        });
        self.by_oracle.insert(oracle, market_id);
        Ok(handle)
    }

    pub fn get_market(&self, oracle: Address) -> Result<&MarketHandle, FactoryError> {
        let id = self
            .by_oracle
            .get(&oracle)
            .ok_or(FactoryError::MarketNotFound(oracle))?;
        Ok(&self.markets[id.0 as usize].handle)
    }

    pub fn ledger(&self, oracle: Address) -> Result<&MarginLedger, FactoryError> {
        let id = self
            .by_oracle
            .get(&oracle)
            .ok_or(FactoryError::MarketNotFound(oracle))?;
        Ok(&self.markets[id.0 as usize].ledger)
    }

    pub fn ledger_mut(&mut self, oracle: Address) -> Result<&mut MarginLedger, FactoryError> {
        let id = self
            .by_oracle
            .get(&oracle)
            .ok_or(FactoryError::MarketNotFound(oracle))?;
        Ok(&mut self.markets[id.0 as usize].ledger)
    }

    pub fn handles(&self) -> impl Iterator<Item = &MarketHandle> {
        self.markets.iter().map(|m| &m.handle)
    }
}
