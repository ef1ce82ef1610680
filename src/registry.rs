// 6.0 registry.rs: per-market risk parameters and feature flags.
//
// pure configuration store. the ledger only reads it; every mutation goes
// through a maintainer-gated setter and takes effect immediately for all
// subsequent calls. no staging, no versioning. rates are fractions in
// [0, 1] and intervals are positive, but callers validate before set: the
// registry stores what it is given.

use crate::types::{Address, GasPrice};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("caller {caller} is not the maintainer {maintainer}")]
    Unauthorized { caller: Address, maintainer: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    pub deposit_enabled: bool,
    pub trading_enabled: bool,
    /// Mark price averaging window, seconds.
    pub twap_interval_seconds: i64,
    /// Max deviation of pool execution price from oracle mark, fraction.
    pub premium_limit: Decimal,
    pub initial_margin_rate: Decimal,
    pub maintenance_margin_rate: Decimal,
    /// Fraction of notional charged to a liquidated trader.
    pub liquidation_penalty_rate: Decimal,
    /// Fraction of notional credited to the pool on liquidation.
    pub liquidation_penalty_pool_rate: Decimal,
    /// Pool health (equity over required margin) floor for accepting trades.
    pub pool_open_threshold: Decimal,
    /// Below this the pool itself is liquidatable and all trading halts.
    pub pool_liquidate_threshold: Decimal,
    pub max_gas_price: GasPrice,
}

impl Default for RiskParams {
    fn default() -> Self {
        // both switches default off: a fresh market accepts nothing until
        // the maintainer explicitly enables it
        Self {
            deposit_enabled: false,
            trading_enabled: false,
            twap_interval_seconds: 600,
            premium_limit: dec!(0.05),
            initial_margin_rate: dec!(0.1),
            maintenance_margin_rate: dec!(0.05),
            liquidation_penalty_rate: dec!(0.01),
            liquidation_penalty_pool_rate: dec!(0.005),
            pool_open_threshold: dec!(2),
            pool_liquidate_threshold: dec!(1),
            max_gas_price: GasPrice::from_gwei(100),
        }
    }
}

/// Owns the RiskParams for one market. Setters are gated on the maintainer
/// identity handed over at market creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRegistry {
    maintainer: Address,
    params: RiskParams,
}

impl RiskRegistry {
    pub fn new(maintainer: Address, params: RiskParams) -> Self {
        Self { maintainer, params }
    }

    pub fn maintainer(&self) -> Address {
        self.maintainer
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    fn require_maintainer(&self, caller: Address) -> Result<(), RegistryError> {
        if caller != self.maintainer {
            return Err(RegistryError::Unauthorized {
                caller,
                maintainer: self.maintainer,
            });
        }
        Ok(())
    }

    pub fn enable_deposit(&mut self, caller: Address) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.deposit_enabled = true;
        Ok(())
    }

    pub fn disable_deposit(&mut self, caller: Address) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.deposit_enabled = false;
        Ok(())
    }

    pub fn enable_trading(&mut self, caller: Address) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.trading_enabled = true;
        Ok(())
    }

    pub fn disable_trading(&mut self, caller: Address) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.trading_enabled = false;
        Ok(())
    }

    pub fn set_twap_interval_seconds(
        &mut self,
        caller: Address,
        seconds: i64,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.twap_interval_seconds = seconds;
        Ok(())
    }

    pub fn set_premium_limit(
        &mut self,
        caller: Address,
        limit: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.premium_limit = limit;
        Ok(())
    }

    pub fn set_initial_margin_rate(
        &mut self,
        caller: Address,
        rate: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.initial_margin_rate = rate;
        Ok(())
    }

    pub fn set_maintenance_margin_rate(
        &mut self,
        caller: Address,
        rate: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.maintenance_margin_rate = rate;
        Ok(())
    }

    pub fn set_liquidation_penalty_rate(
        &mut self,
        caller: Address,
        rate: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.liquidation_penalty_rate = rate;
        Ok(())
    }

    pub fn set_liquidation_penalty_pool_rate(
        &mut self,
        caller: Address,
        rate: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.liquidation_penalty_pool_rate = rate;
        Ok(())
    }

    pub fn set_pool_open_threshold(
        &mut self,
        caller: Address,
        threshold: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.pool_open_threshold = threshold;
        Ok(())
    }

    pub fn set_pool_liquidate_threshold(
        &mut self,
        caller: Address,
        threshold: Decimal,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.pool_liquidate_threshold = threshold;
        Ok(())
    }

    pub fn set_max_gas_price(
        &mut self,
        caller: Address,
        max: GasPrice,
    ) -> Result<(), RegistryError> {
        self.require_maintainer(caller)?;
        self.params.max_gas_price = max;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAINTAINER: Address = Address(1);
    const STRANGER: Address = Address(99);

    fn registry() -> RiskRegistry {
        RiskRegistry::new(MAINTAINER, RiskParams::default())
    }

    #[test]
    fn fresh_market_starts_disabled() {
        let reg = registry();
        assert!(!reg.params().deposit_enabled);
        assert!(!reg.params().trading_enabled);
    }

    #[test]
    fn flags_toggle_independently() {
        let mut reg = registry();

        reg.enable_deposit(MAINTAINER).unwrap();
        assert!(reg.params().deposit_enabled);
        assert!(!reg.params().trading_enabled);

        reg.enable_trading(MAINTAINER).unwrap();
        reg.disable_deposit(MAINTAINER).unwrap();
        assert!(!reg.params().deposit_enabled);
        assert!(reg.params().trading_enabled);
    }

    #[test]
    fn setters_reject_non_maintainer() {
        let mut reg = registry();

        let result = reg.enable_trading(STRANGER);
        assert!(matches!(result, Err(RegistryError::Unauthorized { .. })));
        assert!(!reg.params().trading_enabled);

        assert!(reg.set_premium_limit(STRANGER, dec!(0.1)).is_err());
        assert!(reg
            .set_max_gas_price(STRANGER, GasPrice::from_gwei(1))
            .is_err());
    }

    #[test]
    fn setters_take_effect_immediately() {
        let mut reg = registry();
        reg.set_initial_margin_rate(MAINTAINER, dec!(0.2)).unwrap();
        reg.set_maintenance_margin_rate(MAINTAINER, dec!(0.1))
            .unwrap();
        assert_eq!(reg.params().initial_margin_rate, dec!(0.2));
        assert_eq!(reg.params().maintenance_margin_rate, dec!(0.1));
    }

    use rust_decimal_macros::dec;
}
