// 8.1 ledger/core.rs: ledger struct, collateral flows, and read projections.
// trades live in trades.rs, liquidation in liquidations.rs.

use super::config::LedgerConfig;
use super::results::LedgerError;
use crate::account::MarginAccount;
use crate::events::{
    CollateralEvent, Event, EventId, EventPayload, PoolDepositEvent, TransferEvent,
};
use crate::margin::{self, MarginBasis};
use crate::oracle::{OracleAdapter, PriceOracle, TwapWindow};
use crate::pricing::{CurveParams, PoolState};
use crate::registry::{RegistryError, RiskRegistry};
use crate::types::{Address, Price, Quote, Timestamp};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One market's margin ledger. Exclusively owns every margin account and
/// the pool state for its market; reads risk parameters from its registry
/// and prices from its oracle adapter.
#[derive(Debug)]
pub struct MarginLedger {
    pub(super) config: LedgerConfig,
    pub(super) symbol: String,
    pub(super) quote_token: Address,
    pub(super) maintainer: Address,
    pub(super) registry: RiskRegistry,
    pub(super) curve: CurveParams,
    pub(super) oracle: OracleAdapter,
    pub(super) twap: TwapWindow,
    pub(super) accounts: HashMap<Address, MarginAccount>,
    /// Quote moved in from outside but not yet committed as margin.
    pub(super) transferable: HashMap<Address, Quote>,
    /// The AMM's own account, mirroring every trader fill.
    pub(super) pool: MarginAccount,
    pub(super) pool_state: PoolState,
    pub(super) maintainer_fee_sink: Quote,
    pub(super) cumulative_bad_debt: Quote,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl MarginLedger {
    pub fn new(
        symbol: String,
        quote_token: Address,
        registry: RiskRegistry,
        curve: CurveParams,
        oracle: OracleAdapter,
        config: LedgerConfig,
    ) -> Self {
        let twap = TwapWindow::new(registry.params().twap_interval_seconds);
        let maintainer = registry.maintainer();
        Self {
            config,
            symbol,
            quote_token,
            maintainer,
            registry,
            curve,
            oracle,
            twap,
            accounts: HashMap::new(),
            transferable: HashMap::new(),
            pool: MarginAccount::new(),
            pool_state: PoolState::empty(),
            maintainer_fee_sink: Quote::zero(),
            cumulative_bad_debt: Quote::zero(),
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quote_token(&self) -> Address {
        self.quote_token
    }

    pub fn maintainer(&self) -> Address {
        self.maintainer
    }

    pub fn registry(&self) -> &RiskRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RiskRegistry {
        &mut self.registry
    }

    pub fn curve_params(&self) -> &CurveParams {
        &self.curve
    }

    pub fn oracle_mut(&mut self) -> &mut OracleAdapter {
        &mut self.oracle
    }

    pub fn pool_state(&self) -> &PoolState {
        &self.pool_state
    }

    pub fn pool_account(&self) -> &MarginAccount {
        &self.pool
    }

    /// Read-only projection of the pool account's cash balance.
    pub fn pool_margin_cash_balance(&self) -> Quote {
        self.pool.cash_balance
    }

    pub fn margin_account(&self, trader: Address) -> Option<&MarginAccount> {
        self.accounts.get(&trader)
    }

    pub fn transferable_balance(&self, trader: Address) -> Quote {
        self.transferable
            .get(&trader)
            .copied()
            .unwrap_or_else(Quote::zero)
    }

    pub fn maintainer_fee_balance(&self) -> Quote {
        self.maintainer_fee_sink
    }

    pub fn cumulative_bad_debt(&self) -> Quote {
        self.cumulative_bad_debt
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    // 8.2: collateral flows.

    /// Move quote from the trader's external balance into the transferable
    /// balance held by the ledger. Repeated calls simply add.
    pub fn transfer_in(
        &mut self,
        trader: Address,
        amount: Quote,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if !self.registry.params().deposit_enabled {
            return Err(LedgerError::FeatureDisabled { feature: "deposit" });
        }
        if amount.value() <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.value()));
        }

        let balance = self
            .transferable
            .entry(trader)
            .or_insert_with(Quote::zero);
        *balance = balance.add(amount);
        let new_transferable = *balance;

        self.emit_event(
            now,
            EventPayload::TransferIn(TransferEvent {
                trader,
                amount,
                new_transferable,
            }),
        );
        Ok(())
    }

    /// Return transferable quote to the trader's external balance. Not
    /// gated on the deposit flag: exits stay open even when entry is shut.
    pub fn transfer_out(
        &mut self,
        trader: Address,
        amount: Quote,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if amount.value() <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.value()));
        }
        let available = self.transferable_balance(trader);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let balance = self
            .transferable
            .entry(trader)
            .or_insert_with(Quote::zero);
        *balance = balance.sub(amount);
        let new_transferable = *balance;

        self.emit_event(
            now,
            EventPayload::TransferOut(TransferEvent {
                trader,
                amount,
                new_transferable,
            }),
        );
        Ok(())
    }

    /// Commit transferable balance as margin cash.
    pub fn deposit_collateral(
        &mut self,
        trader: Address,
        amount: Quote,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if !self.registry.params().deposit_enabled {
            return Err(LedgerError::FeatureDisabled { feature: "deposit" });
        }
        if amount.value() <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.value()));
        }
        let available = self.transferable_balance(trader);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let balance = self
            .transferable
            .entry(trader)
            .or_insert_with(Quote::zero);
        *balance = balance.sub(amount);

        let account = self.accounts.entry(trader).or_default();
        account.credit(amount);
        let new_cash_balance = account.cash_balance;

        self.emit_event(
            now,
            EventPayload::CollateralDeposited(CollateralEvent {
                trader,
                amount,
                new_cash_balance,
            }),
        );
        Ok(())
    }

    /// Move margin cash back to the transferable balance. An account with
    /// an open position must stay above its initial-margin requirement
    /// after the withdrawal.
    pub fn withdraw_collateral(
        &mut self,
        trader: Address,
        amount: Quote,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if amount.value() <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.value()));
        }
        let account = self
            .accounts
            .get(&trader)
            .ok_or(LedgerError::InsufficientBalance {
                requested: amount,
                available: Quote::zero(),
            })?;

        if amount > account.cash_balance.max_zero() {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: account.cash_balance.max_zero(),
            });
        }

        let mut staged = account.clone();
        staged.debit(amount);

        if !staged.is_flat() {
            let mark = self.mark_price_preview(now)?;
            if !margin::meets_requirement(
                &staged,
                mark,
                MarginBasis::Initial,
                self.registry.params(),
            ) {
                return Err(LedgerError::MarginInsufficient {
                    equity: staged.equity(mark),
                    required: margin::required_margin(
                        &staged,
                        mark,
                        MarginBasis::Initial,
                        self.registry.params(),
                    ),
                });
            }
        }

        let new_cash_balance = staged.cash_balance;
        self.accounts.insert(trader, staged);
        let balance = self
            .transferable
            .entry(trader)
            .or_insert_with(Quote::zero);
        *balance = balance.add(amount);

        self.emit_event(
            now,
            EventPayload::CollateralWithdrawn(CollateralEvent {
                trader,
                amount,
                new_cash_balance,
            }),
        );
        Ok(())
    }

    /// Maintainer top-up of the pool account. This is the only operation
    /// that moves the pool targets: the pool cash is split half and half
    /// into a virtual quote target and a base target at the current mark,
    /// preserving any open trade imbalance.
    pub fn deposit_pool_collateral(
        &mut self,
        caller: Address,
        amount: Quote,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if caller != self.maintainer {
            return Err(LedgerError::Registry(RegistryError::Unauthorized {
                caller,
                maintainer: self.maintainer,
            }));
        }
        if amount.value() <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.value()));
        }

        let mark = self.mark_price(now)?;

        self.pool.credit(amount);
        let half = self.pool.cash_balance.value() / Decimal::TWO;
        let base_target = half / mark.value();
        self.pool_state = self.pool_state.retarget(base_target, half);

        let new_pool_cash = self.pool.cash_balance;
        let base_target = self.pool_state.base_target;
        let quote_target = self.pool_state.quote_target;
        self.emit_event(
            now,
            EventPayload::PoolDeposit(PoolDepositEvent {
                amount,
                new_pool_cash,
                base_target,
                quote_target,
            }),
        );
        Ok(())
    }

    /// Pool health ratio at the current mark.
    pub fn pool_health(&self, now: Timestamp) -> Result<Decimal, LedgerError> {
        let mark = self.mark_price_preview(now)?;
        Ok(margin::pool_health_ratio(
            &self.pool,
            mark,
            self.registry.params(),
        ))
    }

    // 8.3: mark price plumbing. one oracle sample per mutating operation,
    // averaged over the registry's twap window.

    pub(super) fn mark_price(&mut self, now: Timestamp) -> Result<Price, LedgerError> {
        let spot = self.oracle.read(now)?;
        self.twap
            .set_window(self.registry.params().twap_interval_seconds);
        Ok(self.twap.observe(now, spot))
    }

    /// Mark price a mutating call at `now` would settle against, without
    /// recording the sample. Queries and staged validations use this.
    pub(super) fn mark_price_preview(&self, now: Timestamp) -> Result<Price, LedgerError> {
        let spot = self.oracle.read(now)?;
        let mut window = self.twap.clone();
        window.set_window(self.registry.params().twap_interval_seconds);
        Ok(window.preview(now, spot))
    }

    /// Record the oracle sample a committed operation settled on. The
    /// caller already priced against `mark_price_preview` at the same
    /// instant, so the read cannot fail here.
    pub(super) fn record_mark_sample(&mut self, now: Timestamp) {
        if let Ok(spot) = self.oracle.read(now) {
            self.twap
                .set_window(self.registry.params().twap_interval_seconds);
            self.twap.observe(now, spot);
        }
    }

    pub(super) fn emit_event(&mut self, timestamp: Timestamp, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), timestamp, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
