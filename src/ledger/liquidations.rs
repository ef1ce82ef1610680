//! Forced position closure.
//!
//! A liquidation settles the whole position at the pure oracle mark, not
//! through the curve: the pool absorbs the inventory at mark and its
//! targets stay put. The penalty comes out of whatever cash the account
//! has left, the pool's share is credited unconditionally, and anything
//! the cash could not cover is recorded as bad debt.

use super::core::MarginLedger;
use super::results::{LedgerError, LiquidationOutcome};
use crate::events::{BadDebtEvent, EventPayload, LiquidationEvent};
use crate::margin;
use crate::types::{Address, Side, Timestamp};

impl MarginLedger {
    /// Close `trader`'s position by force. Callable by anyone; the caller
    /// is recorded as the keeper. Fails with `NotLiquidatable` while the
    /// account still meets its maintenance margin.
    pub fn liquidate(
        &mut self,
        keeper: Address,
        trader: Address,
        now: Timestamp,
    ) -> Result<LiquidationOutcome, LedgerError> {
        let mark = self.mark_price_preview(now)?;
        let params = self.registry.params().clone();

        let account = self
            .accounts
            .get_mut(&trader)
            .ok_or(LedgerError::NoPosition(trader))?;
        let side = account.side.ok_or(LedgerError::NoPosition(trader))?;

        if !margin::is_liquidatable(account, mark, &params) {
            return Err(LedgerError::NotLiquidatable(trader));
        }

        let size = account.size;
        let notional = account.notional(mark).round();

        // settle at mark: the close leg realizes exactly upnl plus the
        // accumulated slippage basis
        let close_direction = side.opposite();
        let outcome = account.apply_fill(close_direction, size, notional, mark);

        let penalty = notional.mul(params.liquidation_penalty_rate).round();
        let collectible = penalty.min(account.cash_balance.max_zero());
        account.debit(collectible);

        let pool_credit = notional.mul(params.liquidation_penalty_pool_rate).round();
        let burned = collectible.sub(pool_credit).max_zero();

        let trader_cash_after = account.cash_balance;
        let bad_debt = trader_cash_after.negate().max_zero();

        // the pool takes the other side of the close at mark
        self.pool.apply_fill(side, size, notional, mark);
        self.pool.credit(pool_credit);
        match side {
            // a closing long sells base back to the pool
            Side::Long => {
                self.pool_state.base_balance += size;
                self.pool_state.quote_balance -= notional.value();
            }
            Side::Short => {
                self.pool_state.base_balance -= size;
                self.pool_state.quote_balance += notional.value();
            }
        }

        self.record_mark_sample(now);

        if !bad_debt.is_zero() {
            self.cumulative_bad_debt = self.cumulative_bad_debt.add(bad_debt);
            self.emit_event(now, EventPayload::BadDebt(BadDebtEvent { trader, amount: bad_debt }));
        }

        self.emit_event(
            now,
            EventPayload::Liquidation(LiquidationEvent {
                keeper,
                trader,
                side,
                size,
                mark_price: mark,
                penalty,
                pool_credit,
                burned,
            }),
        );

        Ok(LiquidationOutcome {
            trader,
            side,
            size,
            mark_price: mark,
            realized_pnl: outcome.realized_pnl,
            penalty,
            penalty_collected: collectible,
            pool_credit,
            burned,
            bad_debt,
            trader_cash_after,
        })
    }
}
