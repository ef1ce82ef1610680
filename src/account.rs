// 4.0 account.rs: the margin account. one per address, and the pool itself
// holds one mirroring every trader fill, so margin and liquidation math is
// uniform across traders and the AMM counterparty.
//
// bookkeeping convention: cash moves by fees and realized pnl only.
// entry_value tracks mark-priced notional at entry; the difference between
// execution quote and mark value accumulates in entry_slippage_loss and is
// realized proportionally on close. 4.2 has the fill application logic.

use crate::types::{Price, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginAccount {
    /// None iff size is zero.
    pub side: Option<Side>,
    /// Absolute base quantity, never negative.
    pub size: Decimal,
    /// Mark-priced quote value recorded at entry/adjustment.
    pub entry_value: Quote,
    /// Signed; negative means debt against margin.
    pub cash_balance: Quote,
    /// Accumulated execution-vs-mark basis from past fills.
    pub entry_slippage_loss: Quote,
}

impl Default for MarginAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl MarginAccount {
    pub fn new() -> Self {
        Self {
            side: None,
            size: Decimal::ZERO,
            entry_value: Quote::zero(),
            cash_balance: Quote::zero(),
            entry_slippage_loss: Quote::zero(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    // 4.1: paper gains/losses against the mark. slippage basis is excluded
    // here; it only realizes on close.
    pub fn unrealized_pnl(&self, mark: Price) -> Quote {
        match self.side {
            Some(Side::Long) => Quote::new(self.size * mark.value() - self.entry_value.value()),
            Some(Side::Short) => Quote::new(self.entry_value.value() - self.size * mark.value()),
            None => Quote::zero(),
        }
    }

    /// cash + unrealized pnl. this vs the margin requirement decides
    /// whether an operation stands.
    pub fn equity(&self, mark: Price) -> Quote {
        self.cash_balance.add(self.unrealized_pnl(mark))
    }

    pub fn notional(&self, mark: Price) -> Quote {
        Quote::new(self.size * mark.value())
    }

    pub fn credit(&mut self, amount: Quote) {
        self.cash_balance = self.cash_balance.add(amount);
    }

    pub fn debit(&mut self, amount: Quote) {
        self.cash_balance = self.cash_balance.sub(amount);
    }

    // 4.2: apply one fill. `direction` is this account's side of the base
    // leg (Long = net buy). a fill against an opposite position closes
    // first and reopens with the remainder, realizing pnl at the split.
    pub fn apply_fill(
        &mut self,
        direction: Side,
        base_amount: Decimal,
        quote_amount: Quote,
        mark: Price,
    ) -> FillOutcome {
        debug_assert!(base_amount > Decimal::ZERO);

        match self.side {
            None => {
                self.open(direction, base_amount, quote_amount, mark);
                FillOutcome {
                    realized_pnl: Quote::zero(),
                    closed_size: Decimal::ZERO,
                    opened_size: base_amount,
                }
            }
            Some(side) if side == direction => {
                self.open(direction, base_amount, quote_amount, mark);
                FillOutcome {
                    realized_pnl: Quote::zero(),
                    closed_size: Decimal::ZERO,
                    opened_size: base_amount,
                }
            }
            Some(_) => {
                let close_amount = self.size.min(base_amount);
                let open_amount = base_amount - close_amount;

                // apportion the quote leg pro rata across the two legs
                let close_quote = quote_amount.mul(close_amount / base_amount).round();
                let open_quote = quote_amount.sub(close_quote);

                let realized = self.close(close_amount, close_quote);

                if open_amount > Decimal::ZERO {
                    self.open(direction, open_amount, open_quote, mark);
                }

                FillOutcome {
                    realized_pnl: realized,
                    closed_size: close_amount,
                    opened_size: open_amount,
                }
            }
        }
    }

    fn open(&mut self, side: Side, base_amount: Decimal, quote_amount: Quote, mark: Price) {
        let mark_value = Quote::new(base_amount * mark.value());

        // buys pay above mark when the pool is short of base, sells receive
        // below mark when it is oversupplied; either way the gap is basis,
        // not immediate cash
        let slippage = match side {
            Side::Long => quote_amount.sub(mark_value),
            Side::Short => mark_value.sub(quote_amount),
        };

        self.side = Some(side);
        self.size += base_amount;
        self.entry_value = self.entry_value.add(mark_value);
        self.entry_slippage_loss = self.entry_slippage_loss.add(slippage);
    }

    fn close(&mut self, base_amount: Decimal, quote_amount: Quote) -> Quote {
        debug_assert!(base_amount <= self.size);

        // the pro rata basis legs settle at the quote scale; the realized
        // figure below is then a sum of already-settled legs and two
        // mirrored accounts realize exact negations of each other
        let fraction = base_amount / self.size;
        let basis_entry = self.entry_value.mul(fraction).round();
        let basis_slippage = self.entry_slippage_loss.mul(fraction).round();

        let realized = match self.side {
            // closing a long sells base: proceeds minus basis
            Some(Side::Long) => quote_amount.sub(basis_entry).sub(basis_slippage),
            // closing a short buys base back: basis minus cost
            Some(Side::Short) => basis_entry.sub(basis_slippage).sub(quote_amount),
            None => Quote::zero(),
        };

        self.size -= base_amount;
        self.entry_value = self.entry_value.sub(basis_entry);
        self.entry_slippage_loss = self.entry_slippage_loss.sub(basis_slippage);
        self.cash_balance = self.cash_balance.add(realized);

        if self.size.is_zero() {
            // full close: side clears and entry figures reset exactly
            self.side = None;
            self.entry_value = Quote::zero();
            self.entry_slippage_loss = Quote::zero();
        }

        realized
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FillOutcome {
    pub realized_pnl: Quote,
    pub closed_size: Decimal,
    pub opened_size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mark(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    #[test]
    fn fresh_account_is_flat() {
        let acct = MarginAccount::new();
        assert!(acct.is_flat());
        assert_eq!(acct.side, None);
        assert_eq!(acct.unrealized_pnl(mark(dec!(100))).value(), dec!(0));
    }

    #[test]
    fn open_long_records_mark_basis_and_slippage() {
        let mut acct = MarginAccount::new();
        // buy 1 at mark 100, paid 100.3 through the curve
        acct.apply_fill(Side::Long, dec!(1), Quote::new(dec!(100.3)), mark(dec!(100)));

        assert_eq!(acct.side, Some(Side::Long));
        assert_eq!(acct.size, dec!(1));
        assert_eq!(acct.entry_value.value(), dec!(100));
        assert_eq!(acct.entry_slippage_loss.value(), dec!(0.3));
        assert_eq!(acct.cash_balance.value(), dec!(0));

        // at the same mark, upnl is zero; the slippage sits in basis
        assert_eq!(acct.unrealized_pnl(mark(dec!(100))).value(), dec!(0));
    }

    #[test]
    fn open_short_slippage_is_shortfall_below_mark() {
        let mut acct = MarginAccount::new();
        // sell 2 at mark 100, received 199 through the curve
        acct.apply_fill(Side::Short, dec!(2), Quote::new(dec!(199)), mark(dec!(100)));

        assert_eq!(acct.side, Some(Side::Short));
        assert_eq!(acct.entry_value.value(), dec!(200));
        assert_eq!(acct.entry_slippage_loss.value(), dec!(1));
    }

    #[test]
    fn long_pnl_tracks_mark() {
        let mut acct = MarginAccount::new();
        acct.apply_fill(Side::Long, dec!(1), Quote::new(dec!(100)), mark(dec!(100)));

        assert_eq!(acct.unrealized_pnl(mark(dec!(110))).value(), dec!(10));
        assert_eq!(acct.unrealized_pnl(mark(dec!(90))).value(), dec!(-10));
    }

    #[test]
    fn full_close_resets_entry_figures() {
        let mut acct = MarginAccount::new();
        acct.apply_fill(Side::Long, dec!(1), Quote::new(dec!(100.3)), mark(dec!(100)));

        // sell the position for 110
        let outcome = acct.apply_fill(Side::Short, dec!(1), Quote::new(dec!(110)), mark(dec!(110)));

        // realized = 110 - 100 - 0.3
        assert_eq!(outcome.realized_pnl.value(), dec!(9.7));
        assert!(acct.is_flat());
        assert_eq!(acct.side, None);
        assert_eq!(acct.entry_value.value(), dec!(0));
        assert_eq!(acct.entry_slippage_loss.value(), dec!(0));
        assert_eq!(acct.cash_balance.value(), dec!(9.7));
    }

    #[test]
    fn partial_close_scales_basis() {
        let mut acct = MarginAccount::new();
        acct.apply_fill(Side::Long, dec!(2), Quote::new(dec!(201)), mark(dec!(100)));

        let outcome = acct.apply_fill(Side::Short, dec!(1), Quote::new(dec!(105)), mark(dec!(105)));

        // realized = 105 - 100 - 0.5
        assert_eq!(outcome.realized_pnl.value(), dec!(4.5));
        assert_eq!(acct.size, dec!(1));
        assert_eq!(acct.entry_value.value(), dec!(100));
        assert_eq!(acct.entry_slippage_loss.value(), dec!(0.5));
    }

    #[test]
    fn oversized_reversal_closes_then_reopens() {
        let mut acct = MarginAccount::new();
        acct.apply_fill(Side::Long, dec!(1), Quote::new(dec!(100)), mark(dec!(100)));

        // sell 3 at mark 100: closes the 1 long, opens 2 short
        let outcome = acct.apply_fill(Side::Short, dec!(3), Quote::new(dec!(300)), mark(dec!(100)));

        assert_eq!(outcome.closed_size, dec!(1));
        assert_eq!(outcome.opened_size, dec!(2));
        assert_eq!(acct.side, Some(Side::Short));
        assert_eq!(acct.size, dec!(2));
        assert_eq!(acct.entry_value.value(), dec!(200));
    }

    #[test]
    fn mirrored_partial_close_realizes_exact_negations() {
        let mut trader = MarginAccount::new();
        let mut pool = MarginAccount::new();

        // basis that does not divide evenly by three, so the pro rata
        // split has to settle at the quote scale
        let m0 = mark(dec!(100));
        let q0 = Quote::new(dec!(301));
        trader.apply_fill(Side::Long, dec!(3), q0, m0);
        pool.apply_fill(Side::Short, dec!(3), q0, m0);

        let m1 = mark(dec!(104));
        let q1 = Quote::new(dec!(103.7));
        let t = trader.apply_fill(Side::Short, dec!(1), q1, m1);
        let p = pool.apply_fill(Side::Long, dec!(1), q1, m1);

        assert_eq!(t.realized_pnl.value() + p.realized_pnl.value(), dec!(0));
        assert_eq!(trader.cash_balance.value() + pool.cash_balance.value(), dec!(0));
    }

    #[test]
    fn mirrored_fills_are_zero_sum() {
        let mut trader = MarginAccount::new();
        let mut pool = MarginAccount::new();

        let m0 = mark(dec!(100));
        let q0 = Quote::new(dec!(100.5));
        trader.apply_fill(Side::Long, dec!(1), q0, m0);
        pool.apply_fill(Side::Short, dec!(1), q0, m0);

        let m1 = mark(dec!(108));
        let q1 = Quote::new(dec!(107.8));
        let t = trader.apply_fill(Side::Short, dec!(1), q1, m1);
        let p = pool.apply_fill(Side::Long, dec!(1), q1, m1);

        assert_eq!(
            t.realized_pnl.value() + p.realized_pnl.value(),
            dec!(0),
            "counterparty realized pnl must cancel exactly"
        );
    }
}
