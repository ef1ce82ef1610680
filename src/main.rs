//! Perpetual Swap AMM Simulation.
//!
//! Walks the full market lifecycle: market creation, pool funding,
//! collateral flows, curve trading, adverse price moves, and liquidation.

use perp_amm::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MAINTAINER: Address = Address(0xAD);
const USDC: Address = Address(0x01);
const ORACLE: Address = Address(0x0A);
const ALICE: Address = Address(0x100);
const BOB: Address = Address(0x101);
const KEEPER: Address = Address(0x200);

fn main() {
    println!("Perpetual Swap AMM Engine Simulation");
    println!("Single Market, Oracle-Anchored Curve, Cross-Checked Margin\n");

    scenario_1_market_bootstrap();
    scenario_2_curve_trading();
    scenario_3_price_movement_and_pnl();
    scenario_4_liquidation();
    scenario_5_guardrails();

    println!("\nAll simulations completed successfully.");
}

/// Create a market, fund the pool, and walk through the admin switches.
fn scenario_1_market_bootstrap() {
    println!("Scenario 1: Market Bootstrap\n");

    let mut factory = MarketFactory::new(RiskParams::default());
    let handle = factory
        .create_market(
            MAINTAINER,
            USDC,
            ORACLE,
            settable_oracle(dec!(100)),
            "SOL-USDC",
            dec!(0.0005),
            dec!(0),
            dec!(0.1),
            GasPrice::from_gwei(100),
        )
        .unwrap();

    println!("  Created market {} for oracle {}", handle.symbol, handle.oracle);

    // replaying the creation is a no-op
    let replay = factory
        .create_market(
            MAINTAINER,
            USDC,
            ORACLE,
            settable_oracle(dec!(100)),
            "SOL-USDC",
            dec!(0.0005),
            dec!(0),
            dec!(0.1),
            GasPrice::from_gwei(100),
        )
        .unwrap();
    println!("  Replayed creation, same handle: {}", replay == handle);

    let ledger = factory.ledger_mut(ORACLE).unwrap();
    ledger.registry_mut().enable_deposit(MAINTAINER).unwrap();
    ledger.registry_mut().enable_trading(MAINTAINER).unwrap();
    println!("  Deposit and trading enabled");

    ledger
        .deposit_pool_collateral(MAINTAINER, Quote::new(dec!(49900)), Timestamp::from_secs(0))
        .unwrap();

    let state = ledger.pool_state();
    println!(
        "  Pool funded with $49,900: base target {}, quote target ${}\n",
        state.base_target, state.quote_target
    );
}

/// Query the curve, then trade through it.
fn scenario_2_curve_trading() {
    println!("Scenario 2: Curve Trading\n");

    let mut factory = funded_market(dec!(49900));
    let ledger = factory.ledger_mut(ORACLE).unwrap();

    ledger.transfer_in(ALICE, Quote::new(dec!(1000)), Timestamp::from_secs(0)).unwrap();
    ledger.deposit_collateral(ALICE, Quote::new(dec!(1000)), Timestamp::from_secs(0)).unwrap();
    println!("  Alice moves in $1,000 and posts it all as margin");

    let now = Timestamp::from_secs(60);
    let quoted = ledger.query_buy_base_token(ALICE, dec!(1), now).unwrap();
    println!(
        "  Query: buying 1 base would cost ${} (quote ${} + lp fee ${})",
        quoted.total, quoted.quote_amount, quoted.lp_fee
    );

    let receipt = ledger
        .buy_base_token(ALICE, dec!(1), Quote::new(dec!(1000)), GasPrice::from_gwei(10), now)
        .unwrap();
    println!(
        "  Executed at mark ${}, post-trade price ${}",
        receipt.mark_price, receipt.post_trade_price
    );
    println!("  Query predicted the trade exactly: {}", quoted == receipt);

    let alice = ledger.margin_account(ALICE).unwrap();
    let pool = ledger.pool_account();
    println!(
        "  Alice: {:?} {} base, pool mirrors {:?} {} base\n",
        alice.side.unwrap(),
        alice.size,
        pool.side.unwrap(),
        pool.size
    );
}

/// Mark the position through a price move, then close it.
fn scenario_3_price_movement_and_pnl() {
    println!("Scenario 3: Price Movement and PnL\n");

    let mut factory = funded_market(dec!(49900));
    let ledger = factory.ledger_mut(ORACLE).unwrap();

    ledger.transfer_in(ALICE, Quote::new(dec!(1000)), Timestamp::from_secs(0)).unwrap();
    ledger.deposit_collateral(ALICE, Quote::new(dec!(1000)), Timestamp::from_secs(0)).unwrap();
    ledger
        .buy_base_token(
            ALICE,
            dec!(20),
            Quote::new(dec!(3000)),
            GasPrice::from_gwei(10),
            Timestamp::from_secs(60),
        )
        .unwrap();
    println!("  Alice opens 20 base long at mark $100");

    set_oracle(ledger, dec!(110));
    let mark = Price::new_unchecked(dec!(110));
    let alice = ledger.margin_account(ALICE).unwrap();
    println!(
        "  Mark rises to $110: unrealized PnL ${}, equity ${}",
        alice.unrealized_pnl(mark),
        alice.equity(mark)
    );

    let receipt = ledger
        .sell_base_token(
            ALICE,
            dec!(20),
            Quote::new(dec!(0)),
            GasPrice::from_gwei(10),
            Timestamp::from_secs(1200),
        )
        .unwrap();
    println!(
        "  Closed for ${}: realized PnL ${}",
        receipt.total, receipt.realized_pnl
    );

    let alice = ledger.margin_account(ALICE).unwrap();
    println!("  Alice is flat with ${} cash\n", alice.cash_balance);
}

/// An underwater long gets force-closed at mark.
fn scenario_4_liquidation() {
    println!("Scenario 4: Liquidation\n");

    let mut factory = funded_market(dec!(49900));
    let ledger = factory.ledger_mut(ORACLE).unwrap();

    ledger.transfer_in(BOB, Quote::new(dec!(120)), Timestamp::from_secs(0)).unwrap();
    ledger.deposit_collateral(BOB, Quote::new(dec!(120)), Timestamp::from_secs(0)).unwrap();
    ledger
        .buy_base_token(
            BOB,
            dec!(10),
            Quote::new(dec!(2000)),
            GasPrice::from_gwei(10),
            Timestamp::from_secs(60),
        )
        .unwrap();
    println!("  Bob opens 10 base long on $120 margin (near 10x)");

    set_oracle(ledger, dec!(91));
    println!("  Mark crashes to $91");

    let pool_cash_before = ledger.pool_margin_cash_balance();
    let outcome = ledger
        .liquidate(KEEPER, BOB, Timestamp::from_secs(1200))
        .unwrap();

    println!(
        "  Liquidated {} base at mark ${}: realized ${}",
        outcome.size, outcome.mark_price, outcome.realized_pnl
    );
    println!(
        "  Penalty ${} (collected ${}), pool credit ${}, burned ${}",
        outcome.penalty, outcome.penalty_collected, outcome.pool_credit, outcome.burned
    );
    println!(
        "  Bob keeps ${}, pool cash moved ${}\n",
        outcome.trader_cash_after,
        ledger.pool_margin_cash_balance().sub(pool_cash_before)
    );
}

/// Every gate in action: feature flags, gas cap, slippage, premium.
fn scenario_5_guardrails() {
    println!("Scenario 5: Guardrails\n");

    let mut factory = MarketFactory::new(RiskParams::default());
    factory
        .create_market(
            MAINTAINER,
            USDC,
            ORACLE,
            settable_oracle(dec!(100)),
            "SOL-USDC",
            dec!(0.0005),
            dec!(0),
            dec!(0.1),
            GasPrice::from_gwei(100),
        )
        .unwrap();
    let ledger = factory.ledger_mut(ORACLE).unwrap();

    let err = ledger
        .transfer_in(ALICE, Quote::new(dec!(100)), Timestamp::from_secs(0))
        .unwrap_err();
    println!("  Deposit before enablement: {err}");

    ledger.registry_mut().enable_deposit(MAINTAINER).unwrap();
    ledger.registry_mut().enable_trading(MAINTAINER).unwrap();
    ledger
        .deposit_pool_collateral(MAINTAINER, Quote::new(dec!(49900)), Timestamp::from_secs(0))
        .unwrap();
    ledger.transfer_in(ALICE, Quote::new(dec!(1000)), Timestamp::from_secs(0)).unwrap();
    ledger.deposit_collateral(ALICE, Quote::new(dec!(1000)), Timestamp::from_secs(0)).unwrap();

    let now = Timestamp::from_secs(60);
    let err = ledger
        .buy_base_token(ALICE, dec!(1), Quote::new(dec!(1000)), GasPrice::from_gwei(500), now)
        .unwrap_err();
    println!("  Overpriced gas: {err}");

    let err = ledger
        .buy_base_token(ALICE, dec!(1), Quote::new(dec!(99)), GasPrice::from_gwei(10), now)
        .unwrap_err();
    println!("  Tight slippage cap: {err}");

    let err = ledger
        .buy_base_token(ALICE, dec!(80), Quote::new(dec!(99999)), GasPrice::from_gwei(10), now)
        .unwrap_err();
    println!("  Oversized trade against the premium limit: {err}");

    let ok = ledger
        .buy_base_token(ALICE, dec!(1), Quote::new(dec!(1000)), GasPrice::from_gwei(10), now)
        .is_ok();
    println!("  A well-formed trade still clears: {ok}");
    println!("  Audit log holds {} events", ledger.events().len());
}

fn settable_oracle(price: Decimal) -> OracleAdapter {
    OracleAdapter::Settable(SettableOracle::with_price(Price::new_unchecked(price)))
}

fn funded_market(pool_cash: Decimal) -> MarketFactory {
    let mut factory = MarketFactory::new(RiskParams::default());
    factory
        .create_market(
            MAINTAINER,
            USDC,
            ORACLE,
            settable_oracle(dec!(100)),
            "SOL-USDC",
            dec!(0.0005),
            dec!(0),
            dec!(0.1),
            GasPrice::from_gwei(100),
        )
        .unwrap();
    let ledger = factory.ledger_mut(ORACLE).unwrap();
    ledger.registry_mut().enable_deposit(MAINTAINER).unwrap();
    ledger.registry_mut().enable_trading(MAINTAINER).unwrap();
    ledger
        .deposit_pool_collateral(MAINTAINER, Quote::new(pool_cash), Timestamp::from_secs(0))
        .unwrap();
    factory
}

fn set_oracle(ledger: &mut MarginLedger, price: Decimal) {
    ledger.oracle_mut().set_price(Price::new_unchecked(price));
}
