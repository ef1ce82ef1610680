// 10.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum
// lists all event types.

use crate::types::{Address, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // collateral events
    TransferIn(TransferEvent),
    TransferOut(TransferEvent),
    CollateralDeposited(CollateralEvent),
    CollateralWithdrawn(CollateralEvent),
    PoolDeposit(PoolDepositEvent),

    // trade events
    Trade(TradeEvent),

    // risk events
    Liquidation(LiquidationEvent),
    BadDebt(BadDebtEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub trader: Address,
    pub amount: Quote,
    pub new_transferable: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralEvent {
    pub trader: Address,
    pub amount: Quote,
    pub new_cash_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDepositEvent {
    pub amount: Quote,
    pub new_pool_cash: Quote,
    pub base_target: Decimal,
    pub quote_target: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trader: Address,
    pub side: Side,
    pub base_amount: Decimal,
    pub quote_amount: Quote,
    pub lp_fee: Quote,
    pub mt_fee: Quote,
    pub mark_price: Price,
    pub post_trade_price: Price,
    pub realized_pnl: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub keeper: Address,
    pub trader: Address,
    pub side: Side,
    pub size: Decimal,
    pub mark_price: Price,
    pub penalty: Quote,
    pub pool_credit: Quote,
    pub burned: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub trader: Address,
    pub amount: Quote,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn events_serialize() {
        let event = Event::new(
            EventId(1),
            Timestamp::from_secs(10),
            EventPayload::TransferIn(TransferEvent {
                trader: Address(7),
                amount: Quote::new(dec!(1000)),
                new_transferable: Quote::new(dec!(1000)),
            }),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TransferIn"));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, EventId(1));
    }
}
