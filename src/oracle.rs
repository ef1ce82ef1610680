// 9.0 oracle.rs: mark price feed abstraction.
//
// the ledger is agnostic to where the mark price comes from. one read
// operation, two implementations behind the same trait: a settable test
// oracle and a reader over an external feed with a staleness window.
// reads are instantaneous; a feed that cannot produce a fresh value fails
// the call instead of waiting.

use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle has no price")]
    NoPrice,

    #[error("oracle price is stale: last update {last_update:?}, max age {max_age_secs}s")]
    Stale {
        last_update: Timestamp,
        max_age_secs: i64,
    },
}

/// A single observation from the feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceReading {
    pub price: Price,
    pub timestamp: Timestamp,
}

/// Capability interface over a mark price source. Selected per market at
/// configuration time; the ledger only ever calls `read`.
pub trait PriceOracle: fmt::Debug {
    fn read(&self, now: Timestamp) -> Result<Price, OracleError>;
}

/// Test oracle with a directly settable price. Never goes stale.
#[derive(Debug, Clone, Default)]
pub struct SettableOracle {
    price: Option<Price>,
}

impl SettableOracle {
    pub fn new() -> Self {
        Self { price: None }
    }

    pub fn with_price(price: Price) -> Self {
        Self { price: Some(price) }
    }

    pub fn set_price(&mut self, price: Price) {
        self.price = Some(price);
    }
}

impl PriceOracle for SettableOracle {
    fn read(&self, _now: Timestamp) -> Result<Price, OracleError> {
        self.price.ok_or(OracleError::NoPrice)
    }
}

/// Reader over a live third-party feed. Updates are pushed in from outside;
/// reads enforce the staleness window.
#[derive(Debug, Clone)]
pub struct FeedOracle {
    latest: Option<PriceReading>,
    max_age_secs: i64,
}

impl FeedOracle {
    pub fn new(max_age_secs: i64) -> Self {
        Self {
            latest: None,
            max_age_secs,
        }
    }

    pub fn submit(&mut self, reading: PriceReading) {
        self.latest = Some(reading);
    }

    pub fn latest(&self) -> Option<&PriceReading> {
        self.latest.as_ref()
    }
}

impl PriceOracle for FeedOracle {
    fn read(&self, now: Timestamp) -> Result<Price, OracleError> {
        let reading = self.latest.ok_or(OracleError::NoPrice)?;
        let age_ms = now.as_millis() - reading.timestamp.as_millis();
        if age_ms > self.max_age_secs * 1000 {
            return Err(OracleError::Stale {
                last_update: reading.timestamp,
                max_age_secs: self.max_age_secs,
            });
        }
        Ok(reading.price)
    }
}

/// Tagged union over the two adapter variants, selected at market
/// configuration time. The ledger owns one of these per market and only
/// ever uses the `PriceOracle` read; the variant-specific mutators exist
/// for the harness feeding the market.
#[derive(Debug, Clone)]
pub enum OracleAdapter {
    Settable(SettableOracle),
    Feed(FeedOracle),
}

impl OracleAdapter {
    /// Set the test price. Returns false for a feed-backed adapter.
    pub fn set_price(&mut self, price: Price) -> bool {
        match self {
            OracleAdapter::Settable(oracle) => {
                oracle.set_price(price);
                true
            }
            OracleAdapter::Feed(_) => false,
        }
    }

    /// Push a feed update. Returns false for a settable adapter.
    pub fn submit(&mut self, reading: PriceReading) -> bool {
        match self {
            OracleAdapter::Settable(_) => false,
            OracleAdapter::Feed(feed) => {
                feed.submit(reading);
                true
            }
        }
    }
}

impl PriceOracle for OracleAdapter {
    fn read(&self, now: Timestamp) -> Result<Price, OracleError> {
        match self {
            OracleAdapter::Settable(oracle) => oracle.read(now),
            OracleAdapter::Feed(feed) => feed.read(now),
        }
    }
}

/// Time-weighted average over oracle observations. The ledger records one
/// sample per operation and uses the window average as the mark price.
#[derive(Debug, Clone)]
pub struct TwapWindow {
    samples: VecDeque<(Timestamp, Price)>,
    window_secs: i64,
    max_samples: usize,
}

impl TwapWindow {
    pub fn new(window_secs: i64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_secs,
            max_samples: 1000,
        }
    }

    pub fn set_window(&mut self, window_secs: i64) {
        self.window_secs = window_secs;
    }

    /// Record a sample and return the resulting time-weighted price.
    pub fn observe(&mut self, now: Timestamp, price: Price) -> Price {
        self.samples.push_back((now, price));

        // drop samples outside the window
        while let Some((ts, _)) = self.samples.front() {
            if now.as_millis() - ts.as_millis() > self.window_secs * 1000 {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }

        self.average()
    }

    /// What `observe` would return, without mutating the window. Simulation
    /// queries use this so a quote matches the trade that would follow it.
    pub fn preview(&self, now: Timestamp, price: Price) -> Price {
        let mut scratch = self.clone();
        scratch.observe(now, price)
    }

    fn average(&self) -> Price {
        debug_assert!(!self.samples.is_empty());

        if self.samples.len() == 1 {
            return self.samples[0].1;
        }

        let mut weighted_sum = Decimal::ZERO;
        let mut total_time = Decimal::ZERO;

        for i in 1..self.samples.len() {
            let (prev_ts, prev_price) = self.samples[i - 1];
            let (curr_ts, _) = self.samples[i];
            let duration = Decimal::from(curr_ts.as_millis() - prev_ts.as_millis());

            weighted_sum += prev_price.value() * duration;
            total_time += duration;
        }

        if total_time > Decimal::ZERO {
            Price::new_unchecked(weighted_sum / total_time)
        } else {
            // all samples at the same instant
            self.samples.back().map(|(_, p)| *p).unwrap()
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn settable_oracle_roundtrip() {
        let mut oracle = SettableOracle::new();
        assert_eq!(
            oracle.read(Timestamp::from_secs(0)),
            Err(OracleError::NoPrice)
        );

        oracle.set_price(Price::new_unchecked(dec!(100)));
        assert_eq!(
            oracle.read(Timestamp::from_secs(9999)).unwrap().value(),
            dec!(100)
        );
    }

    #[test]
    fn feed_oracle_staleness() {
        let mut feed = FeedOracle::new(60);
        assert_eq!(feed.read(Timestamp::from_secs(0)), Err(OracleError::NoPrice));

        feed.submit(PriceReading {
            price: Price::new_unchecked(dec!(50000)),
            timestamp: Timestamp::from_secs(1000),
        });

        // fresh at +30s, exactly at the window, stale one second past it
        assert!(feed.read(Timestamp::from_secs(1030)).is_ok());
        assert!(feed.read(Timestamp::from_secs(1060)).is_ok());
        assert!(matches!(
            feed.read(Timestamp::from_secs(1061)),
            Err(OracleError::Stale { .. })
        ));
    }

    #[test]
    fn twap_single_sample_is_spot() {
        let mut twap = TwapWindow::new(600);
        let mark = twap.observe(Timestamp::from_secs(0), Price::new_unchecked(dec!(100)));
        assert_eq!(mark.value(), dec!(100));
    }

    #[test]
    fn twap_weights_by_duration() {
        let mut twap = TwapWindow::new(3600);
        twap.observe(Timestamp::from_secs(0), Price::new_unchecked(dec!(50000)));
        twap.observe(Timestamp::from_secs(1000), Price::new_unchecked(dec!(51000)));
        let mark = twap.observe(Timestamp::from_secs(2000), Price::new_unchecked(dec!(52000)));

        // 50000 for 1000s, 51000 for 1000s
        assert_eq!(mark.value(), dec!(50500));
    }

    #[test]
    fn twap_drops_samples_outside_window() {
        let mut twap = TwapWindow::new(60);
        twap.observe(Timestamp::from_secs(0), Price::new_unchecked(dec!(100)));
        let mark = twap.observe(Timestamp::from_secs(1000), Price::new_unchecked(dec!(200)));

        assert_eq!(twap.sample_count(), 1);
        assert_eq!(mark.value(), dec!(200));
    }

    #[test]
    fn preview_matches_observe() {
        let mut twap = TwapWindow::new(3600);
        twap.observe(Timestamp::from_secs(0), Price::new_unchecked(dec!(100)));

        let next = Price::new_unchecked(dec!(110));
        let previewed = twap.preview(Timestamp::from_secs(100), next);
        let observed = twap.observe(Timestamp::from_secs(100), next);

        assert_eq!(previewed, observed);
    }
}
