//! Seeded market fixtures for integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signal_engine::{AuxiliarySeries, OptionStrike, OptionsChain, PriceBar, TimeFrame};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
}

/// Deterministic random-walk bar generator
pub struct MockMarket {
    rng: StdRng,
    pub price: f64,
    /// Per-bar drift as a fraction of price
    pub drift: f64,
    /// Per-bar noise amplitude as a fraction of price
    pub volatility: f64,
    pub base_volume: f64,
}

impl MockMarket {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            price: 100.0,
            drift: 0.0,
            volatility: 0.01,
            base_volume: 10_000.0,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn bars(&mut self, count: usize, timeframe: TimeFrame) -> Vec<PriceBar> {
        let step = Duration::seconds(timeframe.to_seconds());
        let start = start_time();
        (0..count)
            .map(|i| {
                let open = self.price;
                let shock = self.rng.gen_range(-1.0..1.0) * self.volatility;
                let close = open * (1.0 + self.drift + shock);
                let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..self.volatility / 2.0));
                let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..self.volatility / 2.0));
                let volume = self.base_volume * self.rng.gen_range(0.5..1.5);
                self.price = close;
                PriceBar::new(start + step * i as i32, open, high, low, close, volume)
            })
            .collect()
    }

    /// Auxiliary close series of `len` points, all random walks
    pub fn auxiliary(&mut self, len: usize) -> AuxiliarySeries {
        AuxiliarySeries {
            broad_index: Some(self.walk(len, 450.0, 0.008)),
            credit_a: Some(self.walk(len, 80.0, 0.004)),
            credit_b: Some(self.walk(len, 100.0, 0.003)),
            volatility: Some(self.walk(len, 18.0, 0.04)),
            currency: Some(self.walk(len, 104.0, 0.003)),
        }
    }

    fn walk(&mut self, len: usize, start: f64, volatility: f64) -> Vec<f64> {
        let mut value = start;
        (0..len)
            .map(|_| {
                value *= 1.0 + self.rng.gen_range(-1.0..1.0) * volatility;
                value
            })
            .collect()
    }

    /// Chain of strikes every `step` around `spot` with random open interest
    pub fn options_chain(&mut self, spot: f64, step: f64, strikes_each_side: usize) -> OptionsChain {
        let center = (spot / step).round() * step;
        let n = strikes_each_side as i64;
        let strikes = (-n..=n)
            .map(|k| {
                let strike = center + k as f64 * step;
                OptionStrike {
                    strike,
                    call_oi: self.rng.gen_range(100.0..5_000.0),
                    put_oi: self.rng.gen_range(100.0..5_000.0),
                    call_gamma: self.rng.gen_range(0.0..0.05),
                    put_gamma: self.rng.gen_range(0.0..0.05),
                    call_volume: self.rng.gen_range(0.0..1_000.0),
                    put_volume: self.rng.gen_range(0.0..1_000.0),
                }
            })
            .collect();
        OptionsChain::new(strikes)
    }
}

/// Symmetric chain: equal open interest and gamma on both sides of every strike
pub fn symmetric_chain(center: f64, step: f64, strikes_each_side: usize) -> OptionsChain {
    let n = strikes_each_side as i64;
    OptionsChain::new(
        (-n..=n)
            .map(|k| OptionStrike {
                strike: center + k as f64 * step,
                call_oi: 1_000.0,
                put_oi: 1_000.0,
                call_gamma: 0.02,
                put_gamma: 0.02,
                call_volume: 0.0,
                put_volume: 0.0,
            })
            .collect(),
    )
}

/// Bar `index` minutes after the fixture start, fixed volume
pub fn ohlc_bar(index: i64, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar::new(start_time() + Duration::minutes(index), open, high, low, close, 1_000.0)
}

/// Opt-in log output for a test run
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
