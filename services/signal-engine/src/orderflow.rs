//! Synthetic order flow
//!
//! Bars carry no trade-side information, so buy and sell volume are
//! reconstructed from where the bar opened and closed inside its range. Every
//! volume-based signal in the engine (gap liquidity, trend delta confirmation,
//! the order-flow summary) goes through [`estimate`].

use crate::config::OrderFlowConfig;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Buy/sell split heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderFlowMethod {
    /// Fixed split by candle direction
    Simple,
    /// Close position and pressure inside the bar's range
    DirectionalPressure,
    /// Mean of simple and directional pressure
    #[default]
    Hybrid,
}

/// Estimated split of one bar's volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderFlowSample {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub delta: f64,
}

impl OrderFlowSample {
    fn from_buy_ratio(volume: f64, buy_ratio: f64) -> Self {
        // The larger side is computed first; subtracting it from the volume is
        // then exact, so buy + sell == volume holds bit for bit.
        let (buy_volume, sell_volume) = if buy_ratio >= 0.5 {
            let buy = volume * buy_ratio;
            (buy, volume - buy)
        } else {
            let sell = volume * (1.0 - buy_ratio);
            (volume - sell, sell)
        };
        Self {
            buy_volume,
            sell_volume,
            delta: buy_volume - sell_volume,
        }
    }

    pub fn total(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }

    /// Buy share in percent, 50 for an empty bar
    pub fn buy_percent(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.buy_volume / total * 100.0
        } else {
            50.0
        }
    }

    /// max(buy, sell) / min(buy, sell) >= ratio
    pub fn is_imbalanced(&self, ratio: f64) -> bool {
        let high = self.buy_volume.max(self.sell_volume);
        let low = self.buy_volume.min(self.sell_volume);
        if high <= 0.0 {
            return false;
        }
        if low <= 0.0 {
            return true;
        }
        high / low >= ratio
    }

    pub fn direction(&self) -> Direction {
        Direction::from_score(self.delta)
    }
}

/// Estimate the buy/sell split of a single bar
pub fn estimate(bar: &PriceBar, method: OrderFlowMethod, config: &OrderFlowConfig) -> OrderFlowSample {
    if bar.volume <= 0.0 {
        return OrderFlowSample {
            buy_volume: 0.0,
            sell_volume: 0.0,
            delta: 0.0,
        };
    }

    // No range, no information: even split for every method
    if bar.range() <= 0.0 {
        return OrderFlowSample::from_buy_ratio(bar.volume, 0.5);
    }

    let ratio = match method {
        OrderFlowMethod::Simple => simple_ratio(bar, config),
        OrderFlowMethod::DirectionalPressure => pressure_ratio(bar, config),
        OrderFlowMethod::Hybrid => (simple_ratio(bar, config) + pressure_ratio(bar, config)) / 2.0,
    };

    OrderFlowSample::from_buy_ratio(bar.volume, ratio.clamp(0.0, 1.0))
}

fn simple_ratio(bar: &PriceBar, config: &OrderFlowConfig) -> f64 {
    if bar.is_bullish() {
        config.simple_buy_ratio
    } else if bar.is_bearish() {
        1.0 - config.simple_buy_ratio
    } else {
        0.5
    }
}

fn pressure_ratio(bar: &PriceBar, config: &OrderFlowConfig) -> f64 {
    let range = bar.range();
    let buying = bar.close - bar.low;
    let selling = bar.high - bar.close;

    let pressure = if buying + selling > 0.0 {
        buying / (buying + selling)
    } else {
        0.5
    };
    let close_position = (bar.close - bar.low) / range;

    let raw = (pressure + close_position) / 2.0;
    config.pressure_floor + raw * (config.pressure_ceiling - config.pressure_floor)
}

/// Per-run cache of order-flow samples, one per bar
#[derive(Debug, Clone)]
pub struct FlowTape {
    method: OrderFlowMethod,
    samples: Vec<OrderFlowSample>,
}

impl FlowTape {
    pub fn build(bars: &[PriceBar], config: &OrderFlowConfig) -> Self {
        let samples = bars
            .iter()
            .map(|bar| estimate(bar, config.method, config))
            .collect();
        Self {
            method: config.method,
            samples,
        }
    }

    pub fn method(&self) -> OrderFlowMethod {
        self.method
    }

    pub fn samples(&self) -> &[OrderFlowSample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&OrderFlowSample> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of deltas over the last `window` bars
    pub fn cumulative_delta(&self, window: usize) -> f64 {
        let start = self.samples.len().saturating_sub(window);
        self.samples[start..].iter().map(|s| s.delta).sum()
    }

    /// Summarise the last `config.summary_window` bars
    pub fn summarize(&self, config: &OrderFlowConfig) -> OrderFlowSummary {
        let start = self.samples.len().saturating_sub(config.summary_window);
        let window = &self.samples[start..];

        let buy: f64 = window.iter().map(|s| s.buy_volume).sum();
        let sell: f64 = window.iter().map(|s| s.sell_volume).sum();
        let cumulative_delta = buy - sell;
        let buy_percent = if buy + sell > 0.0 {
            buy / (buy + sell) * 100.0
        } else {
            50.0
        };

        let last = window.last().copied();
        OrderFlowSummary {
            method: self.method,
            bars: window.len(),
            buy_volume: buy,
            sell_volume: sell,
            cumulative_delta,
            buy_percent,
            last_delta: last.map(|s| s.delta).unwrap_or(0.0),
            imbalanced_bars: window
                .iter()
                .filter(|s| s.is_imbalanced(config.imbalance_ratio))
                .count(),
            last_bar_imbalanced: last
                .map(|s| s.is_imbalanced(config.imbalance_ratio))
                .unwrap_or(false),
            bias: Direction::from_score(cumulative_delta),
        }
    }
}

/// Order-flow summary over the recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFlowSummary {
    pub method: OrderFlowMethod,
    pub bars: usize,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub cumulative_delta: f64,
    pub buy_percent: f64,
    pub last_delta: f64,
    pub imbalanced_bars: usize,
    pub last_bar_imbalanced: bool,
    pub bias: Direction,
}
