//! Trend/momentum composite
//!
//! Two stages: [`measure`] reads indicator values off the bars, [`score`]
//! turns measurements into sub-scores, the volume-adjusted core value and the
//! prohibition gate. Keeping them apart lets the gate be checked directly
//! against known indicator readings.

use crate::config::TrendConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::indicators::{self, MacdOutput};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Indicator readings at the last bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMeasurements {
    pub close: f64,
    pub ma_fast: f64,
    pub ma_mid: f64,
    pub ma_slow: f64,
    pub ma_long: f64,
    pub rsi: f64,
    pub macd: MacdOutput,
    pub vwap: f64,
    pub trend_ma: f64,
    pub adx: f64,
    pub atr_ratio: f64,
    pub volume_ratio: f64,
}

/// Sub-scores on [-100, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSubScores {
    pub moving_averages: f64,
    pub rsi: f64,
    pub macd: f64,
    pub vwap: f64,
    pub trend_flag: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub measurements: TrendMeasurements,
    pub sub_scores: TrendSubScores,
    pub directional: f64,
    /// 0.5 + 1.5 · mean(trend, volatility, volume strength), in [0.5, 2.0]
    pub momentum_multiplier: f64,
    /// Clamped directional × multiplier; zero while prohibited
    pub core: f64,
    pub direction: Direction,
    pub prohibition_active: bool,
    pub prohibition_reasons: Vec<String>,
    pub cumulative_delta: f64,
    /// Order-flow delta over the volume window agrees with `direction`
    pub delta_confirms: bool,
}

impl TrendReport {
    pub fn with_flow(mut self, cumulative_delta: f64) -> Self {
        self.cumulative_delta = cumulative_delta;
        self.delta_confirms =
            !self.direction.is_neutral() && Direction::from_score(cumulative_delta) == self.direction;
        self
    }
}

/// Minimum bars for every indicator in `measure` to warm up
pub fn required_bars(config: &TrendConfig) -> usize {
    [
        config.ma_long,
        config.ma_slow,
        config.ma_mid,
        config.ma_fast,
        config.trend_ma_period,
        config.rsi_period + 1,
        config.macd_slow + config.macd_signal - 1,
        config.vwap_period,
        2 * config.adx_period,
        config.atr_period + config.atr_ratio_period - 1,
        config.volume_period + 1,
    ]
    .into_iter()
    .max()
    .unwrap_or(1)
}

pub fn measure(bars: &[PriceBar], config: &TrendConfig) -> Result<TrendMeasurements> {
    let required = required_bars(config);
    let insufficient = || EngineError::insufficient(ComponentKind::Trend.as_str(), required, bars.len());
    if bars.len() < required {
        return Err(insufficient());
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let sma = |period: usize| indicators::sma(&closes, period).ok_or_else(insufficient);

    let atr_series = indicators::atr_series(bars, config.atr_period);
    let atr_window = &atr_series[atr_series.len().saturating_sub(config.atr_ratio_period)..];
    let atr_ratio = match (atr_series.last(), indicators::mean(atr_window)) {
        (Some(current), Some(mean)) if mean > 0.0 => current / mean,
        _ => 0.0,
    };

    let last = volumes.len() - 1;
    let prior = &volumes[last.saturating_sub(config.volume_period)..last];
    let volume_ratio = match indicators::mean(prior) {
        Some(mean) if mean > 0.0 => volumes[last] / mean,
        _ => 0.0,
    };

    Ok(TrendMeasurements {
        close: closes[last],
        ma_fast: sma(config.ma_fast)?,
        ma_mid: sma(config.ma_mid)?,
        ma_slow: sma(config.ma_slow)?,
        ma_long: sma(config.ma_long)?,
        rsi: indicators::rsi(&closes, config.rsi_period).ok_or_else(insufficient)?,
        macd: indicators::macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal)
            .ok_or_else(insufficient)?,
        vwap: indicators::vwap(bars, config.vwap_period).unwrap_or(closes[last]),
        trend_ma: sma(config.trend_ma_period)?,
        adx: indicators::adx(bars, config.adx_period).ok_or_else(insufficient)?,
        atr_ratio,
        volume_ratio,
    })
}

pub fn score(m: &TrendMeasurements, config: &TrendConfig) -> TrendReport {
    let sub_scores = TrendSubScores {
        moving_averages: ma_stack_score(&[m.ma_fast, m.ma_mid, m.ma_slow, m.ma_long]),
        rsi: rsi_score(m.rsi, config),
        macd: macd_score(&m.macd),
        vwap: vwap_score(m.close, m.vwap, config.vwap_band_pct),
        trend_flag: signum_score(m.close - m.trend_ma),
    };

    let w = &config.weights;
    let directional = w.moving_averages * sub_scores.moving_averages
        + w.rsi * sub_scores.rsi
        + w.macd * sub_scores.macd
        + w.vwap * sub_scores.vwap
        + w.trend_flag * sub_scores.trend_flag;

    let strengths = [
        (m.adx / config.adx_norm).min(1.0),
        (m.atr_ratio / config.atr_norm).min(1.0),
        (m.volume_ratio / config.volume_norm).min(1.0),
    ];
    let mean_strength = strengths.iter().map(|s| s.max(0.0)).sum::<f64>() / strengths.len() as f64;
    let momentum_multiplier = 0.5 + 1.5 * mean_strength;

    let mut prohibition_reasons = Vec::new();
    if m.adx < config.min_adx {
        prohibition_reasons.push(format!("ADX {:.1} below {:.1}", m.adx, config.min_adx));
    }
    if m.atr_ratio < config.min_atr_ratio {
        prohibition_reasons.push(format!(
            "ATR ratio {:.2} below {:.2}",
            m.atr_ratio, config.min_atr_ratio
        ));
    }
    let ma_distance_pct = if m.trend_ma > 0.0 {
        (m.close - m.trend_ma).abs() / m.trend_ma * 100.0
    } else {
        0.0
    };
    if ma_distance_pct < config.min_ma_distance_pct {
        prohibition_reasons.push(format!(
            "price {:.2}% from trend MA, need {:.2}%",
            ma_distance_pct, config.min_ma_distance_pct
        ));
    }
    if m.volume_ratio < config.min_volume_ratio {
        prohibition_reasons.push(format!(
            "volume ratio {:.2} below {:.2}",
            m.volume_ratio, config.min_volume_ratio
        ));
    }

    let prohibition_active = !prohibition_reasons.is_empty();
    let core = if prohibition_active {
        0.0
    } else {
        (directional * momentum_multiplier).clamp(-100.0, 100.0)
    };

    TrendReport {
        measurements: m.clone(),
        sub_scores,
        directional,
        momentum_multiplier,
        core,
        direction: Direction::from_score(core),
        prohibition_active,
        prohibition_reasons,
        cumulative_delta: 0.0,
        delta_confirms: false,
    }
}

/// ±33.33 per adjacent pair of the fast-to-slow stack
fn ma_stack_score(stack: &[f64]) -> f64 {
    stack
        .windows(2)
        .map(|w| signum_score(w[0] - w[1]) / 3.0)
        .sum()
}

fn rsi_score(rsi: f64, config: &TrendConfig) -> f64 {
    if rsi > config.rsi_overbought {
        50.0
    } else if rsi > config.rsi_midline {
        100.0
    } else if rsi > config.rsi_oversold {
        -100.0
    } else {
        -50.0
    }
}

fn macd_score(macd: &MacdOutput) -> f64 {
    signum_score(macd.histogram) / 2.0 + signum_score(macd.line) / 2.0
}

fn vwap_score(close: f64, vwap: f64, band_pct: f64) -> f64 {
    if vwap <= 0.0 {
        return 0.0;
    }
    let distance = (close - vwap) / vwap * 100.0;
    if distance > band_pct {
        100.0
    } else if distance >= 0.0 {
        50.0
    } else if distance < -band_pct {
        -100.0
    } else {
        -50.0
    }
}

fn signum_score(value: f64) -> f64 {
    if value > 0.0 {
        100.0
    } else if value < 0.0 {
        -100.0
    } else {
        0.0
    }
}

pub struct TrendComposite<'a> {
    config: &'a TrendConfig,
}

impl<'a> TrendComposite<'a> {
    pub fn new(config: &'a TrendConfig) -> Self {
        Self { config }
    }
}

impl<'a> Component for TrendComposite<'a> {
    type Output = TrendReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Trend
    }

    fn required_bars(&self) -> usize {
        required_bars(self.config)
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<TrendReport> {
        let measurements = measure(ctx.bars, self.config)?;
        let report = score(&measurements, self.config)
            .with_flow(ctx.tape.cumulative_delta(self.config.volume_period));

        debug!(
            core = report.core,
            adx = measurements.adx,
            prohibited = report.prohibition_active,
            delta_confirms = report.delta_confirms,
            "trend evaluated"
        );
        Ok(report)
    }
}
