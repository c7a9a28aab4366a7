//! Williams VIX Fix fear detector
//!
//! `wvf = (highest close over period - close) / highest close * 100`. The
//! current reading is extreme when it clears either the rolling mean + k·σ
//! band or a fraction of its own recent range high.

use crate::config::FearConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::indicators;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearReport {
    pub wvf: f64,
    pub upper_band: f64,
    pub range_threshold: f64,
    pub fear_extreme: bool,
}

impl FearReport {
    /// Contrarian: extreme fear reads bullish
    pub fn score(&self) -> f64 {
        if self.fear_extreme {
            100.0
        } else {
            0.0
        }
    }
}

/// WVF for every bar with a full highest-close window
pub fn wvf_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }
    closes
        .windows(period)
        .map(|w| {
            let highest = w.iter().copied().fold(f64::MIN, f64::max);
            let close = w[w.len() - 1];
            if highest > 0.0 {
                (highest - close) / highest * 100.0
            } else {
                0.0
            }
        })
        .collect()
}

pub struct FearDetector<'a> {
    config: &'a FearConfig,
}

impl<'a> FearDetector<'a> {
    pub fn new(config: &'a FearConfig) -> Self {
        Self { config }
    }
}

impl<'a> Component for FearDetector<'a> {
    type Output = FearReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Fear
    }

    fn required_bars(&self) -> usize {
        self.config.period + self.config.band_period.max(self.config.percentile_lookback) - 1
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<FearReport> {
        let cfg = self.config;
        let closes: Vec<f64> = ctx.bars.iter().map(|b| b.close).collect();
        let series = wvf_series(&closes, cfg.period);
        let insufficient = || EngineError::insufficient(self.kind().as_str(), self.required_bars(), closes.len());

        let wvf = *series.last().ok_or_else(insufficient)?;

        let band_window = &series[series.len().saturating_sub(cfg.band_period)..];
        let mean = indicators::mean(band_window).ok_or_else(insufficient)?;
        let sd = indicators::std_dev(band_window).ok_or_else(insufficient)?;
        let upper_band = mean + cfg.std_mult * sd;

        let range_window = &series[series.len().saturating_sub(cfg.percentile_lookback)..];
        let range_high = indicators::highest(range_window).ok_or_else(insufficient)?;
        let range_threshold = range_high * cfg.percentile;

        let fear_extreme = (wvf >= upper_band || wvf >= range_threshold)
            && !(cfg.ignore_zero_reading && wvf <= 0.0);

        debug!(wvf, upper_band, range_threshold, fear_extreme, "fear evaluated");

        Ok(FearReport {
            wvf,
            upper_band,
            range_threshold,
            fear_extreme,
        })
    }
}
