//! Pivot and dip-recovery pattern detection
//!
//! Pivots are strict local extremes over `pivot_lookback` bars on each side.
//! Every pivot high is paired with the first pivot low after it that makes a
//! deep enough dip, and the recovery after that low decides the pattern kind.

use crate::config::PatternConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::indicators;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Accumulation,
    /// Part of the reporting vocabulary; the dip-recovery scan never produces it
    Distribution,
    Consolidation,
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeProfile {
    Increasing,
    Decreasing,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSignal {
    BullishReversal,
    BearishContinuation,
    Consolidation,
    BreakoutPending,
}

/// Where the latest close sits relative to the most recent pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    Breakout,
    Dip,
    Consolidation,
    Recovery,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DipRecoveryPattern {
    pub kind: PatternKind,
    pub start_index: usize,
    pub end_index: usize,
    pub high_price: f64,
    pub low_price: f64,
    pub recovery_high: f64,
    pub dip_depth_pct: f64,
    pub recovery_pct: f64,
    pub volume_profile: VolumeProfile,
    pub signal: PatternSignal,
    pub strength: f64,
    pub resistance_levels: Vec<f64>,
    pub support_levels: Vec<f64>,
}

impl DipRecoveryPattern {
    /// Signed contribution: bullish reversals count up, bearish continuations down
    pub fn signed_strength(&self) -> f64 {
        match self.signal {
            PatternSignal::BullishReversal => self.strength,
            PatternSignal::BearishContinuation => -self.strength,
            _ => 0.0,
        }
    }
}

/// Indices of pivot highs and pivot lows, ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pivots {
    pub highs: Vec<usize>,
    pub lows: Vec<usize>,
}

/// Strict local extremes; a tie anywhere in the window disqualifies the bar
pub fn find_pivots(bars: &[PriceBar], lookback: usize) -> Pivots {
    let mut pivots = Pivots::default();
    if lookback == 0 || bars.len() < 2 * lookback + 1 {
        return pivots;
    }

    for i in lookback..bars.len() - lookback {
        let window = (i - lookback)..=(i + lookback);
        let is_high = window.clone().filter(|&j| j != i).all(|j| bars[j].high < bars[i].high);
        let is_low = window.filter(|&j| j != i).all(|j| bars[j].low > bars[i].low);
        if is_high {
            pivots.highs.push(i);
        }
        if is_low {
            pivots.lows.push(i);
        }
    }
    pivots
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    /// Most recent first
    pub patterns: Vec<DipRecoveryPattern>,
    /// Nearest pivot highs above the latest close, closest first
    pub resistance_levels: Vec<f64>,
    /// Nearest pivot lows below the latest close, closest first
    pub support_levels: Vec<f64>,
    pub phase: MarketPhase,
}

impl PatternReport {
    pub fn latest(&self) -> Option<&DipRecoveryPattern> {
        self.patterns.first()
    }

    /// Sub-score on [-100, 100] from the most recent pattern
    pub fn score(&self) -> f64 {
        self.latest().map(|p| p.signed_strength()).unwrap_or(0.0)
    }
}

pub struct PatternDetector<'a> {
    config: &'a PatternConfig,
}

impl<'a> PatternDetector<'a> {
    pub fn new(config: &'a PatternConfig) -> Self {
        Self { config }
    }

    fn pattern_at(
        &self,
        bars: &[PriceBar],
        pivots: &Pivots,
        high_idx: usize,
        low_idx: usize,
    ) -> DipRecoveryPattern {
        let cfg = self.config;
        let high = bars[high_idx].high;
        let low = bars[low_idx].low;

        // Recovery high: first occurrence of the max high after the low
        let scan_end = (low_idx + cfg.lookback_period).min(bars.len() - 1);
        let mut recovery_idx = low_idx;
        let mut recovery_high = f64::MIN;
        for (j, bar) in bars.iter().enumerate().take(scan_end + 1).skip(low_idx + 1) {
            if bar.high > recovery_high {
                recovery_high = bar.high;
                recovery_idx = j;
            }
        }
        if recovery_idx == low_idx {
            recovery_high = low;
        }

        let dip_depth_pct = (high - low) / high * 100.0;
        let recovery_pct = (recovery_high - low) / low * 100.0;

        let volume_profile = volume_profile(
            &bars[high_idx..=low_idx],
            &bars[(low_idx + 1).min(recovery_idx)..=recovery_idx],
            cfg.volume_trend_tolerance,
        );

        let (kind, signal) = if recovery_pct >= cfg.recovery_threshold_pct
            && recovery_high >= cfg.reversal_retrace * high
        {
            let signal = if volume_profile == VolumeProfile::Increasing {
                PatternSignal::BullishReversal
            } else {
                PatternSignal::BreakoutPending
            };
            (PatternKind::Reversal, signal)
        } else if recovery_pct >= cfg.recovery_threshold_pct {
            (PatternKind::Accumulation, PatternSignal::BullishReversal)
        } else if recovery_pct > cfg.consolidation_recovery_ratio * dip_depth_pct {
            (PatternKind::Consolidation, PatternSignal::BreakoutPending)
        } else {
            (PatternKind::Consolidation, PatternSignal::BearishContinuation)
        };

        let mut strength: f64 = 50.0;
        if volume_profile == VolumeProfile::Increasing {
            strength += 15.0;
        }
        if recovery_high - low >= 0.5 * (high - low) {
            strength += 15.0;
        }
        let dip_closes: Vec<f64> = bars[high_idx..=low_idx].iter().map(|b| b.close).collect();
        if let Some(mean_close) = indicators::mean(&dip_closes) {
            if high > low && (high - mean_close) / (high - low) > cfg.v_shape_ratio {
                strength += 10.0;
            }
        }
        if dip_depth_pct >= cfg.deep_dip_pct {
            strength += 10.0;
        }

        let end_index = recovery_idx.max(low_idx);
        let window = high_idx..=end_index;
        let mut resistance_levels: Vec<f64> = pivots
            .highs
            .iter()
            .filter(|&&i| window.contains(&i))
            .map(|&i| bars[i].high)
            .chain([high, recovery_high])
            .collect();
        let mut support_levels: Vec<f64> = pivots
            .lows
            .iter()
            .filter(|&&i| window.contains(&i))
            .map(|&i| bars[i].low)
            .chain([low])
            .collect();
        sort_dedup(&mut resistance_levels);
        sort_dedup(&mut support_levels);

        DipRecoveryPattern {
            kind,
            start_index: high_idx,
            end_index,
            high_price: high,
            low_price: low,
            recovery_high,
            dip_depth_pct,
            recovery_pct,
            volume_profile,
            signal,
            strength: strength.min(100.0),
            resistance_levels,
            support_levels,
        }
    }

    fn phase(&self, bars: &[PriceBar], latest: Option<&DipRecoveryPattern>) -> MarketPhase {
        let cfg = self.config;
        let close = bars[bars.len() - 1].close;
        let band = cfg.phase_band_pct / 100.0;

        let phase = match latest {
            None => MarketPhase::None,
            Some(p) if close >= p.high_price * (1.0 + band) => MarketPhase::Breakout,
            Some(p) if close <= p.low_price * (1.0 + band) => MarketPhase::Dip,
            Some(p) if close >= p.high_price * (1.0 - band) => MarketPhase::Consolidation,
            Some(_) => MarketPhase::Recovery,
        };

        let start = bars.len().saturating_sub(cfg.rolling_high_period);
        let highs: Vec<f64> = bars[start..].iter().map(|b| b.high).collect();
        match indicators::highest(&highs) {
            Some(rolling_high) if close <= rolling_high * (1.0 - cfg.rolling_dip_pct / 100.0) => {
                MarketPhase::Dip
            }
            _ => phase,
        }
    }
}

impl<'a> Component for PatternDetector<'a> {
    type Output = PatternReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Patterns
    }

    fn required_bars(&self) -> usize {
        2 * self.config.pivot_lookback + 1
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<PatternReport> {
        let cfg = self.config;
        let bars = ctx.bars;
        let pivots = find_pivots(bars, cfg.pivot_lookback);

        let mut patterns = Vec::new();
        for &high_idx in &pivots.highs {
            let high = bars[high_idx].high;
            // First qualifying low wins
            let low_idx = pivots.lows.iter().copied().find(|&l| {
                l > high_idx
                    && l <= high_idx + cfg.lookback_period
                    && (high - bars[l].low) / high * 100.0 >= cfg.dip_threshold_pct
            });
            if let Some(low_idx) = low_idx {
                patterns.push(self.pattern_at(bars, &pivots, high_idx, low_idx));
            }
        }

        patterns.sort_by(|a, b| b.start_index.cmp(&a.start_index));
        patterns.truncate(cfg.max_patterns);

        let close = bars[bars.len() - 1].close;
        let mut resistance_levels: Vec<f64> = pivots
            .highs
            .iter()
            .map(|&i| bars[i].high)
            .filter(|&p| p > close)
            .collect();
        sort_dedup(&mut resistance_levels);
        resistance_levels.truncate(cfg.max_levels);

        let mut support_levels: Vec<f64> = pivots
            .lows
            .iter()
            .map(|&i| bars[i].low)
            .filter(|&p| p < close)
            .collect();
        sort_dedup(&mut support_levels);
        support_levels.reverse();
        support_levels.truncate(cfg.max_levels);

        let phase = self.phase(bars, patterns.first());

        debug!(
            pivot_highs = pivots.highs.len(),
            pivot_lows = pivots.lows.len(),
            patterns = patterns.len(),
            phase = ?phase,
            "pattern scan complete"
        );

        Ok(PatternReport {
            patterns,
            resistance_levels,
            support_levels,
            phase,
        })
    }
}

fn volume_profile(dip_leg: &[PriceBar], recovery_leg: &[PriceBar], tolerance: f64) -> VolumeProfile {
    let dip: Vec<f64> = dip_leg.iter().map(|b| b.volume).collect();
    let recovery: Vec<f64> = recovery_leg.iter().map(|b| b.volume).collect();
    match (indicators::mean(&dip), indicators::mean(&recovery)) {
        (Some(d), Some(r)) if d > 0.0 => {
            let ratio = r / d;
            if ratio > 1.0 + tolerance {
                VolumeProfile::Increasing
            } else if ratio < 1.0 - tolerance {
                VolumeProfile::Decreasing
            } else {
                VolumeProfile::Neutral
            }
        }
        _ => VolumeProfile::Neutral,
    }
}

fn sort_dedup(levels: &mut Vec<f64>) {
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
}
