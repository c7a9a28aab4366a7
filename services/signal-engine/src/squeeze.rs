//! Volatility squeeze: Bollinger Bands nested inside the Keltner Channel

use crate::config::SqueezeConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::indicators::{self, Bands};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqueezeState {
    /// Bollinger strictly inside Keltner
    On,
    /// Squeeze on the previous bar, released on this one
    Fired,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqueezeReport {
    pub state: SqueezeState,
    /// Consecutive squeeze bars ending at the last bar, or at the bar before a fire
    pub squeeze_bars: usize,
    pub bollinger: Bands,
    pub keltner: Bands,
    /// Close vs the basis on a fire; neutral otherwise
    pub fire_direction: Direction,
}

impl SqueezeReport {
    pub fn fired(&self) -> bool {
        self.state == SqueezeState::Fired
    }

    /// A fire is a breakout-imminent read in its direction
    pub fn score(&self) -> f64 {
        if self.fired() {
            self.fire_direction.sign() * 100.0
        } else {
            0.0
        }
    }
}

pub struct SqueezeDetector<'a> {
    config: &'a SqueezeConfig,
}

impl<'a> SqueezeDetector<'a> {
    pub fn new(config: &'a SqueezeConfig) -> Self {
        Self { config }
    }

    fn warmup(&self) -> usize {
        self.config.period.max(self.config.atr_period)
    }

    /// Per-bar squeeze flags from the first fully-warmed bar on, plus the
    /// bands at the last bar. One pass over each indicator series.
    fn flags(&self, bars: &[PriceBar]) -> Option<(Vec<bool>, Bands, Bands)> {
        let cfg = self.config;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let bollinger = indicators::bollinger_series(&closes, cfg.period, cfg.bb_mult);
        let keltner = indicators::keltner_series(bars, cfg.period, cfg.atr_period, cfg.kc_mult);

        let len = bollinger.len().min(keltner.len());
        let bollinger = &bollinger[bollinger.len() - len..];
        let keltner = &keltner[keltner.len() - len..];
        let flags = bollinger
            .iter()
            .zip(keltner)
            .map(|(bb, kc)| bb.is_inside(kc))
            .collect();
        Some((flags, *bollinger.last()?, *keltner.last()?))
    }
}

/// Consecutive `true` flags ending at `end`
fn run_length(flags: &[bool], end: usize) -> usize {
    flags[..=end].iter().rev().take_while(|on| **on).count()
}

impl<'a> Component for SqueezeDetector<'a> {
    type Output = SqueezeReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Squeeze
    }

    fn required_bars(&self) -> usize {
        self.warmup() + 1
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<SqueezeReport> {
        let bars = ctx.bars;
        let insufficient =
            || EngineError::insufficient(self.kind().as_str(), self.required_bars(), bars.len());
        let (flags, bollinger, keltner) = self.flags(bars).ok_or_else(insufficient)?;
        if flags.len() < 2 {
            return Err(insufficient());
        }

        let last = flags.len() - 1;
        let on_now = flags[last];
        let on_before = flags[last - 1];

        let (state, squeeze_bars, fire_direction) = if on_now {
            (SqueezeState::On, run_length(&flags, last), Direction::Neutral)
        } else if on_before {
            let direction = Direction::from_score(bars[bars.len() - 1].close - bollinger.middle);
            (SqueezeState::Fired, run_length(&flags, last - 1), direction)
        } else {
            (SqueezeState::Neutral, 0, Direction::Neutral)
        };

        debug!(state = ?state, squeeze_bars, "squeeze evaluated");

        Ok(SqueezeReport {
            state,
            squeeze_bars,
            bollinger,
            keltner,
            fire_direction,
        })
    }
}
