//! Fair value gap (FVG) detection
//!
//! A three-bar scan records every gap once, as an immutable creation record in
//! an arena. Fill state lives in a separate index that only ever moves from
//! unfilled to filled. Reports are built from a filtered view of the arena, so
//! aging and the unfilled-only mode never delete anything.

use crate::config::GapConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::orderflow::FlowTape;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    Bullish,
    Bearish,
}

impl GapKind {
    pub fn direction(&self) -> Direction {
        match self {
            GapKind::Bullish => Direction::Bullish,
            GapKind::Bearish => Direction::Bearish,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            GapKind::Bullish => "BULLISH",
            GapKind::Bearish => "BEARISH",
        }
    }
}

/// Creation record, never modified after the scan
#[derive(Debug, Clone, PartialEq)]
struct GapRecord {
    kind: GapKind,
    top: f64,
    bottom: f64,
    created_at_index: usize,
    delta_at_creation: f64,
    is_liquidity_zone: bool,
}

/// All gaps found in one bar series plus their fill index
#[derive(Debug, Clone, Default)]
pub struct GapArena {
    records: Vec<GapRecord>,
    fills: Vec<Option<usize>>,
}

impl GapArena {
    /// Scan `bars` for three-bar gaps and track fills through the end of the series
    pub fn scan(bars: &[PriceBar], tape: &FlowTape, config: &GapConfig) -> Self {
        let mut arena = Self::default();
        if bars.len() < 3 {
            return arena;
        }

        for i in 2..bars.len() {
            let first = &bars[i - 2];
            let middle = &bars[i - 1];
            let current = &bars[i];

            let candidate = if current.low > first.high
                && (current.low - first.high) / first.high * 100.0 >= config.threshold_pct
                && (!config.require_displacement || middle.high > first.high)
            {
                Some((GapKind::Bullish, current.low, first.high))
            } else if first.low > current.high
                && (first.low - current.high) / first.low * 100.0 >= config.threshold_pct
                && (!config.require_displacement || middle.low < first.low)
            {
                Some((GapKind::Bearish, first.low, current.high))
            } else {
                None
            };

            if let Some((kind, top, bottom)) = candidate {
                let delta = tape.get(i).map(|s| s.delta).unwrap_or(0.0);

                arena.records.push(GapRecord {
                    kind,
                    top,
                    bottom,
                    created_at_index: i,
                    delta_at_creation: delta,
                    is_liquidity_zone: is_liquidity(bars, i, delta, config),
                });
            }
        }

        arena.fills = arena
            .records
            .iter()
            .map(|record| {
                bars.iter()
                    .enumerate()
                    .skip(record.created_at_index + 1)
                    .find(|(_, bar)| match record.kind {
                        GapKind::Bullish => bar.low <= record.top,
                        GapKind::Bearish => bar.high >= record.bottom,
                    })
                    .map(|(j, _)| j)
            })
            .collect();

        arena
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Zones visible at `last_index`, most recent first
    pub fn view(&self, last_index: usize, config: &GapConfig) -> Vec<GapZone> {
        let mut zones = self.within_age(last_index, config.max_age);
        if config.unfilled_only {
            zones.retain(|z| !z.is_filled);
        }
        zones
    }

    /// Every zone created by `last_index` and not older than `max_age`,
    /// filled or not, most recent first
    fn within_age(&self, last_index: usize, max_age: usize) -> Vec<GapZone> {
        let mut zones: Vec<GapZone> = self
            .records
            .iter()
            .zip(&self.fills)
            .enumerate()
            .filter_map(|(id, (record, fill))| {
                let filled_at_index = fill.filter(|j| *j <= last_index);
                let age = last_index.saturating_sub(record.created_at_index);
                if record.created_at_index > last_index || age > max_age {
                    return None;
                }
                Some(GapZone {
                    id,
                    kind: record.kind,
                    top: record.top,
                    bottom: record.bottom,
                    created_at_index: record.created_at_index,
                    filled_at_index,
                    is_filled: filled_at_index.is_some(),
                    delta_at_creation: record.delta_at_creation,
                    is_liquidity_zone: record.is_liquidity_zone,
                    age,
                })
            })
            .collect();

        zones.sort_by(|a, b| b.created_at_index.cmp(&a.created_at_index));
        zones
    }
}

/// `|delta| ≥ delta_threshold × liquidity_multiplier`, the threshold optionally
/// scaled by the average volume of the `volume_lookback` bars ending at `index`
fn is_liquidity(bars: &[PriceBar], index: usize, delta: f64, config: &GapConfig) -> bool {
    let mut threshold = config.delta_threshold * config.liquidity_multiplier;
    if config.relative_to_volume {
        let start = (index + 1).saturating_sub(config.volume_lookback);
        let window = &bars[start..=index];
        let avg_volume = window.iter().map(|b| b.volume).sum::<f64>() / window.len() as f64;
        if avg_volume <= 0.0 {
            return false;
        }
        threshold *= avg_volume;
    }
    delta.abs() >= threshold
}

/// A gap as reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapZone {
    pub id: usize,
    pub kind: GapKind,
    pub top: f64,
    pub bottom: f64,
    pub created_at_index: usize,
    pub filled_at_index: Option<usize>,
    pub is_filled: bool,
    pub delta_at_creation: f64,
    pub is_liquidity_zone: bool,
    pub age: usize,
}

impl GapZone {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub zones: Vec<GapZone>,
    pub active_count: usize,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub liquidity_count: usize,
    /// Kind of the liquidity zone the latest close sits in, when flow agrees
    pub price_in_zone: Option<GapKind>,
    pub signals: Vec<String>,
}

impl GapReport {
    /// Direction of the unfilled zones taken together
    pub fn net_bias(&self) -> Direction {
        Direction::from_score(self.bullish_count as f64 - self.bearish_count as f64)
    }

    /// Sub-score on [-100, 100]; sitting in a confirmed liquidity zone is decisive
    pub fn score(&self) -> f64 {
        if let Some(kind) = self.price_in_zone {
            return kind.direction().sign() * 100.0;
        }
        let total = self.bullish_count + self.bearish_count;
        if total == 0 {
            return 0.0;
        }
        (self.bullish_count as f64 - self.bearish_count as f64) / total as f64 * 50.0
    }
}

pub struct GapDetector<'a> {
    config: &'a GapConfig,
}

impl<'a> GapDetector<'a> {
    pub fn new(config: &'a GapConfig) -> Self {
        Self { config }
    }
}

impl<'a> Component for GapDetector<'a> {
    type Output = GapReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Gaps
    }

    fn required_bars(&self) -> usize {
        3
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<GapReport> {
        let bars = ctx.bars;
        let last_index = bars.len() - 1;
        let last = &bars[last_index];

        let arena = GapArena::scan(bars, ctx.tape, self.config);
        let candidates = arena.within_age(last_index, self.config.max_age);

        let active: Vec<&GapZone> = candidates.iter().filter(|z| !z.is_filled).collect();
        let active_count = active.len();
        let bullish_count = active.iter().filter(|z| z.kind == GapKind::Bullish).count();
        let bearish_count = active_count - bullish_count;
        let liquidity_count = active.iter().filter(|z| z.is_liquidity_zone).count();

        // The last bar entering a zone is what fills it, so "inside an unfilled
        // zone" is judged against the state before that bar, and before
        // `unfilled_only` hides it from the reported list.
        let flow = ctx.tape.get(last_index).map(|s| s.direction()).unwrap_or_default();
        let price_in_zone = candidates
            .iter()
            .filter(|z| z.is_liquidity_zone && z.created_at_index < last_index)
            .filter(|z| z.filled_at_index.map_or(true, |j| j == last_index))
            .find(|z| z.contains(last.close) && z.kind.direction() == flow)
            .map(|z| z.kind);

        let mut zones = candidates;
        if self.config.unfilled_only {
            zones.retain(|z| !z.is_filled);
        }

        let mut signals = Vec::new();
        if let Some(kind) = price_in_zone {
            signals.push(format!("IN_{}_LIQUIDITY_ZONE", kind.label()));
        }
        for (kind, count) in [(GapKind::Bullish, bullish_count), (GapKind::Bearish, bearish_count)] {
            if count >= self.config.cluster_count {
                signals.push(format!("{}_FVG_CLUSTER", kind.label()));
            }
        }
        if let Some(zone) = zones.first().filter(|z| z.created_at_index == last_index) {
            signals.push(format!("NEW_{}_FVG", zone.kind.label()));
        }

        debug!(
            zones = zones.len(),
            active = active_count,
            liquidity = liquidity_count,
            in_zone = ?price_in_zone,
            "gap scan complete"
        );

        Ok(GapReport {
            active_count,
            bullish_count,
            bearish_count,
            liquidity_count,
            price_in_zone,
            signals,
            zones,
        })
    }
}
