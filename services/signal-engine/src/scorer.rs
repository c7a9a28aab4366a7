//! Composite scorer and action classifier
//!
//! Blends whatever component results are available into one bounded score and
//! maps it onto an action, a confidence tier and a position size. Two scales:
//! a weighted blend on ±100 and a 0..12 point tally.

use crate::config::{ActionBands, ScoreScale, ScoringConfig};
use crate::fear::FearReport;
use crate::gaps::GapReport;
use crate::macro_regime::CrossAssetReport;
use crate::magnet::MagnetReport;
use crate::orderflow::OrderFlowSummary;
use crate::patterns::PatternReport;
use crate::squeeze::SqueezeReport;
use crate::trend::TrendReport;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
    /// Trend gate closed and the score too weak to override it
    Prohibited,
}

impl Action {
    pub fn direction(&self) -> Direction {
        match self {
            Action::StrongBuy | Action::Buy => Direction::Bullish,
            Action::Sell | Action::StrongSell => Direction::Bearish,
            Action::Hold | Action::Prohibited => Direction::Neutral,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Action::Hold | Action::Prohibited)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Med,
    High,
    Max,
}

/// One component's part in the composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentContribution {
    pub name: String,
    /// Sub-score (weighted scale) or signed points (points scale)
    pub value: f64,
    /// Amount added to the composite
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub as_of: DateTime<Utc>,
    pub scale: ScoreScale,
    /// ±100 on the weighted scale, 0..12 on the points scale
    pub composite_score: f64,
    pub direction: Direction,
    pub action: Action,
    pub confidence: Confidence,
    pub size_percent: u8,
    pub components: Vec<ComponentContribution>,
    /// Trend prohibition gate was active
    pub prohibited: bool,
    pub reasons: Vec<String>,
}

impl CompositeResult {
    /// Score magnitude used for band and alignment checks
    pub fn strength(&self) -> f64 {
        self.composite_score.abs()
    }
}

/// Component results available to the scorer; `None` means skipped or disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreInputs<'a> {
    pub order_flow: Option<&'a OrderFlowSummary>,
    pub gaps: Option<&'a GapReport>,
    pub patterns: Option<&'a PatternReport>,
    pub squeeze: Option<&'a SqueezeReport>,
    pub fear: Option<&'a FearReport>,
    pub trend: Option<&'a TrendReport>,
    pub cross_asset: Option<&'a CrossAssetReport>,
    pub magnet: Option<&'a MagnetReport>,
}

/// Step-function classification; never interpolates the size
pub fn classify(
    signed_score: f64,
    direction: Direction,
    bands: &ActionBands,
    prohibited: bool,
    prohibition_ceiling: f64,
) -> (Action, Confidence, u8) {
    let magnitude = signed_score.abs();
    if prohibited && magnitude < prohibition_ceiling {
        return (Action::Prohibited, Confidence::Low, 0);
    }

    let bullish = match direction {
        Direction::Bullish => true,
        Direction::Bearish => false,
        Direction::Neutral => return (Action::Hold, Confidence::Low, 0),
    };

    if magnitude >= bands.strong {
        let action = if bullish { Action::StrongBuy } else { Action::StrongSell };
        (action, Confidence::Max, 100)
    } else if magnitude >= bands.high {
        (if bullish { Action::Buy } else { Action::Sell }, Confidence::High, 75)
    } else if magnitude >= bands.medium {
        (if bullish { Action::Buy } else { Action::Sell }, Confidence::Med, 50)
    } else {
        (Action::Hold, Confidence::Low, 0)
    }
}

pub struct CompositeScorer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> CompositeScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        as_of: DateTime<Utc>,
        inputs: &ScoreInputs<'_>,
    ) -> CompositeResult {
        let prohibited = inputs.trend.map(|t| t.prohibition_active).unwrap_or(false);

        let (composite_score, direction, components, bands, ceiling) = match self.config.scale {
            ScoreScale::Weighted => {
                let (score, components) = self.weighted(inputs);
                (
                    score,
                    Direction::from_score(score),
                    components,
                    &self.config.weighted_bands,
                    self.config.prohibition_ceiling_weighted,
                )
            }
            ScoreScale::Points => {
                let (score, direction, components) = self.points(inputs);
                (
                    score,
                    direction,
                    components,
                    &self.config.points_bands,
                    self.config.prohibition_ceiling_points,
                )
            }
        };

        let (action, confidence, size_percent) =
            classify(composite_score, direction, bands, prohibited, ceiling);

        CompositeResult {
            symbol: symbol.to_string(),
            timeframe,
            as_of,
            scale: self.config.scale,
            composite_score,
            direction: action.direction(),
            action,
            confidence,
            size_percent,
            components,
            prohibited,
            reasons: reasons(inputs),
        }
    }

    /// Missing components contribute zero; weights are not renormalised
    fn weighted(&self, inputs: &ScoreInputs<'_>) -> (f64, Vec<ComponentContribution>) {
        let w = &self.config.weights;
        let candidates = [
            ("trend", w.trend, inputs.trend.map(|t| t.core)),
            (
                "cross_asset",
                w.cross_asset,
                inputs.cross_asset.map(|c| c.score(self.config.macro_score_scale)),
            ),
            ("magnet_gravity", w.magnet_gravity, inputs.magnet.map(|m| m.gravity.score())),
            ("strike_sentiment", w.strike_sentiment, inputs.magnet.map(|m| m.strike_sentiment)),
            ("gaps", w.gaps, inputs.gaps.map(|g| g.score())),
            ("patterns", w.patterns, inputs.patterns.map(|p| p.score())),
            ("squeeze", w.squeeze, inputs.squeeze.map(|s| s.score())),
            ("fear", w.fear, inputs.fear.map(|f| f.score())),
        ];

        let components: Vec<ComponentContribution> = candidates
            .iter()
            .filter_map(|(name, weight, value)| {
                value.map(|v| ComponentContribution {
                    name: name.to_string(),
                    value: v,
                    contribution: weight * v,
                })
            })
            .collect();

        let total: f64 = components.iter().map(|c| c.contribution).sum();
        (total.clamp(-100.0, 100.0), components)
    }

    /// Four groups of 0..3 points; only groups agreeing with the dominant
    /// direction count toward the score
    fn points(&self, inputs: &ScoreInputs<'_>) -> (f64, Direction, Vec<ComponentContribution>) {
        let groups = [
            ("trend", self.trend_points(inputs)),
            ("liquidity", liquidity_points(inputs)),
            ("pattern", self.pattern_points(inputs)),
            ("volatility", volatility_points(inputs)),
        ];

        let signed_sum: f64 = groups.iter().map(|(_, p)| p).sum();
        let dominant = Direction::from_score(signed_sum);

        let components = groups
            .iter()
            .map(|(name, points)| ComponentContribution {
                name: name.to_string(),
                value: *points,
                contribution: if !dominant.is_neutral() && Direction::from_score(*points) == dominant {
                    points.abs()
                } else {
                    0.0
                },
            })
            .collect::<Vec<_>>();

        let score = components.iter().map(|c| c.contribution).sum();
        (score, dominant, components)
    }

    fn trend_points(&self, inputs: &ScoreInputs<'_>) -> f64 {
        let Some(trend) = inputs.trend else {
            return 0.0;
        };
        let [three, two, one] = self.config.trend_point_bands;
        let magnitude = trend.core.abs();
        let points = if magnitude >= three && magnitude > 0.0 {
            3.0
        } else if magnitude >= two && magnitude > 0.0 {
            2.0
        } else if magnitude >= one && magnitude > 0.0 {
            1.0
        } else {
            0.0
        };
        points * trend.direction.sign()
    }

    fn pattern_points(&self, inputs: &ScoreInputs<'_>) -> f64 {
        let Some(pattern) = inputs.patterns.and_then(|p| p.latest()) else {
            return 0.0;
        };
        let signed = pattern.signed_strength();
        if signed == 0.0 {
            return 0.0;
        }
        let [three, two] = self.config.pattern_point_bands;
        let points = if pattern.strength >= three {
            3.0
        } else if pattern.strength >= two {
            2.0
        } else {
            1.0
        };
        points * signed.signum()
    }
}

fn liquidity_points(inputs: &ScoreInputs<'_>) -> f64 {
    let Some(gaps) = inputs.gaps else {
        return 0.0;
    };
    if let Some(kind) = gaps.price_in_zone {
        return 3.0 * kind.direction().sign();
    }
    let bias = gaps.net_bias();
    if bias.is_neutral() {
        return 0.0;
    }
    let flow_agrees = inputs.order_flow.map(|f| f.bias == bias).unwrap_or(false);
    let points = if flow_agrees { 2.0 } else { 1.0 };
    points * bias.sign()
}

fn volatility_points(inputs: &ScoreInputs<'_>) -> f64 {
    let fire = inputs
        .squeeze
        .filter(|s| s.fired())
        .map(|s| 2.0 * s.fire_direction.sign())
        .unwrap_or(0.0);
    let fear = inputs
        .fear
        .filter(|f| f.fear_extreme)
        .map(|_| 1.0)
        .unwrap_or(0.0);
    (fire + fear).clamp(-3.0, 3.0)
}

fn reasons(inputs: &ScoreInputs<'_>) -> Vec<String> {
    let mut reasons = Vec::new();
    if let Some(trend) = inputs.trend {
        reasons.extend(trend.prohibition_reasons.iter().cloned());
        if trend.delta_confirms {
            reasons.push("order flow confirms trend".to_string());
        }
    }
    if let Some(gaps) = inputs.gaps {
        reasons.extend(gaps.signals.iter().cloned());
    }
    if let Some(pattern) = inputs.patterns.and_then(|p| p.latest()) {
        reasons.push(format!(
            "{:?} pattern, {:?}, strength {:.0}",
            pattern.kind, pattern.signal, pattern.strength
        ));
    }
    if let Some(squeeze) = inputs.squeeze.filter(|s| s.fired()) {
        reasons.push(format!(
            "squeeze fired {:?} after {} bars",
            squeeze.fire_direction, squeeze.squeeze_bars
        ));
    }
    if inputs.fear.map(|f| f.fear_extreme).unwrap_or(false) {
        reasons.push("fear extreme".to_string());
    }
    if let Some(regime) = inputs.cross_asset {
        reasons.push(format!(
            "macro regime {:?}{}",
            regime.state,
            if regime.strong { " (strong)" } else { "" }
        ));
    }
    if let Some(magnet) = inputs.magnet {
        reasons.push(format!("magnet {:.2}, gravity {:?}", magnet.magnet_price, magnet.gravity));
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendConfig;
    use crate::gaps::GapKind;
    use crate::indicators::MacdOutput;
    use crate::magnet::Gravity;
    use crate::trend::{self, TrendMeasurements};
    use chrono::TimeZone;

    fn trend_report(adx: f64, close: f64) -> TrendReport {
        let m = TrendMeasurements {
            close,
            ma_fast: 108.0,
            ma_mid: 105.0,
            ma_slow: 102.0,
            ma_long: 95.0,
            rsi: 62.0,
            macd: MacdOutput {
                line: 1.2,
                signal: 0.8,
                histogram: 0.4,
            },
            vwap: 107.0,
            trend_ma: 102.0,
            adx,
            atr_ratio: 1.0,
            volume_ratio: 1.0,
        };
        trend::score(&m, &TrendConfig::default())
    }

    fn magnet_report(gravity: Gravity, strike_sentiment: f64) -> MagnetReport {
        MagnetReport {
            spot: 100.0,
            magnet_price: 100.0,
            max_pain: 100.0,
            zones: Vec::new(),
            gravity,
            gravity_pct: 0.0,
            strike_sentiment,
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_size_is_a_step_function() {
        let bands = ActionBands::weighted();
        let mut seen = std::collections::BTreeSet::new();
        for tenth in -1000..=1000 {
            let score = tenth as f64 / 10.0;
            let (_, _, size) = classify(score, Direction::from_score(score), &bands, false, 40.0);
            seen.insert(size);
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![0, 50, 75, 100]);
    }

    #[test]
    fn test_band_edges() {
        let bands = ActionBands::weighted();
        let c = |s: f64| classify(s, Direction::from_score(s), &bands, false, 40.0);
        assert_eq!(c(60.0), (Action::StrongBuy, Confidence::Max, 100));
        assert_eq!(c(45.0), (Action::Buy, Confidence::High, 75));
        assert_eq!(c(20.0), (Action::Buy, Confidence::Med, 50));
        assert_eq!(c(19.9), (Action::Hold, Confidence::Low, 0));
        assert_eq!(c(-41.0), (Action::Sell, Confidence::High, 75));
        assert_eq!(c(-75.0), (Action::StrongSell, Confidence::Max, 100));
    }

    #[test]
    fn test_prohibition_beats_hold_but_not_strong_scores() {
        let bands = ActionBands::weighted();
        assert_eq!(
            classify(10.0, Direction::Bullish, &bands, true, 40.0),
            (Action::Prohibited, Confidence::Low, 0)
        );
        assert_eq!(
            classify(0.0, Direction::Neutral, &bands, true, 40.0).0,
            Action::Prohibited
        );
        assert_eq!(classify(65.0, Direction::Bullish, &bands, true, 40.0).0, Action::StrongBuy);
    }

    #[test]
    fn test_weighted_four_factor_blend() {
        let config = ScoringConfig::default();
        let trend = trend_report(50.0, 110.0);
        let magnet = magnet_report(Gravity::WeakUp, 40.0);
        let inputs = ScoreInputs {
            trend: Some(&trend),
            magnet: Some(&magnet),
            ..ScoreInputs::default()
        };

        let result = CompositeScorer::new(&config).score("AAPL", TimeFrame::Day1, as_of(), &inputs);
        // trend core 100 · 0.30 + gravity 50 · 0.25 + sentiment 40 · 0.20, cross-asset missing
        assert!((result.composite_score - 50.5).abs() < 1e-9);
        assert_eq!(result.action, Action::Buy);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.size_percent, 75);
        assert_eq!(result.direction, Direction::Bullish);
        assert_eq!(result.components.len(), 3);
        assert!(!result.prohibited);
    }

    #[test]
    fn test_weighted_prohibited() {
        let config = ScoringConfig::default();
        let trend = trend_report(12.0, 110.0);
        let magnet = magnet_report(Gravity::WeakUp, 20.0);
        let inputs = ScoreInputs {
            trend: Some(&trend),
            magnet: Some(&magnet),
            ..ScoreInputs::default()
        };

        let result = CompositeScorer::new(&config).score("AAPL", TimeFrame::Day1, as_of(), &inputs);
        assert!(result.prohibited);
        assert_eq!(result.action, Action::Prohibited);
        assert_eq!(result.size_percent, 0);
        assert_eq!(result.direction, Direction::Neutral);
        assert!(result.reasons.iter().any(|r| r.starts_with("ADX")));
    }

    #[test]
    fn test_points_scale_counts_agreeing_groups() {
        let config = ScoringConfig {
            scale: ScoreScale::Points,
            ..ScoringConfig::default()
        };
        let trend = trend_report(50.0, 110.0);
        let gaps = GapReport {
            zones: Vec::new(),
            active_count: 1,
            bullish_count: 1,
            bearish_count: 0,
            liquidity_count: 1,
            price_in_zone: Some(GapKind::Bullish),
            signals: vec!["IN_BULLISH_LIQUIDITY_ZONE".to_string()],
        };
        let fear = FearReport {
            wvf: 12.0,
            upper_band: 8.0,
            range_threshold: 10.0,
            fear_extreme: true,
        };
        let inputs = ScoreInputs {
            trend: Some(&trend),
            gaps: Some(&gaps),
            fear: Some(&fear),
            ..ScoreInputs::default()
        };

        let result = CompositeScorer::new(&config).score("MSFT", TimeFrame::Hour1, as_of(), &inputs);
        // trend 3 + liquidity 3 + volatility 1
        assert_eq!(result.composite_score, 7.0);
        assert_eq!(result.action, Action::Buy);
        assert_eq!(result.confidence, Confidence::Med);
        assert_eq!(result.size_percent, 50);
        assert_eq!(result.scale, ScoreScale::Points);
        assert!(result.composite_score <= 12.0);
    }
}
