//! Signal engine - single evaluation pipeline for every component
//!
//! One evaluation runs in a fixed order: validate bars, build the flow tape,
//! run gaps and trend (both read the tape), then patterns, squeeze, fear,
//! the cross-asset regime and the options magnet, and finally the scorer.
//! A component that lacks data is skipped and recorded; only structural bar
//! errors, or nothing at all being able to run, fail the evaluation.

use crate::alignment::{check_alignment, AlignmentResult};
use crate::bars::BarSeries;
use crate::config::EngineConfig;
use crate::factors::{self, Component, ComponentContext, SkippedComponent};
use crate::fear::{FearDetector, FearReport};
use crate::gaps::{GapDetector, GapReport};
use crate::macro_regime::{AuxiliarySeries, CrossAssetRegime, CrossAssetReport};
use crate::magnet::{MagnetEngine, MagnetReport, OptionsChain};
use crate::orderflow::{FlowTape, OrderFlowSummary};
use crate::patterns::{PatternDetector, PatternReport};
use crate::scorer::{CompositeResult, CompositeScorer, ScoreInputs};
use crate::squeeze::{SqueezeDetector, SqueezeReport};
use crate::trend::{TrendComposite, TrendReport};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// One symbol/timeframe to evaluate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub bars: Vec<PriceBar>,
    #[serde(default)]
    pub auxiliary: Option<AuxiliarySeries>,
    #[serde(default)]
    pub options_chain: Option<OptionsChain>,
}

impl EvaluationInput {
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
            auxiliary: None,
            options_chain: None,
        }
    }

    pub fn with_auxiliary(mut self, auxiliary: AuxiliarySeries) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }

    pub fn with_options_chain(mut self, chain: OptionsChain) -> Self {
        self.options_chain = Some(chain);
        self
    }
}

/// Composite plus every raw component result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub composite: CompositeResult,
    pub order_flow: OrderFlowSummary,
    pub gaps: Option<GapReport>,
    pub patterns: Option<PatternReport>,
    pub squeeze: Option<SqueezeReport>,
    pub fear: Option<FearReport>,
    pub trend: Option<TrendReport>,
    pub cross_asset: Option<CrossAssetReport>,
    pub magnet: Option<MagnetReport>,
    pub skipped: Vec<SkippedComponent>,
    pub bars_evaluated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframeReport {
    pub short: EngineReport,
    pub long: EngineReport,
    pub alignment: AlignmentResult,
}

/// Stateless evaluator; cheap to clone, safe to share across tasks
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: Arc<EngineConfig>,
}

impl SignalEngine {
    /// Validate the configuration up front
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one bar series
    #[instrument(skip(self, input), fields(symbol = %input.symbol, timeframe = %input.timeframe, bars = input.bars.len()))]
    pub fn evaluate(&self, input: &EvaluationInput) -> Result<EngineReport> {
        let config = &*self.config;
        let series = BarSeries::new(input.bars.clone())?;
        let bars = series.bars();

        let tape = FlowTape::build(bars, &config.order_flow);
        let ctx = ComponentContext {
            bars,
            tape: &tape,
            auxiliary: input.auxiliary.as_ref(),
            options_chain: input.options_chain.as_ref(),
        };

        let gap_detector = GapDetector::new(&config.gaps);
        let trend_composite = TrendComposite::new(&config.trend);
        let pattern_detector = PatternDetector::new(&config.patterns);
        let squeeze_detector = SqueezeDetector::new(&config.squeeze);
        let fear_detector = FearDetector::new(&config.fear);
        let cross_asset_regime = CrossAssetRegime::new(&config.cross_asset);
        let magnet_engine = MagnetEngine::new(&config.magnet);

        let mut skipped = Vec::new();
        let gaps = attempt(config.gaps.enabled, &gap_detector, &ctx, &mut skipped)?;
        let trend = attempt(config.trend.enabled, &trend_composite, &ctx, &mut skipped)?;
        let patterns = attempt(config.patterns.enabled, &pattern_detector, &ctx, &mut skipped)?;
        let squeeze = attempt(config.squeeze.enabled, &squeeze_detector, &ctx, &mut skipped)?;
        let fear = attempt(config.fear.enabled, &fear_detector, &ctx, &mut skipped)?;
        let cross_asset = attempt(config.cross_asset.enabled, &cross_asset_regime, &ctx, &mut skipped)?;
        let magnet = attempt(config.magnet.enabled, &magnet_engine, &ctx, &mut skipped)?;

        let ran = [
            gaps.is_some(),
            trend.is_some(),
            patterns.is_some(),
            squeeze.is_some(),
            fear.is_some(),
            cross_asset.is_some(),
            magnet.is_some(),
        ];
        if !ran.iter().any(|r| *r) {
            // Shortest lookback among the enabled bar-based components
            let required = [
                (config.gaps.enabled, gap_detector.required_bars()),
                (config.trend.enabled, trend_composite.required_bars()),
                (config.patterns.enabled, pattern_detector.required_bars()),
                (config.squeeze.enabled, squeeze_detector.required_bars()),
                (config.fear.enabled, fear_detector.required_bars()),
            ]
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, required)| required)
            .min()
            .unwrap_or(1);
            warn!(skipped = skipped.len(), required, "no component could run");
            return Err(EngineError::insufficient("composite", required, bars.len()));
        }

        let order_flow = tape.summarize(&config.order_flow);
        let inputs = ScoreInputs {
            order_flow: Some(&order_flow),
            gaps: gaps.as_ref(),
            patterns: patterns.as_ref(),
            squeeze: squeeze.as_ref(),
            fear: fear.as_ref(),
            trend: trend.as_ref(),
            cross_asset: cross_asset.as_ref(),
            magnet: magnet.as_ref(),
        };
        let composite = CompositeScorer::new(&config.scoring).score(
            &input.symbol,
            input.timeframe,
            series.last().timestamp,
            &inputs,
        );

        info!(
            score = composite.composite_score,
            action = ?composite.action,
            confidence = ?composite.confidence,
            skipped = skipped.len(),
            "evaluation complete"
        );

        Ok(EngineReport {
            composite,
            order_flow,
            gaps,
            patterns,
            squeeze,
            fear,
            trend,
            cross_asset,
            magnet,
            skipped,
            bars_evaluated: bars.len(),
        })
    }

    /// Evaluate many inputs on the blocking pool, at most
    /// `batch.max_concurrency` at a time. Results come back in input order.
    pub async fn evaluate_batch(&self, inputs: Vec<EvaluationInput>) -> Vec<Result<EngineReport>> {
        let semaphore = Arc::new(Semaphore::new(self.config.batch.max_concurrency));

        let mut futures = Vec::with_capacity(inputs.len());
        for input in inputs {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::TaskFailed(e.to_string()))?;
                tokio::task::spawn_blocking(move || engine.evaluate(&input))
                    .await
                    .map_err(|e| EngineError::TaskFailed(e.to_string()))?
            });
        }

        let results = futures::future::join_all(futures).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(total = results.len(), failed, "batch evaluation complete");
        results
    }

    /// Evaluate a short and a long timeframe and check their alignment
    pub fn evaluate_timeframes(
        &self,
        short: &EvaluationInput,
        long: &EvaluationInput,
    ) -> Result<MultiTimeframeReport> {
        let short = self.evaluate(short)?;
        let long = self.evaluate(long)?;
        let alignment = check_alignment(&short.composite, &long.composite, &self.config.alignment);

        debug!(
            aligned = alignment.aligned,
            strength = alignment.alignment_strength,
            "timeframe alignment checked"
        );

        Ok(MultiTimeframeReport {
            short,
            long,
            alignment,
        })
    }
}

/// Run a component if enabled; degradable failures become a skip record
fn attempt<C: Component>(
    enabled: bool,
    component: &C,
    ctx: &ComponentContext<'_>,
    skipped: &mut Vec<SkippedComponent>,
) -> Result<Option<C::Output>> {
    if !enabled {
        return Ok(None);
    }
    match factors::run(component, ctx) {
        Ok(output) => Ok(Some(output)),
        Err(e) if e.is_degradable() => {
            debug!(component = %component.kind(), error = %e, "component skipped");
            skipped.push(SkippedComponent {
                component: component.kind(),
                reason: e.to_string(),
            });
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(count: usize) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.3).sin() * 3.0 + i as f64 * 0.05;
                PriceBar::new(start + Duration::hours(i as i64), c - 0.2, c + 0.8, c - 0.9, c, 1000.0 + i as f64)
            })
            .collect()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = EngineConfig::default();
        config.gaps.threshold_pct = -1.0;
        assert!(matches!(
            SignalEngine::new(config).unwrap_err(),
            EngineError::ConfigurationOutOfRange { .. }
        ));
    }

    #[test]
    fn test_short_series_degrades() {
        let engine = SignalEngine::new(EngineConfig::default()).unwrap();
        let report = engine
            .evaluate(&EvaluationInput::new("AAPL", TimeFrame::Hour1, bars(30)))
            .unwrap();

        assert!(report.gaps.is_some());
        assert!(report.patterns.is_some());
        assert!(report.trend.is_none());
        assert!(report.cross_asset.is_none());
        assert!(report.magnet.is_none());
        let skipped: Vec<_> = report.skipped.iter().map(|s| s.component).collect();
        assert!(skipped.contains(&crate::factors::ComponentKind::Trend));
        assert!(skipped.contains(&crate::factors::ComponentKind::CrossAsset));
        assert_eq!(report.bars_evaluated, 30);
    }

    #[test]
    fn test_nothing_runnable_fails() {
        let engine = SignalEngine::new(EngineConfig::default()).unwrap();
        let err = engine
            .evaluate(&EvaluationInput::new("AAPL", TimeFrame::Hour1, bars(2)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }

    #[test]
    fn test_bad_bar_is_fatal() {
        let engine = SignalEngine::new(EngineConfig::default()).unwrap();
        let mut series = bars(50);
        series[10].high = series[10].low - 1.0;
        let err = engine
            .evaluate(&EvaluationInput::new("AAPL", TimeFrame::Hour1, series))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidBar { index: 10, .. }));
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let engine = SignalEngine::new(EngineConfig::default()).unwrap();
        let inputs = vec![
            EvaluationInput::new("A", TimeFrame::Hour1, bars(40)),
            EvaluationInput::new("B", TimeFrame::Hour1, bars(2)),
            EvaluationInput::new("C", TimeFrame::Hour1, bars(60)),
        ];

        let results = tokio_test::block_on(engine.evaluate_batch(inputs));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().composite.symbol, "A");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().bars_evaluated, 60);
    }
}
