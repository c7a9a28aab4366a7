//! End-to-end engine scenarios over seeded fixtures

mod common;

use common::{init_tracing, ohlc_bar, symmetric_chain, MockMarket};
use signal_engine::config::TrendConfig;
use signal_engine::factors::ComponentKind;
use signal_engine::gaps::GapArena;
use signal_engine::indicators::MacdOutput;
use signal_engine::trend;
use signal_engine::*;

fn engine() -> SignalEngine {
    SignalEngine::new(EngineConfig::default()).unwrap()
}

fn random_input(seed: u64, count: usize) -> EvaluationInput {
    let mut market = MockMarket::new(seed);
    let bars = market.bars(count, TimeFrame::Hour1);
    let spot = market.price;
    let auxiliary = market.auxiliary(120);
    let chain = market.options_chain(spot, 1.0, 10);
    EvaluationInput::new(format!("SYM{seed}"), TimeFrame::Hour1, bars)
        .with_auxiliary(auxiliary)
        .with_options_chain(chain)
}

#[test]
fn test_evaluation_is_deterministic() {
    init_tracing();
    let engine = engine();
    let input = random_input(7, 260);

    let first = engine.evaluate(&input).unwrap();
    let second = engine.evaluate(&input).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_full_input_runs_every_component() {
    let report = engine().evaluate(&random_input(11, 260)).unwrap();

    assert!(report.skipped.is_empty(), "skipped: {:?}", report.skipped);
    assert!(report.gaps.is_some());
    assert!(report.patterns.is_some());
    assert!(report.squeeze.is_some());
    assert!(report.fear.is_some());
    assert!(report.trend.is_some());
    assert!(report.cross_asset.is_some());
    assert!(report.magnet.is_some());

    let composite = &report.composite;
    assert!(composite.composite_score.abs() <= 100.0);
    assert_eq!(composite.as_of, input_last_timestamp(11, 260));
    assert_eq!(report.bars_evaluated, 260);
}

fn input_last_timestamp(seed: u64, count: usize) -> chrono::DateTime<chrono::Utc> {
    random_input(seed, count).bars.last().unwrap().timestamp
}

#[test]
fn test_scores_stay_bounded_across_seeds() {
    let weighted = engine();
    let mut config = EngineConfig::default();
    config.scoring.scale = ScoreScale::Points;
    let points = SignalEngine::new(config).unwrap();

    for seed in 0..12 {
        let input = random_input(seed, 240);

        let w = weighted.evaluate(&input).unwrap().composite;
        assert!((-100.0..=100.0).contains(&w.composite_score));
        assert!([0u8, 50, 75, 100].contains(&w.size_percent));
        if !w.action.is_actionable() {
            assert_eq!(w.size_percent, 0);
            assert_eq!(w.direction, Direction::Neutral);
        }

        let p = points.evaluate(&input).unwrap().composite;
        assert!((0.0..=12.0).contains(&p.composite_score));
        assert!([0u8, 50, 75, 100].contains(&p.size_percent));
        assert_eq!(p.scale, ScoreScale::Points);
    }
}

#[test]
fn test_prohibited_results_carry_a_reason() {
    let engine = engine();
    for seed in 20..30 {
        let report = engine.evaluate(&random_input(seed, 240)).unwrap();
        let composite = &report.composite;
        if composite.prohibited {
            assert!(!composite.reasons.is_empty());
            let trend = report.trend.as_ref().unwrap();
            assert_eq!(trend.core, 0.0);
        }
        if composite.action == Action::Prohibited {
            assert!(composite.prohibited);
            assert_eq!(composite.size_percent, 0);
        }
    }
}

#[tokio::test]
async fn test_batch_matches_sequential_order() {
    let engine = engine();
    let mut inputs: Vec<EvaluationInput> = (0..6).map(|seed| random_input(seed, 220)).collect();
    // One failing input in the middle must not disturb the others
    inputs.insert(3, EvaluationInput::new("EMPTY", TimeFrame::Hour1, Vec::new()));

    let batch = engine.evaluate_batch(inputs.clone()).await;
    assert_eq!(batch.len(), inputs.len());

    for (input, result) in inputs.iter().zip(&batch) {
        match engine.evaluate(input) {
            Ok(expected) => assert_eq!(result.as_ref().unwrap(), &expected),
            Err(_) => assert!(result.is_err()),
        }
    }
    assert!(batch[3].is_err());
}

#[tokio::test]
async fn test_batch_respects_small_concurrency() {
    let mut config = EngineConfig::default();
    config.batch.max_concurrency = 1;
    let engine = SignalEngine::new(config).unwrap();

    let inputs: Vec<EvaluationInput> = (40..44).map(|seed| random_input(seed, 120)).collect();
    let results = engine.evaluate_batch(inputs.clone()).await;

    let symbols: Vec<&str> = results
        .iter()
        .map(|r| r.as_ref().unwrap().composite.symbol.as_str())
        .collect();
    let expected: Vec<&str> = inputs.iter().map(|i| i.symbol.as_str()).collect();
    assert_eq!(symbols, expected);
}

#[test]
fn test_three_bar_gap_through_engine() {
    let bars = vec![
        ohlc_bar(0, 99.0, 100.0, 98.0, 99.5),
        ohlc_bar(1, 99.5, 101.0, 99.0, 100.8),
        ohlc_bar(2, 102.5, 104.0, 102.0, 103.5),
    ];
    let report = engine()
        .evaluate(&EvaluationInput::new("GAP", TimeFrame::Minute1, bars))
        .unwrap();

    let gaps = report.gaps.unwrap();
    assert_eq!(gaps.zones.len(), 1);
    assert_eq!(gaps.zones[0].kind, GapKind::Bullish);
    assert_eq!(gaps.zones[0].bottom, 100.0);
    assert_eq!(gaps.zones[0].top, 102.0);
    assert!(gaps.signals.contains(&"NEW_BULLISH_FVG".to_string()));

    // Everything needing more history is skipped, not failed
    let skipped: Vec<ComponentKind> = report.skipped.iter().map(|s| s.component).collect();
    assert!(skipped.contains(&ComponentKind::Patterns));
    assert!(skipped.contains(&ComponentKind::Trend));
    assert!(skipped.contains(&ComponentKind::Magnet));
}

#[test]
fn test_gap_fills_never_revert() {
    let mut market = MockMarket::new(99).with_volatility(0.03);
    let bars = market.bars(150, TimeFrame::Minute5);
    let config = signal_engine::config::GapConfig::default();
    let tape = FlowTape::build(&bars, &signal_engine::config::OrderFlowConfig::default());
    let arena = GapArena::scan(&bars, &tape, &config);

    let mut filled_at = std::collections::HashMap::new();
    for last in 0..bars.len() {
        for zone in arena.view(last, &config) {
            if let Some(previous) = filled_at.get(&zone.id) {
                assert_eq!(zone.filled_at_index, Some(*previous), "zone {} unfilled", zone.id);
            } else if let Some(j) = zone.filled_at_index {
                assert!(j > zone.created_at_index);
                filled_at.insert(zone.id, j);
            }
        }
    }
}

#[test]
fn test_order_flow_splits_volume_exactly() {
    let mut market = MockMarket::new(5);
    let bars = market.bars(80, TimeFrame::Minute15);
    let tape = FlowTape::build(&bars, &signal_engine::config::OrderFlowConfig::default());

    for (bar, sample) in bars.iter().zip(tape.samples()) {
        assert!(sample.buy_volume >= 0.0 && sample.sell_volume >= 0.0);
        assert_eq!(sample.buy_volume + sample.sell_volume, bar.volume);
        assert_eq!(sample.delta, sample.buy_volume - sample.sell_volume);
    }
}

#[test]
fn test_component_invariants_across_seeds() {
    let engine = engine();
    let config = engine.config().clone();
    let mut patterns_seen = 0;
    let mut zones_seen = 0;

    for seed in 100..110 {
        let mut market = MockMarket::new(seed).with_volatility(0.02);
        let bars = market.bars(300, TimeFrame::Hour1);
        let tape = FlowTape::build(&bars, &config.order_flow);
        let report = engine
            .evaluate(&EvaluationInput::new("PROP", TimeFrame::Hour1, bars))
            .unwrap();

        let patterns = report.patterns.unwrap();
        for pattern in &patterns.patterns {
            assert!((0.0..=100.0).contains(&pattern.strength), "seed {seed}: {pattern:?}");
            assert!(pattern.dip_depth_pct >= config.patterns.dip_threshold_pct);
            assert!(pattern.start_index < pattern.end_index);
        }
        assert!(patterns.resistance_levels.windows(2).all(|w| w[0] < w[1]));
        assert!(patterns.support_levels.windows(2).all(|w| w[0] > w[1]));
        patterns_seen += patterns.patterns.len();

        let gaps = report.gaps.unwrap();
        for zone in &gaps.zones {
            assert!(zone.top >= zone.bottom, "seed {seed}: {zone:?}");
            assert_eq!(zone.delta_at_creation, tape.get(zone.created_at_index).unwrap().delta);
            assert!(zone.age <= config.gaps.max_age);
            assert_eq!(zone.is_filled, zone.filled_at_index.is_some());
        }
        assert!(gaps
            .zones
            .windows(2)
            .all(|w| w[0].created_at_index >= w[1].created_at_index));
        zones_seen += gaps.zones.len();
    }

    assert!(patterns_seen > 0);
    assert!(zones_seen > 0);
}

#[test]
fn test_trend_gate_from_known_readings() {
    let config = TrendConfig::default();
    let measurements = TrendMeasurements {
        close: 105.0,
        ma_fast: 104.0,
        ma_mid: 103.0,
        ma_slow: 101.0,
        ma_long: 98.0,
        rsi: 60.0,
        macd: MacdOutput {
            line: 0.8,
            signal: 0.5,
            histogram: 0.3,
        },
        vwap: 103.0,
        trend_ma: 100.0,
        adx: 15.0,
        atr_ratio: 0.9,
        volume_ratio: 1.0,
    };

    let report = trend::score(&measurements, &config);
    assert!(report.prohibition_active);
    assert_eq!(report.prohibition_reasons.len(), 1);
    assert!(report.prohibition_reasons[0].starts_with("ADX"));
    assert_eq!(report.core, 0.0);
    assert!(report.directional > 0.0);
}

#[test]
fn test_symmetric_chain_pins_max_pain() {
    let mut market = MockMarket::new(3).with_volatility(0.002);
    let bars = market.bars(40, TimeFrame::Hour1);
    let input = EvaluationInput::new("SPY", TimeFrame::Hour1, bars)
        .with_options_chain(symmetric_chain(100.0, 1.0, 10));

    let report = engine().evaluate(&input).unwrap();
    let magnet = report.magnet.unwrap();
    assert_eq!(magnet.max_pain, 100.0);
}

#[test]
fn test_missing_auxiliary_degrades() {
    let mut market = MockMarket::new(17);
    let bars = market.bars(220, TimeFrame::Day1);
    let report = engine()
        .evaluate(&EvaluationInput::new("QQQ", TimeFrame::Day1, bars))
        .unwrap();

    assert!(report.cross_asset.is_none());
    assert!(report.magnet.is_none());
    assert!(report.trend.is_some());
    let skipped: Vec<ComponentKind> = report.skipped.iter().map(|s| s.component).collect();
    assert!(skipped.contains(&ComponentKind::CrossAsset));
    assert!(skipped.contains(&ComponentKind::Magnet));
    assert!(report
        .composite
        .components
        .iter()
        .all(|c| c.name != "cross_asset" && c.name != "magnet_gravity"));
}

#[test]
fn test_invalid_chain_skips_magnet() {
    let mut market = MockMarket::new(18);
    let bars = market.bars(220, TimeFrame::Day1);
    let spot = bars.last().unwrap().close;
    let mut chain = symmetric_chain(spot.round(), 1.0, 10);
    chain.strikes[3].put_gamma = f64::NAN;

    let report = engine()
        .evaluate(&EvaluationInput::new("SPY", TimeFrame::Day1, bars).with_options_chain(chain))
        .unwrap();

    assert!(report.magnet.is_none());
    assert!(report.trend.is_some());
    let skipped = report
        .skipped
        .iter()
        .find(|s| s.component == ComponentKind::Magnet)
        .unwrap();
    assert!(skipped.reason.contains("put_gamma"));
}

#[test]
fn test_timeframes_alignment_is_consistent() {
    let engine = engine();
    for seed in 50..58 {
        let mut market = MockMarket::new(seed).with_drift(0.002);
        let short = EvaluationInput::new("AAPL", TimeFrame::Hour1, market.bars(240, TimeFrame::Hour1));
        let long = EvaluationInput::new("AAPL", TimeFrame::Day1, market.bars(240, TimeFrame::Day1));

        let report = engine.evaluate_timeframes(&short, &long).unwrap();
        let alignment = &report.alignment;
        if alignment.aligned {
            assert_eq!(alignment.direction, report.short.composite.direction);
            assert_eq!(alignment.direction, report.long.composite.direction);
            assert!(!alignment.direction.is_neutral());
            let mean = (report.short.composite.strength() + report.long.composite.strength()) / 2.0;
            assert_eq!(alignment.alignment_strength, mean.round());
        } else {
            assert_eq!(alignment.alignment_strength, 0.0);
            assert_eq!(alignment.direction, Direction::Neutral);
        }
    }
}

#[test]
fn test_different_symbols_never_align() {
    let engine = engine();
    let mut market = MockMarket::new(61).with_drift(0.004);
    let bars = market.bars(240, TimeFrame::Hour1);
    let short = EvaluationInput::new("AAPL", TimeFrame::Hour1, bars.clone());
    let long = EvaluationInput::new("MSFT", TimeFrame::Hour1, bars);

    let report = engine.evaluate_timeframes(&short, &long).unwrap();
    assert!(!report.alignment.aligned);
}

#[test]
fn test_report_serializes() {
    let report = engine().evaluate(&random_input(8, 230)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["composite"]["confidence"].is_string());
    assert!(json["composite"]["action"].is_string());
    assert!(json["order_flow"].is_object());
}
