//! Engine configuration
//!
//! Single source of truth for every threshold, window and weight the engine
//! uses. Each component has its own layer and can be switched off
//! independently. Configuration is validated once, when the engine is built.

use crate::orderflow::OrderFlowMethod;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides, e.g. `SIGNAL_ENGINE__TREND__MIN_ADX=25`
pub const ENV_PREFIX: &str = "SIGNAL_ENGINE";

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub order_flow: OrderFlowConfig,
    #[serde(default)]
    pub gaps: GapConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub squeeze: SqueezeConfig,
    #[serde(default)]
    pub fear: FearConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub cross_asset: CrossAssetConfig,
    #[serde(default)]
    pub magnet: MagnetConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Order-flow estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFlowConfig {
    pub method: OrderFlowMethod,
    /// Buy share given to the candle's direction by the simple method
    pub simple_buy_ratio: f64,
    /// Lower bound of the directional-pressure buy ratio
    pub pressure_floor: f64,
    /// Upper bound of the directional-pressure buy ratio
    pub pressure_ceiling: f64,
    /// max(buy, sell) / min(buy, sell) at or above this is an imbalance
    pub imbalance_ratio: f64,
    /// Bars summarised in the order-flow report
    pub summary_window: usize,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            method: OrderFlowMethod::Hybrid,
            simple_buy_ratio: 0.6,
            pressure_floor: 0.2,
            pressure_ceiling: 0.8,
            imbalance_ratio: 2.0,
            summary_window: 20,
        }
    }
}

/// Fair value gap detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    pub enabled: bool,
    /// Minimum gap size as percent of the reference price
    pub threshold_pct: f64,
    /// Middle bar must push through the first bar's extreme
    pub require_displacement: bool,
    /// Zones older than this many bars are dropped from output
    pub max_age: usize,
    /// Order-flow delta (volume units) a zone's creation bar must reach,
    /// before the multiplier
    pub delta_threshold: f64,
    pub liquidity_multiplier: f64,
    /// Read `delta_threshold` as a fraction of the average bar volume instead
    pub relative_to_volume: bool,
    /// Bars averaged when `relative_to_volume` is set
    pub volume_lookback: usize,
    pub unfilled_only: bool,
    /// Active same-side zones needed for a cluster signal
    pub cluster_count: usize,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_pct: 0.5,
            require_displacement: true,
            max_age: 50,
            delta_threshold: 100.0,
            liquidity_multiplier: 1.5,
            relative_to_volume: false,
            volume_lookback: 20,
            unfilled_only: false,
            cluster_count: 3,
        }
    }
}

/// Pivot and dip-recovery pattern detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub enabled: bool,
    /// Bars on each side a pivot must dominate
    pub pivot_lookback: usize,
    /// Max bars from high to low, and from low to the recovery high
    pub lookback_period: usize,
    pub dip_threshold_pct: f64,
    pub recovery_threshold_pct: f64,
    /// Recovery high must reach this fraction of the pivot high for a reversal
    pub reversal_retrace: f64,
    /// Consolidation with recovery above this fraction of the dip is breakout_pending
    pub consolidation_recovery_ratio: f64,
    /// Dead band for the increasing/decreasing volume profile
    pub volume_trend_tolerance: f64,
    pub v_shape_ratio: f64,
    pub deep_dip_pct: f64,
    pub max_patterns: usize,
    pub max_levels: usize,
    pub phase_band_pct: f64,
    pub rolling_high_period: usize,
    pub rolling_dip_pct: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pivot_lookback: 3,
            lookback_period: 20,
            dip_threshold_pct: 3.0,
            recovery_threshold_pct: 2.0,
            reversal_retrace: 0.95,
            consolidation_recovery_ratio: 0.3,
            volume_trend_tolerance: 0.1,
            v_shape_ratio: 0.4,
            deep_dip_pct: 5.0,
            max_patterns: 5,
            max_levels: 3,
            phase_band_pct: 2.0,
            rolling_high_period: 10,
            rolling_dip_pct: 3.0,
        }
    }
}

/// Bollinger/Keltner squeeze
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqueezeConfig {
    pub enabled: bool,
    pub period: usize,
    pub bb_mult: f64,
    pub kc_mult: f64,
    pub atr_period: usize,
}

impl Default for SqueezeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 20,
            bb_mult: 2.0,
            kc_mult: 1.5,
            atr_period: 20,
        }
    }
}

/// Williams VIX Fix fear detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FearConfig {
    pub enabled: bool,
    /// Highest-close lookback
    pub period: usize,
    /// Window for the mean + k·stdev band
    pub band_period: usize,
    pub std_mult: f64,
    pub percentile_lookback: usize,
    /// Fraction of the wvf range high that counts as extreme
    pub percentile: f64,
    /// A zero reading is never extreme, even when both thresholds are zero.
    /// Off means the plain "either threshold" rule.
    pub ignore_zero_reading: bool,
}

impl Default for FearConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 22,
            band_period: 20,
            std_mult: 2.0,
            percentile_lookback: 50,
            percentile: 0.85,
            ignore_zero_reading: true,
        }
    }
}

/// Fixed blend of the trend sub-scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendWeights {
    pub moving_averages: f64,
    pub rsi: f64,
    pub macd: f64,
    pub vwap: f64,
    pub trend_flag: f64,
}

impl Default for TrendWeights {
    fn default() -> Self {
        Self {
            moving_averages: 0.30,
            rsi: 0.20,
            macd: 0.20,
            vwap: 0.15,
            trend_flag: 0.15,
        }
    }
}

/// Trend/momentum composite and its prohibition gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub enabled: bool,
    pub ma_fast: usize,
    pub ma_mid: usize,
    pub ma_slow: usize,
    pub ma_long: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_midline: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub vwap_period: usize,
    pub vwap_band_pct: f64,
    pub trend_ma_period: usize,
    pub weights: TrendWeights,
    pub adx_period: usize,
    pub atr_period: usize,
    pub atr_ratio_period: usize,
    pub volume_period: usize,
    /// ADX that counts as full trend strength
    pub adx_norm: f64,
    /// ATR ratio that counts as full volatility strength
    pub atr_norm: f64,
    /// Volume ratio that counts as full participation
    pub volume_norm: f64,
    pub min_adx: f64,
    pub min_atr_ratio: f64,
    pub min_ma_distance_pct: f64,
    pub min_volume_ratio: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ma_fast: 9,
            ma_mid: 21,
            ma_slow: 50,
            ma_long: 200,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_midline: 50.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            vwap_period: 20,
            vwap_band_pct: 1.0,
            trend_ma_period: 50,
            weights: TrendWeights::default(),
            adx_period: 14,
            atr_period: 14,
            atr_ratio_period: 50,
            volume_period: 20,
            adx_norm: 50.0,
            atr_norm: 2.0,
            volume_norm: 1.5,
            min_adx: 20.0,
            min_atr_ratio: 0.8,
            min_ma_distance_pct: 0.5,
            min_volume_ratio: 0.5,
        }
    }
}

/// Macro regime from auxiliary series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossAssetConfig {
    pub enabled: bool,
    pub return_period: usize,
    pub zscore_window: usize,
    pub clamp: f64,
    /// |raw| at or above this is bull/bear
    pub regime_threshold: f64,
    pub strong_threshold: f64,
}

impl Default for CrossAssetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            return_period: 20,
            zscore_window: 60,
            clamp: 3.0,
            regime_threshold: 0.5,
            strong_threshold: 1.0,
        }
    }
}

/// Options-chain magnet engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetConfig {
    pub enabled: bool,
    /// Strikes further than this percent from spot are ignored for the magnet
    pub window_pct: f64,
    pub min_open_interest: f64,
    pub gamma_weight: f64,
    pub max_zones: usize,
    /// A zone this close (percent) to the magnet price is the magnet itself
    pub magnet_band_pct: f64,
    pub strong_gravity_pct: f64,
    pub weak_gravity_pct: f64,
}

impl Default for MagnetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_pct: 15.0,
            min_open_interest: 100.0,
            gamma_weight: 1.0,
            max_zones: 5,
            magnet_band_pct: 1.0,
            strong_gravity_pct: 2.0,
            weak_gravity_pct: 0.5,
        }
    }
}

/// Composite score scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// Weighted blend on [-100, 100]
    #[default]
    Weighted,
    /// Point accumulation on [0, 12]
    Points,
}

/// Per-component weights for the weighted scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub trend: f64,
    pub cross_asset: f64,
    pub magnet_gravity: f64,
    pub strike_sentiment: f64,
    pub gaps: f64,
    pub patterns: f64,
    pub squeeze: f64,
    pub fear: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            trend: 0.30,
            cross_asset: 0.30,
            magnet_gravity: 0.25,
            strike_sentiment: 0.20,
            gaps: 0.0,
            patterns: 0.0,
            squeeze: 0.0,
            fear: 0.0,
        }
    }
}

/// Score bands for action classification (magnitudes, symmetric around zero)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionBands {
    /// strong_buy / strong_sell, MAX confidence, 100% size
    pub strong: f64,
    /// buy / sell, HIGH confidence, 75% size
    pub high: f64,
    /// buy / sell, MED confidence, 50% size
    pub medium: f64,
}

impl ActionBands {
    pub fn weighted() -> Self {
        Self {
            strong: 60.0,
            high: 40.0,
            medium: 20.0,
        }
    }

    pub fn points() -> Self {
        Self {
            strong: 10.0,
            high: 8.0,
            medium: 6.0,
        }
    }

    fn scaled(&self, factor: f64, cap: f64) -> Self {
        Self {
            strong: (self.strong * factor).min(cap),
            high: (self.high * factor).min(cap),
            medium: (self.medium * factor).min(cap),
        }
    }
}

/// Composite scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub scale: ScoreScale,
    pub weights: ComponentWeights,
    /// Cross-asset raw value multiplier onto the ±100 scale
    pub macro_score_scale: f64,
    pub weighted_bands: ActionBands,
    pub points_bands: ActionBands,
    /// Below this |score| an active prohibition gate wins (weighted scale)
    pub prohibition_ceiling_weighted: f64,
    /// Below this score an active prohibition gate wins (points scale)
    pub prohibition_ceiling_points: f64,
    /// |trend core| for 3 / 2 / 1 points
    pub trend_point_bands: [f64; 3],
    /// Pattern strength for 3 / 2 points (any qualifying pattern earns 1)
    pub pattern_point_bands: [f64; 2],
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scale: ScoreScale::Weighted,
            weights: ComponentWeights::default(),
            macro_score_scale: 50.0,
            weighted_bands: ActionBands::weighted(),
            points_bands: ActionBands::points(),
            prohibition_ceiling_weighted: 40.0,
            prohibition_ceiling_points: 8.0,
            trend_point_bands: [60.0, 40.0, 20.0],
            pattern_point_bands: [80.0, 65.0],
        }
    }
}

/// Multi-timeframe alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub min_strength_weighted: f64,
    pub min_strength_points: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            min_strength_weighted: 40.0,
            min_strength_points: 6.0,
        }
    }
}

/// Batch evaluation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Max evaluations running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    8
}

/// Strictness level for presets
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Low,
    #[default]
    Medium,
    High,
}

impl EngineConfig {
    /// Default configuration with strictness applied to action bands and the
    /// prohibition gate
    pub fn preset(strictness: Strictness) -> Self {
        Self::default().with_strictness(strictness)
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        let multiplier = match strictness {
            Strictness::Low => 0.8,
            Strictness::Medium => 1.0,
            Strictness::High => 1.2,
        };

        // Higher = stricter
        self.scoring.weighted_bands = self.scoring.weighted_bands.scaled(multiplier, 100.0);
        self.scoring.points_bands = self.scoring.points_bands.scaled(multiplier, 12.0);
        self.trend.min_adx *= multiplier;
        self.trend.min_volume_ratio *= multiplier;
        self.alignment.min_strength_weighted =
            (self.alignment.min_strength_weighted * multiplier).min(100.0);

        self
    }

    /// Load from an optional file (toml/json/yaml by extension) layered under
    /// `SIGNAL_ENGINE__*` environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::ConfigLoad(e.to_string()))?;

        config.validate()?;
        tracing::debug!(path = ?path, scale = ?config.scoring.scale, "engine config loaded");
        Ok(config)
    }

    /// Reject anything out of range
    pub fn validate(&self) -> Result<()> {
        let of = &self.order_flow;
        ratio("order_flow.simple_buy_ratio", of.simple_buy_ratio, 0.5, 1.0)?;
        ratio("order_flow.pressure_floor", of.pressure_floor, 0.0, 1.0)?;
        ratio("order_flow.pressure_ceiling", of.pressure_ceiling, 0.0, 1.0)?;
        if of.pressure_floor > of.pressure_ceiling {
            return Err(EngineError::out_of_range(
                "order_flow.pressure_floor",
                "must not exceed pressure_ceiling",
            ));
        }
        if !(of.imbalance_ratio >= 1.0) {
            return Err(EngineError::out_of_range("order_flow.imbalance_ratio", "must be >= 1"));
        }
        period("order_flow.summary_window", of.summary_window)?;

        let g = &self.gaps;
        non_negative("gaps.threshold_pct", g.threshold_pct)?;
        non_negative("gaps.delta_threshold", g.delta_threshold)?;
        non_negative("gaps.liquidity_multiplier", g.liquidity_multiplier)?;
        period("gaps.volume_lookback", g.volume_lookback)?;
        period("gaps.cluster_count", g.cluster_count)?;

        let p = &self.patterns;
        period("patterns.pivot_lookback", p.pivot_lookback)?;
        period("patterns.lookback_period", p.lookback_period)?;
        period("patterns.max_patterns", p.max_patterns)?;
        period("patterns.rolling_high_period", p.rolling_high_period)?;
        non_negative("patterns.dip_threshold_pct", p.dip_threshold_pct)?;
        non_negative("patterns.recovery_threshold_pct", p.recovery_threshold_pct)?;
        ratio("patterns.reversal_retrace", p.reversal_retrace, 0.0, 1.0)?;
        ratio("patterns.consolidation_recovery_ratio", p.consolidation_recovery_ratio, 0.0, 1.0)?;
        non_negative("patterns.volume_trend_tolerance", p.volume_trend_tolerance)?;
        ratio("patterns.v_shape_ratio", p.v_shape_ratio, 0.0, 1.0)?;
        non_negative("patterns.deep_dip_pct", p.deep_dip_pct)?;
        non_negative("patterns.phase_band_pct", p.phase_band_pct)?;
        non_negative("patterns.rolling_dip_pct", p.rolling_dip_pct)?;

        let s = &self.squeeze;
        period("squeeze.period", s.period)?;
        period("squeeze.atr_period", s.atr_period)?;
        non_negative("squeeze.bb_mult", s.bb_mult)?;
        non_negative("squeeze.kc_mult", s.kc_mult)?;

        let f = &self.fear;
        period("fear.period", f.period)?;
        period("fear.band_period", f.band_period)?;
        period("fear.percentile_lookback", f.percentile_lookback)?;
        non_negative("fear.std_mult", f.std_mult)?;
        ratio("fear.percentile", f.percentile, 0.0, 1.0)?;

        let t = &self.trend;
        for (name, value) in [
            ("trend.ma_fast", t.ma_fast),
            ("trend.ma_mid", t.ma_mid),
            ("trend.ma_slow", t.ma_slow),
            ("trend.ma_long", t.ma_long),
            ("trend.rsi_period", t.rsi_period),
            ("trend.macd_fast", t.macd_fast),
            ("trend.macd_slow", t.macd_slow),
            ("trend.macd_signal", t.macd_signal),
            ("trend.vwap_period", t.vwap_period),
            ("trend.trend_ma_period", t.trend_ma_period),
            ("trend.adx_period", t.adx_period),
            ("trend.atr_period", t.atr_period),
            ("trend.atr_ratio_period", t.atr_ratio_period),
            ("trend.volume_period", t.volume_period),
        ] {
            period(name, value)?;
        }
        if t.macd_fast >= t.macd_slow {
            return Err(EngineError::out_of_range("trend.macd_fast", "must be shorter than macd_slow"));
        }
        if !(t.rsi_oversold <= t.rsi_midline && t.rsi_midline <= t.rsi_overbought) {
            return Err(EngineError::out_of_range(
                "trend.rsi_overbought",
                "rsi bands must satisfy oversold <= midline <= overbought",
            ));
        }
        for (name, value) in [
            ("trend.weights.moving_averages", t.weights.moving_averages),
            ("trend.weights.rsi", t.weights.rsi),
            ("trend.weights.macd", t.weights.macd),
            ("trend.weights.vwap", t.weights.vwap),
            ("trend.weights.trend_flag", t.weights.trend_flag),
            ("trend.vwap_band_pct", t.vwap_band_pct),
            ("trend.min_adx", t.min_adx),
            ("trend.min_atr_ratio", t.min_atr_ratio),
            ("trend.min_ma_distance_pct", t.min_ma_distance_pct),
            ("trend.min_volume_ratio", t.min_volume_ratio),
        ] {
            non_negative(name, value)?;
        }
        for (name, value) in [
            ("trend.adx_norm", t.adx_norm),
            ("trend.atr_norm", t.atr_norm),
            ("trend.volume_norm", t.volume_norm),
        ] {
            positive(name, value)?;
        }

        let c = &self.cross_asset;
        period("cross_asset.return_period", c.return_period)?;
        if c.zscore_window < 2 {
            return Err(EngineError::out_of_range("cross_asset.zscore_window", "must be at least 2"));
        }
        positive("cross_asset.clamp", c.clamp)?;
        non_negative("cross_asset.regime_threshold", c.regime_threshold)?;
        non_negative("cross_asset.strong_threshold", c.strong_threshold)?;

        let m = &self.magnet;
        non_negative("magnet.window_pct", m.window_pct)?;
        non_negative("magnet.min_open_interest", m.min_open_interest)?;
        non_negative("magnet.gamma_weight", m.gamma_weight)?;
        period("magnet.max_zones", m.max_zones)?;
        non_negative("magnet.magnet_band_pct", m.magnet_band_pct)?;
        non_negative("magnet.weak_gravity_pct", m.weak_gravity_pct)?;
        if m.weak_gravity_pct > m.strong_gravity_pct {
            return Err(EngineError::out_of_range(
                "magnet.weak_gravity_pct",
                "must not exceed strong_gravity_pct",
            ));
        }

        let sc = &self.scoring;
        let w = &sc.weights;
        for (name, value) in [
            ("scoring.weights.trend", w.trend),
            ("scoring.weights.cross_asset", w.cross_asset),
            ("scoring.weights.magnet_gravity", w.magnet_gravity),
            ("scoring.weights.strike_sentiment", w.strike_sentiment),
            ("scoring.weights.gaps", w.gaps),
            ("scoring.weights.patterns", w.patterns),
            ("scoring.weights.squeeze", w.squeeze),
            ("scoring.weights.fear", w.fear),
            ("scoring.macro_score_scale", sc.macro_score_scale),
            ("scoring.prohibition_ceiling_weighted", sc.prohibition_ceiling_weighted),
            ("scoring.prohibition_ceiling_points", sc.prohibition_ceiling_points),
        ] {
            non_negative(name, value)?;
        }
        bands("scoring.weighted_bands", &sc.weighted_bands)?;
        bands("scoring.points_bands", &sc.points_bands)?;
        descending("scoring.trend_point_bands", &sc.trend_point_bands)?;
        descending("scoring.pattern_point_bands", &sc.pattern_point_bands)?;

        non_negative("alignment.min_strength_weighted", self.alignment.min_strength_weighted)?;
        non_negative("alignment.min_strength_points", self.alignment.min_strength_points)?;
        period("batch.max_concurrency", self.batch.max_concurrency)?;

        Ok(())
    }
}

fn period(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(EngineError::out_of_range(field, "must be greater than zero"));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::out_of_range(
            field,
            format!("must be a non-negative number, got {}", value),
        ));
    }
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::out_of_range(field, format!("must be positive, got {}", value)));
    }
    Ok(())
}

fn ratio(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(EngineError::out_of_range(
            field,
            format!("must be within [{}, {}], got {}", min, max, value),
        ));
    }
    Ok(())
}

fn bands(field: &str, bands: &ActionBands) -> Result<()> {
    non_negative(field, bands.medium)?;
    if !(bands.medium <= bands.high && bands.high <= bands.strong) {
        return Err(EngineError::out_of_range(field, "bands must satisfy medium <= high <= strong"));
    }
    Ok(())
}

fn descending(field: &str, values: &[f64]) -> Result<()> {
    for value in values {
        non_negative(field, *value)?;
    }
    if values.windows(2).any(|w| w[0] < w[1]) {
        return Err(EngineError::out_of_range(field, "must be in descending order"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trend.ma_long, 200);
        assert_eq!(config.gaps.threshold_pct, 0.5);
        assert_eq!(config.batch.max_concurrency, 8);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.gaps.threshold_pct = -0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            EngineError::ConfigurationOutOfRange { ref field, .. } if field == "gaps.threshold_pct"
        ));
    }

    #[test]
    fn test_inverted_bands_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.weighted_bands.medium = 70.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.order_flow.pressure_floor = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strictness_presets() {
        let low = EngineConfig::preset(Strictness::Low);
        let high = EngineConfig::preset(Strictness::High);
        assert!(low.scoring.weighted_bands.strong < high.scoring.weighted_bands.strong);
        assert!(low.trend.min_adx < high.trend.min_adx);
        assert!(high.scoring.points_bands.strong <= 12.0);
        assert!(low.validate().is_ok());
        assert!(high.validate().is_ok());
        assert_eq!(EngineConfig::preset(Strictness::Medium), EngineConfig::default());
    }

    #[test]
    fn test_load_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[gaps]\nthreshold_pct = 0.75\n\n[scoring]\nscale = \"points\"\n\n[order_flow]\nmethod = \"simple\""
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.gaps.threshold_pct, 0.75);
        assert_eq!(config.gaps.max_age, 50);
        assert_eq!(config.scoring.scale, ScoreScale::Points);
        assert_eq!(config.order_flow.method, OrderFlowMethod::Simple);
        assert_eq!(config.trend, TrendConfig::default());
    }

    #[test]
    fn test_load_rejects_out_of_range_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[fear]\npercentile = 1.5").unwrap();

        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, EngineError::ConfigurationOutOfRange { .. }));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/engine.toml"))).unwrap_err();
        assert!(matches!(err, EngineError::ConfigLoad(_)));
    }
}
