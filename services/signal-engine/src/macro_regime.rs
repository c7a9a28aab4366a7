//! Cross-asset macro regime
//!
//! Four z-scored reads from auxiliary close series: broad-index momentum,
//! credit appetite, volatility level and currency strength. Each is clamped,
//! their mean is the raw regime value.

use crate::config::CrossAssetConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::indicators;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Auxiliary close series, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxiliarySeries {
    pub broad_index: Option<Vec<f64>>,
    /// Credit-sensitive series, risk-on side of the ratio
    pub credit_a: Option<Vec<f64>>,
    /// Credit-sensitive series, risk-off side of the ratio
    pub credit_b: Option<Vec<f64>>,
    pub volatility: Option<Vec<f64>>,
    pub currency: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeState {
    Bull,
    Bear,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeComponents {
    pub index_momentum: f64,
    pub credit_appetite: f64,
    pub volatility: f64,
    pub currency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossAssetReport {
    pub components: RegimeComponents,
    pub raw: f64,
    pub state: RegimeState,
    pub strong: bool,
}

impl CrossAssetReport {
    /// Raw value mapped onto [-100, 100]
    pub fn score(&self, scale: f64) -> f64 {
        (self.raw * scale).clamp(-100.0, 100.0)
    }
}

pub struct CrossAssetRegime<'a> {
    config: &'a CrossAssetConfig,
}

impl<'a> CrossAssetRegime<'a> {
    pub fn new(config: &'a CrossAssetConfig) -> Self {
        Self { config }
    }

    /// Latest value z-scored against the last `zscore_window` values, clamped
    fn clamped_z(&self, values: &[f64]) -> f64 {
        let start = values.len().saturating_sub(self.config.zscore_window);
        let window = &values[start..];
        let z = window
            .last()
            .and_then(|latest| indicators::zscore(*latest, window))
            .unwrap_or(0.0);
        z.clamp(-self.config.clamp, self.config.clamp)
    }

    fn log_returns(&self, values: &[f64]) -> Vec<f64> {
        let period = self.config.return_period;
        (period..values.len())
            .map(|k| (values[k] / values[k - period]).ln())
            .collect()
    }

    fn required_points(&self) -> usize {
        self.config.return_period + self.config.zscore_window
    }
}

fn series<'s>(name: &str, values: &'s Option<Vec<f64>>, required: usize) -> Result<&'s [f64]> {
    let values = values
        .as_deref()
        .ok_or_else(|| EngineError::MissingAuxiliarySeries(name.to_string()))?;
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(EngineError::MissingAuxiliarySeries(format!(
            "{} has non-positive or non-finite values",
            name
        )));
    }
    if values.len() < required {
        return Err(EngineError::insufficient(
            &format!("{}.{}", ComponentKind::CrossAsset, name),
            required,
            values.len(),
        ));
    }
    Ok(values)
}

impl<'a> Component for CrossAssetRegime<'a> {
    type Output = CrossAssetReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::CrossAsset
    }

    fn required_bars(&self) -> usize {
        0
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<CrossAssetReport> {
        let aux = ctx
            .auxiliary
            .ok_or_else(|| EngineError::MissingAuxiliarySeries("auxiliary".to_string()))?;
        let required = self.required_points();

        let index = series("broad_index", &aux.broad_index, required)?;
        let credit_a = series("credit_a", &aux.credit_a, required)?;
        let credit_b = series("credit_b", &aux.credit_b, required)?;
        let volatility = series("volatility", &aux.volatility, self.config.zscore_window)?;
        let currency = series("currency", &aux.currency, required)?;

        // Align the credit pair on its most recent points
        let len = credit_a.len().min(credit_b.len());
        let credit_ratio: Vec<f64> = credit_a[credit_a.len() - len..]
            .iter()
            .zip(&credit_b[credit_b.len() - len..])
            .map(|(a, b)| a / b)
            .collect();

        let components = RegimeComponents {
            index_momentum: self.clamped_z(&self.log_returns(index)),
            credit_appetite: self.clamped_z(&self.log_returns(&credit_ratio)),
            volatility: -self.clamped_z(volatility),
            currency: -self.clamped_z(&self.log_returns(currency)),
        };

        let raw = (components.index_momentum
            + components.credit_appetite
            + components.volatility
            + components.currency)
            / 4.0;

        let state = if raw >= self.config.regime_threshold {
            RegimeState::Bull
        } else if raw <= -self.config.regime_threshold {
            RegimeState::Bear
        } else {
            RegimeState::Neutral
        };
        let strong = raw.abs() >= self.config.strong_threshold;

        debug!(raw, state = ?state, strong, "cross-asset regime evaluated");

        Ok(CrossAssetReport {
            components,
            raw,
            state,
            strong,
        })
    }
}
