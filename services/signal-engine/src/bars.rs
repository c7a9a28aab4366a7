//! Bar series validation
//!
//! Every evaluation starts here. A series that breaks the OHLC invariant or
//! the timestamp ordering is rejected outright; a series that is merely short
//! is accepted and each component checks its own lookback via [`BarSeries::require`].

use crate::types::*;

/// Check a single bar: finite values, positive prices, non-negative volume,
/// `low <= min(open, close) <= max(open, close) <= high`.
pub fn validate_bar(bar: &PriceBar) -> std::result::Result<(), String> {
    let fields = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
        ("volume", bar.volume),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(format!("{} is not finite", name));
        }
    }

    for (name, value) in &fields[..4] {
        if *value <= 0.0 {
            return Err(format!("{} must be positive, got {}", name, value));
        }
    }

    if bar.volume < 0.0 {
        return Err(format!("volume must be non-negative, got {}", bar.volume));
    }

    let body_low = bar.open.min(bar.close);
    let body_high = bar.open.max(bar.close);
    if bar.low > body_low || body_high > bar.high {
        return Err(format!(
            "OHLC invariant violated (o={} h={} l={} c={})",
            bar.open, bar.high, bar.low, bar.close
        ));
    }

    Ok(())
}

/// Validated, read-only bar series
#[derive(Debug, Clone)]
pub struct BarSeries {
    bars: Vec<PriceBar>,
}

impl BarSeries {
    /// Validate and wrap a bar list
    pub fn new(bars: Vec<PriceBar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(EngineError::insufficient("bar_series", 1, 0));
        }

        for (index, bar) in bars.iter().enumerate() {
            validate_bar(bar).map_err(|reason| EngineError::InvalidBar { index, reason })?;

            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(EngineError::InvalidBar {
                    index,
                    reason: format!(
                        "timestamp {} does not follow {}",
                        bar.timestamp,
                        bars[index - 1].timestamp
                    ),
                });
            }
        }

        Ok(Self { bars })
    }

    /// Validate candles from the data layer
    pub fn from_candles(candles: &[Candle]) -> Result<Self> {
        let bars = candles
            .iter()
            .enumerate()
            .map(|(index, candle)| {
                PriceBar::try_from(candle).map_err(|e| match e {
                    EngineError::InvalidBar { reason, .. } => EngineError::InvalidBar { index, reason },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(bars)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> &PriceBar {
        // non-empty by construction
        &self.bars[self.bars.len() - 1]
    }

    /// Fail with `InsufficientData` if fewer than `required` bars are present
    pub fn require(&self, component: &str, required: usize) -> Result<()> {
        if self.bars.len() < required {
            return Err(EngineError::insufficient(component, required, self.bars.len()));
        }
        Ok(())
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
