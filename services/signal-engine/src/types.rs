use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV sample, the unit every detector works on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// OHLCV candle as delivered by the data layer (decimal prices)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl TryFrom<&Candle> for PriceBar {
    type Error = EngineError;

    fn try_from(candle: &Candle) -> Result<Self> {
        let convert = |value: Decimal, field: &str| {
            value.to_f64().ok_or_else(|| EngineError::InvalidBar {
                index: 0,
                reason: format!("{} {} is not representable as f64", field, value),
            })
        };

        let bar = PriceBar {
            timestamp: candle.timestamp,
            open: convert(candle.open, "open")?,
            high: convert(candle.high, "high")?,
            low: convert(candle.low, "low")?,
            close: convert(candle.close, "close")?,
            volume: convert(candle.volume, "volume")?,
        };

        crate::bars::validate_bar(&bar).map_err(|reason| EngineError::InvalidBar { index: 0, reason })?;
        Ok(bar)
    }
}

/// Supported timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Minute1 => "1m",
            TimeFrame::Minute5 => "5m",
            TimeFrame::Minute15 => "15m",
            TimeFrame::Minute30 => "30m",
            TimeFrame::Hour1 => "1h",
            TimeFrame::Hour4 => "4h",
            TimeFrame::Day1 => "1d",
            TimeFrame::Week1 => "1w",
        }
    }

    pub fn to_seconds(&self) -> i64 {
        match self {
            TimeFrame::Minute1 => 60,
            TimeFrame::Minute5 => 300,
            TimeFrame::Minute15 => 900,
            TimeFrame::Minute30 => 1800,
            TimeFrame::Hour1 => 3600,
            TimeFrame::Hour4 => 14400,
            TimeFrame::Day1 => 86400,
            TimeFrame::Week1 => 604800,
        }
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional read shared by every component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Direction {
    /// +1 / -1 / 0
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            Direction::Bullish
        } else if score < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Direction::Neutral
    }
}

/// Error types for signal evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Insufficient data for {component}: need {required} bars, have {available}")]
    InsufficientData {
        component: String,
        required: usize,
        available: usize,
    },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("Missing auxiliary series: {0}")]
    MissingAuxiliarySeries(String),

    #[error("Configuration out of range: {field} {reason}")]
    ConfigurationOutOfRange { field: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Evaluation task failed: {0}")]
    TaskFailed(String),
}

impl EngineError {
    pub fn insufficient(component: &str, required: usize, available: usize) -> Self {
        EngineError::InsufficientData {
            component: component.to_string(),
            required,
            available,
        }
    }

    pub fn out_of_range(field: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigurationOutOfRange {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Failures that only knock out one component instead of the whole run
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. } | EngineError::MissingAuxiliarySeries(_)
        )
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn candle(open: &str, high: &str, low: &str, close: &str) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
            open: Decimal::from_str(open).unwrap(),
            high: Decimal::from_str(high).unwrap(),
            low: Decimal::from_str(low).unwrap(),
            close: Decimal::from_str(close).unwrap(),
            volume: Decimal::from(1500),
        }
    }

    #[test]
    fn test_candle_converts_to_bar() {
        let bar = PriceBar::try_from(&candle("101.25", "103.50", "100.75", "102.00")).unwrap();
        assert_eq!(bar.open, 101.25);
        assert_eq!(bar.high, 103.5);
        assert_eq!(bar.volume, 1500.0);
        assert!(bar.is_bullish());
    }

    #[test]
    fn test_candle_with_inverted_range_is_rejected() {
        let err = PriceBar::try_from(&candle("101", "99", "100", "100.5")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidBar { .. }));
    }

    #[test]
    fn test_timeframe_labels() {
        assert_eq!(TimeFrame::Hour4.as_str(), "4h");
        assert_eq!(TimeFrame::Day1.to_seconds(), 86400);
        assert_eq!(serde_json::to_string(&TimeFrame::Minute15).unwrap(), "\"15m\"");
    }

    #[test]
    fn test_degradable_errors() {
        assert!(EngineError::insufficient("trend", 200, 50).is_degradable());
        assert!(EngineError::MissingAuxiliarySeries("vix".to_string()).is_degradable());
        assert!(!EngineError::InvalidBar { index: 3, reason: "x".to_string() }.is_degradable());
    }
}
