//! Indicator kit
//!
//! Pure functions over closes or bars. Series functions return one value per
//! fully-warmed window, so `sma_series(v, p)` has `v.len() - p + 1` entries and
//! its last entry lines up with the last input. Everything returns `None` (or
//! an empty series) when the input is too short.

use crate::types::PriceBar;

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Rolling simple moving average
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period` values
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(ema);
    for value in &values[period..] {
        ema = (value - ema) * multiplier + ema;
        out.push(ema);
    }
    out
}

/// Relative Strength Index with Wilder smoothing
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let p = period as f64;
    for change in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MacdOutput {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line, signal line and histogram at the last bar
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdOutput> {
    if fast == 0 || slow <= fast || signal == 0 {
        return None;
    }
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);
    if slow_ema.is_empty() {
        return None;
    }

    // Align the fast series to the slow one (both end at the last close)
    let offset = fast_ema.len() - slow_ema.len();
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, slow)| fast_ema[i + offset] - slow)
        .collect();

    let signal_series = ema_series(&line, signal);
    let signal_value = *signal_series.last()?;
    let line_value = *line.last()?;

    Some(MacdOutput {
        line: line_value,
        signal: signal_value,
        histogram: line_value - signal_value,
    })
}

/// True range per bar; the first bar uses its own high-low
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.range()
            } else {
                let prev_close = bars[i - 1].close;
                bar.range()
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs())
            }
        })
        .collect()
}

/// Average True Range with Wilder smoothing
pub fn atr_series(bars: &[PriceBar], period: usize) -> Vec<f64> {
    let tr = true_range(bars);
    if period == 0 || tr.len() < period {
        return Vec::new();
    }
    let p = period as f64;
    let mut atr = tr[..period].iter().sum::<f64>() / p;
    let mut out = Vec::with_capacity(tr.len() - period + 1);
    out.push(atr);
    for value in &tr[period..] {
        atr = (atr * (p - 1.0) + value) / p;
        out.push(atr);
    }
    out
}

pub fn atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    atr_series(bars, period).last().copied()
}

/// Average Directional Index, Wilder smoothing throughout
pub fn adx(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < 2 * period {
        return None;
    }

    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    let mut tr = Vec::with_capacity(bars.len() - 1);
    for w in bars.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        let up_move = curr.high - prev.high;
        let down_move = prev.low - curr.low;
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
        tr.push(
            curr.range()
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs()),
        );
    }

    let p = period as f64;
    let mut s_plus: f64 = plus_dm[..period].iter().sum();
    let mut s_minus: f64 = minus_dm[..period].iter().sum();
    let mut s_tr: f64 = tr[..period].iter().sum();

    let mut dx_values = vec![directional_index(s_plus, s_minus, s_tr)];
    for i in period..tr.len() {
        s_plus = s_plus - s_plus / p + plus_dm[i];
        s_minus = s_minus - s_minus / p + minus_dm[i];
        s_tr = s_tr - s_tr / p + tr[i];
        dx_values.push(directional_index(s_plus, s_minus, s_tr));
    }

    if dx_values.len() < period {
        return None;
    }
    let mut adx = dx_values[..period].iter().sum::<f64>() / p;
    for dx in &dx_values[period..] {
        adx = (adx * (p - 1.0) + dx) / p;
    }
    Some(adx)
}

fn directional_index(plus: f64, minus: f64, tr: f64) -> f64 {
    if tr <= 0.0 {
        return 0.0;
    }
    let di_plus = plus / tr * 100.0;
    let di_minus = minus / tr * 100.0;
    let sum = di_plus + di_minus;
    if sum <= 0.0 {
        0.0
    } else {
        (di_plus - di_minus).abs() / sum * 100.0
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// z-score of `value` against `sample`; `None` when the sample has no spread
pub fn zscore(value: f64, sample: &[f64]) -> Option<f64> {
    let m = mean(sample)?;
    let sd = std_dev(sample)?;
    if sd <= f64::EPSILON {
        return None;
    }
    Some((value - m) / sd)
}

pub fn highest(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn lowest(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Upper/middle/lower band triple
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bands {
    /// Strictly inside `other` on both sides
    pub fn is_inside(&self, other: &Bands) -> bool {
        self.upper < other.upper && self.lower > other.lower
    }
}

/// Bollinger Bands: SMA ± mult·σ over the last `period` closes
pub fn bollinger(closes: &[f64], period: usize, mult: f64) -> Option<Bands> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let middle = mean(window)?;
    let sd = std_dev(window)?;
    Some(Bands {
        upper: middle + mult * sd,
        middle,
        lower: middle - mult * sd,
    })
}

/// Bollinger Bands for every fully-warmed window, aligned like `sma_series`
pub fn bollinger_series(closes: &[f64], period: usize, mult: f64) -> Vec<Bands> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }
    (period..=closes.len())
        .filter_map(|end| bollinger(&closes[..end], period, mult))
        .collect()
}

/// Keltner Channel for every bar where both the SMA and the ATR are warm;
/// the last entry lines up with the last bar
pub fn keltner_series(bars: &[PriceBar], period: usize, atr_period: usize, mult: f64) -> Vec<Bands> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middles = sma_series(&closes, period);
    let ranges = atr_series(bars, atr_period);
    let len = middles.len().min(ranges.len());
    middles[middles.len() - len..]
        .iter()
        .zip(&ranges[ranges.len() - len..])
        .map(|(&middle, &range)| Bands {
            upper: middle + mult * range,
            middle,
            lower: middle - mult * range,
        })
        .collect()
}

/// Keltner Channel: SMA of closes ± mult·ATR
pub fn keltner(bars: &[PriceBar], period: usize, atr_period: usize, mult: f64) -> Option<Bands> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middle = sma(&closes, period)?;
    let range = atr(bars, atr_period)?;
    Some(Bands {
        upper: middle + mult * range,
        middle,
        lower: middle - mult * range,
    })
}

/// Volume-weighted average of typical price over the last `period` bars
pub fn vwap(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    let volume: f64 = window.iter().map(|b| b.volume).sum();
    if volume <= 0.0 {
        return None;
    }
    let pv: f64 = window.iter().map(|b| b.typical_price() * b.volume).sum();
    Some(pv / volume)
}
