//! Options-chain magnet and liquidity-pull zones
//!
//! Works from a single open-interest snapshot plus the latest close. No state
//! carries between evaluations.

use crate::config::MagnetConfig;
use crate::factors::{Component, ComponentContext, ComponentKind};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One strike of an options-chain snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionStrike {
    pub strike: f64,
    pub call_oi: f64,
    pub put_oi: f64,
    #[serde(default)]
    pub call_gamma: f64,
    #[serde(default)]
    pub put_gamma: f64,
    #[serde(default)]
    pub call_volume: f64,
    #[serde(default)]
    pub put_volume: f64,
}

impl OptionStrike {
    pub fn total_oi(&self) -> f64 {
        self.call_oi + self.put_oi
    }

    pub fn net_gamma(&self) -> f64 {
        self.call_gamma - self.put_gamma
    }

    /// First field that is not finite, or negative (non-positive for the strike)
    fn invalid_field(&self) -> Option<&'static str> {
        if !self.strike.is_finite() || self.strike <= 0.0 {
            return Some("strike");
        }
        [
            ("call_oi", self.call_oi),
            ("put_oi", self.put_oi),
            ("call_gamma", self.call_gamma),
            ("put_gamma", self.put_gamma),
            ("call_volume", self.call_volume),
            ("put_volume", self.put_volume),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite() || *value < 0.0)
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsChain {
    pub strikes: Vec<OptionStrike>,
}

impl OptionsChain {
    pub fn new(strikes: Vec<OptionStrike>) -> Self {
        Self { strikes }
    }

    /// Strike minimising total option-holder payoff at expiry; ties go to the lowest strike
    pub fn max_pain(&self) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for candidate in &self.strikes {
            let k = candidate.strike;
            let pain: f64 = self
                .strikes
                .iter()
                .map(|s| s.call_oi * (k - s.strike).max(0.0) + s.put_oi * (s.strike - k).max(0.0))
                .sum();
            best = match best {
                Some((best_k, best_pain)) if pain > best_pain || (pain == best_pain && k >= best_k) => {
                    Some((best_k, best_pain))
                }
                _ => Some((k, pain)),
            };
        }
        best.map(|(k, _)| k)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Magnet,
    LiquidityPull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullDirection {
    Above,
    Below,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    StrongUp,
    WeakUp,
    Neutral,
    WeakDown,
    StrongDown,
}

impl Gravity {
    pub fn from_pct(pct: f64, config: &MagnetConfig) -> Self {
        if pct > config.strong_gravity_pct {
            Gravity::StrongUp
        } else if pct > config.weak_gravity_pct {
            Gravity::WeakUp
        } else if pct > -config.weak_gravity_pct {
            Gravity::Neutral
        } else if pct > -config.strong_gravity_pct {
            Gravity::WeakDown
        } else {
            Gravity::StrongDown
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Gravity::StrongUp => 100.0,
            Gravity::WeakUp => 50.0,
            Gravity::Neutral => 0.0,
            Gravity::WeakDown => -50.0,
            Gravity::StrongDown => -100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetZone {
    pub price: f64,
    pub kind: ZoneKind,
    pub strength: f64,
    pub call_open_interest: f64,
    pub put_open_interest: f64,
    pub pull_direction: PullDirection,
    /// Signed distance from spot, percent
    pub distance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetReport {
    pub spot: f64,
    pub magnet_price: f64,
    pub max_pain: f64,
    pub zones: Vec<MagnetZone>,
    pub gravity: Gravity,
    pub gravity_pct: f64,
    /// (call OI - put OI) / total OI × 100 over the window
    pub strike_sentiment: f64,
}

pub struct MagnetEngine<'a> {
    config: &'a MagnetConfig,
}

impl<'a> MagnetEngine<'a> {
    pub fn new(config: &'a MagnetConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, chain: &OptionsChain, spot: f64) -> Result<MagnetReport> {
        let cfg = self.config;
        let component = ComponentKind::Magnet.as_str();
        if chain.strikes.is_empty() {
            return Err(EngineError::insufficient(component, 1, 0));
        }
        if let Some((strike, field)) = chain
            .strikes
            .iter()
            .find_map(|s| s.invalid_field().map(|field| (s.strike, field)))
        {
            return Err(EngineError::MissingAuxiliarySeries(format!(
                "options_chain strike {} has an invalid {}",
                strike, field
            )));
        }

        let window: Vec<&OptionStrike> = chain
            .strikes
            .iter()
            .filter(|s| (s.strike - spot).abs() / spot * 100.0 <= cfg.window_pct)
            .filter(|s| s.total_oi() >= cfg.min_open_interest)
            .collect();
        if window.is_empty() {
            return Err(EngineError::insufficient(component, 1, 0));
        }

        let (weighted, total_weight) = window.iter().fold((0.0, 0.0), |(sum, total), s| {
            let weight = s.total_oi() + cfg.gamma_weight * 1000.0 * s.net_gamma().abs();
            (sum + weight * s.strike, total + weight)
        });
        let magnet_price = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            spot
        };

        // max_pain is Some for a non-empty chain
        let max_pain = chain.max_pain().unwrap_or(spot);

        // Zones rank the whole chain; only the magnet price is windowed
        let mut ranked: Vec<&OptionStrike> = chain.strikes.iter().collect();
        ranked.sort_by(|a, b| {
            b.total_oi()
                .total_cmp(&a.total_oi())
                .then(a.strike.total_cmp(&b.strike))
        });
        ranked.truncate(cfg.max_zones);

        let max_oi = ranked.first().map(|s| s.total_oi()).unwrap_or(0.0);
        let magnet_idx = ranked
            .iter()
            .enumerate()
            .filter(|(_, s)| (s.strike - magnet_price).abs() / magnet_price * 100.0 <= cfg.magnet_band_pct)
            .min_by(|(_, a), (_, b)| {
                (a.strike - magnet_price)
                    .abs()
                    .total_cmp(&(b.strike - magnet_price).abs())
            })
            .map(|(i, _)| i);

        let zones = ranked
            .iter()
            .enumerate()
            .map(|(i, s)| MagnetZone {
                price: s.strike,
                kind: if Some(i) == magnet_idx {
                    ZoneKind::Magnet
                } else {
                    ZoneKind::LiquidityPull
                },
                strength: if max_oi > 0.0 { s.total_oi() / max_oi * 100.0 } else { 0.0 },
                call_open_interest: s.call_oi,
                put_open_interest: s.put_oi,
                pull_direction: match s.net_gamma() {
                    g if g > 0.0 => PullDirection::Above,
                    g if g < 0.0 => PullDirection::Below,
                    _ => PullDirection::Neutral,
                },
                distance_pct: (s.strike - spot) / spot * 100.0,
            })
            .collect();

        let gravity_pct = (magnet_price - spot) / spot * 100.0;
        let gravity = Gravity::from_pct(gravity_pct, cfg);

        let calls: f64 = window.iter().map(|s| s.call_oi).sum();
        let puts: f64 = window.iter().map(|s| s.put_oi).sum();
        let strike_sentiment = if calls + puts > 0.0 {
            (calls - puts) / (calls + puts) * 100.0
        } else {
            0.0
        };

        debug!(
            spot,
            magnet_price,
            max_pain,
            gravity = ?gravity,
            strike_sentiment,
            "magnet evaluated"
        );

        Ok(MagnetReport {
            spot,
            magnet_price,
            max_pain,
            zones,
            gravity,
            gravity_pct,
            strike_sentiment,
        })
    }
}

impl<'a> Component for MagnetEngine<'a> {
    type Output = MagnetReport;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Magnet
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<MagnetReport> {
        let chain = ctx
            .options_chain
            .ok_or_else(|| EngineError::MissingAuxiliarySeries("options_chain".to_string()))?;
        let spot = ctx
            .last_close()
            .ok_or_else(|| EngineError::insufficient(self.kind().as_str(), 1, 0))?;
        self.analyze(chain, spot)
    }
}
