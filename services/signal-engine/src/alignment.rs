//! Multi-timeframe alignment

use crate::config::{AlignmentConfig, ScoreScale};
use crate::scorer::CompositeResult;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub aligned: bool,
    pub alignment_strength: f64,
    pub direction: Direction,
}

impl AlignmentResult {
    fn not_aligned() -> Self {
        Self {
            aligned: false,
            alignment_strength: 0.0,
            direction: Direction::Neutral,
        }
    }
}

/// Two results agree when they cover the same symbol, point the same
/// non-neutral way and both clear the scale's minimum strength.
pub fn check_alignment(
    short: &CompositeResult,
    long: &CompositeResult,
    config: &AlignmentConfig,
) -> AlignmentResult {
    if short.symbol != long.symbol || short.scale != long.scale {
        return AlignmentResult::not_aligned();
    }
    if short.direction.is_neutral() || short.direction != long.direction {
        return AlignmentResult::not_aligned();
    }

    let min_strength = match short.scale {
        ScoreScale::Weighted => config.min_strength_weighted,
        ScoreScale::Points => config.min_strength_points,
    };
    if short.strength() < min_strength || long.strength() < min_strength {
        return AlignmentResult::not_aligned();
    }

    AlignmentResult {
        aligned: true,
        alignment_strength: ((short.strength() + long.strength()) / 2.0).round(),
        direction: short.direction,
    }
}
