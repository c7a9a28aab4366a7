//! Component contract
//!
//! Every detector that feeds the composite implements [`Component`]. The
//! engine builds one [`ComponentContext`] per evaluation and hands it to each
//! component in a fixed order.

use crate::macro_regime::AuxiliarySeries;
use crate::magnet::OptionsChain;
use crate::orderflow::FlowTape;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Everything a component may read during one evaluation
#[derive(Debug, Clone, Copy)]
pub struct ComponentContext<'a> {
    pub bars: &'a [PriceBar],
    pub tape: &'a FlowTape,
    pub auxiliary: Option<&'a AuxiliarySeries>,
    pub options_chain: Option<&'a OptionsChain>,
}

impl<'a> ComponentContext<'a> {
    /// Latest close; bars are non-empty once validated
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Detector feeding the composite
pub trait Component {
    type Output;

    fn kind(&self) -> ComponentKind;

    /// Minimum bar count before `evaluate` can produce anything
    fn required_bars(&self) -> usize;

    fn evaluate(&self, ctx: &ComponentContext<'_>) -> Result<Self::Output>;
}

/// Check the lookback, then evaluate
pub fn run<C: Component>(component: &C, ctx: &ComponentContext<'_>) -> Result<C::Output> {
    let required = component.required_bars();
    if ctx.bars.len() < required {
        return Err(EngineError::insufficient(
            component.kind().as_str(),
            required,
            ctx.bars.len(),
        ));
    }
    component.evaluate(ctx)
}

/// Component identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Gaps,
    Patterns,
    Squeeze,
    Fear,
    Trend,
    CrossAsset,
    Magnet,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Gaps => "gaps",
            ComponentKind::Patterns => "patterns",
            ComponentKind::Squeeze => "squeeze",
            ComponentKind::Fear => "fear",
            ComponentKind::Trend => "trend",
            ComponentKind::CrossAsset => "cross_asset",
            ComponentKind::Magnet => "magnet",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component that could not run, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedComponent {
    pub component: ComponentKind,
    pub reason: String,
}
