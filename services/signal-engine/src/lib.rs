//! Signal Engine Library
//!
//! Composite technical-signal engine: turns OHLCV bars (and optionally
//! auxiliary macro series and an options-chain snapshot) into a bounded score
//! and a discrete trading recommendation.

pub mod alignment;
pub mod bars;
pub mod config;
pub mod engine;
pub mod factors;
pub mod fear;
pub mod gaps;
pub mod indicators;
pub mod macro_regime;
pub mod magnet;
pub mod orderflow;
pub mod patterns;
pub mod scorer;
pub mod squeeze;
pub mod trend;
pub mod types;

// Re-export main types for convenience
pub use alignment::{check_alignment, AlignmentResult};
pub use bars::BarSeries;
pub use config::{EngineConfig, ScoreScale, Strictness};
pub use engine::{EngineReport, EvaluationInput, MultiTimeframeReport, SignalEngine};
pub use factors::{Component, ComponentContext, ComponentKind, SkippedComponent};
pub use gaps::{GapKind, GapReport, GapZone};
pub use macro_regime::{AuxiliarySeries, CrossAssetReport, RegimeState};
pub use magnet::{Gravity, MagnetReport, MagnetZone, OptionStrike, OptionsChain};
pub use orderflow::{FlowTape, OrderFlowMethod, OrderFlowSample, OrderFlowSummary};
pub use patterns::{DipRecoveryPattern, MarketPhase, PatternReport};
pub use scorer::{Action, CompositeResult, Confidence};
pub use squeeze::{SqueezeReport, SqueezeState};
pub use trend::{TrendMeasurements, TrendReport};
pub use types::*;
