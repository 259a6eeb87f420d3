//! Position computation: unit normalization, metric reads, and event mapping.

pub mod event_normalizer;
pub mod metrics_calculator;
pub mod normalizer;

pub use event_normalizer::{EventNormalizer, NormalizedEvent};
pub use metrics_calculator::{
    build_snapshot, CalculationError, MetricsCalculator, PositionReport, ReserveExposure,
};
