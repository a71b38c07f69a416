pub mod guarded;
pub mod sink;

pub use guarded::GuardedTelemetry;
pub use sink::{HistogramSummary, JsonlTelemetry, NoopTelemetry, TelemetrySink};
