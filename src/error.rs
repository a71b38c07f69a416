//! Error types for training runs.
//!
//! `TrainError` is fatal: it aborts the run and reaches the caller.
//! `TelemetryError` is recovered inside the orchestrator and never escapes it.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while training.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("model has no trainable parameters")]
    NoTrainableParameters,

    #[error("replica worker pool failed: {0}")]
    Device(String),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("{pass} loader declares zero steps")]
    EmptyLoader { pass: &'static str },

    #[error("history is append-only: expected epoch {expected}, got {got}")]
    HistoryOrder { expected: usize, got: usize },
}

impl TrainError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

/// Invalid run configuration, detected before any training starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must lie in (0, 1), got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error(
        "stop criteria out of order: first gate (epoch {first_epoch}, metric {first_metric}) \
         must be earlier and looser than second gate (epoch {second_epoch}, metric {second_metric})"
    )]
    StopCriteriaOrder {
        first_epoch: usize,
        first_metric: f64,
        second_epoch: usize,
        second_metric: f64,
    },

    #[error("multi-class task needs at least 2 classes, got {0}")]
    TooFewClasses(usize),

    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Errors raised by data loaders and transforms.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("unknown transform '{0}' (expected one of: Scale, FlipHorizontal, FlipVertical, Standardize)")]
    UnknownTransform(String),

    #[error("Standardize needs {expected} channel means and stds, got {means} means and {stds} stds")]
    MissingStatistics {
        expected: usize,
        means: usize,
        stds: usize,
    },

    #[error("no image tiles found in {0}")]
    EmptyFolder(PathBuf),

    #[error("tile {path} is {width}x{height}, expected {dims}x{dims}")]
    TileSize {
        path: PathBuf,
        width: u32,
        height: u32,
        dims: usize,
    },

    #[error("no mask found for tile {0}")]
    MissingMask(PathBuf),

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while writing experiments to storage.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by telemetry sinks. Always recovered.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("telemetry serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = TrainError> = std::result::Result<T, E>;
