pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod metric;
pub mod optim;
pub mod data;
pub mod train;
pub mod persist;
pub mod telemetry;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::pixel::PixelLayer;
pub use network::{NetworkSpec, PixelNetwork, SegmentationModel};
pub use loss::LossType;
pub use optim::sgd::Sgd;
pub use data::{Batch, DataLoader, InMemoryLoader, SyntheticTiles, Tensor4, TileFolderLoader};
pub use train::{TrainConfig, TrainingOrchestrator, TrainingOutcome};
pub use persist::{ExperimentStore, JsonExperimentStore};
pub use telemetry::{JsonlTelemetry, NoopTelemetry, TelemetrySink};
pub use error::{Result, TrainError};
