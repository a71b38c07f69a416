pub mod checkpoint;
pub mod early_stop;
pub mod epoch;
pub mod history;
pub mod orchestrator;
pub mod progress;
pub mod reduce;
pub mod replica;
pub mod train_config;

pub use checkpoint::{BestModelState, CheckpointDecision, CheckpointPhase, CheckpointPolicy, ScoreWeights};
pub use early_stop::{EarlyStopPolicy, StopCriteria, StopGate};
pub use epoch::{EpochRunner, EpochTotals};
pub use history::{EpochRecord, History};
pub use orchestrator::{TrainingOrchestrator, TrainingOutcome};
pub use progress::{BarProgress, NoProgress, ProgressReporter};
pub use reduce::CrossReplicaReducer;
pub use replica::{Mode, ReplicaResult, ReplicaStepExecutor};
pub use train_config::{DataConfig, TaskType, TrainConfig};
