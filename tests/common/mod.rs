#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde::Serialize;

use histoseg::error::PersistError;
use histoseg::train::{DataConfig, History, ScoreWeights, StopCriteria, StopGate, TaskType, TrainConfig};
use histoseg::{ExperimentStore, PixelNetwork};

pub fn config(epochs: usize, min_epoch: usize) -> TrainConfig {
    TrainConfig {
        run_name: "test-run".into(),
        save_path: PathBuf::from("out"),
        global_batch_size: 4,
        img_dims: 8,
        input_channels: 3,
        epochs,
        threshold: 0.5,
        task_type: TaskType::Binary,
        classes: 2,
        replicas: 2,
        learning_rate: 0.5,
        hidden_units: vec![4],
        seed: 42,
        min_epoch,
        score_weights: ScoreWeights::default(),
        stop_criteria: StopCriteria {
            first: StopGate { epochs: 5, metric: 0.5 },
            second: StopGate { epochs: 10, metric: 0.7 },
        },
        early_stopping: false,
        log_histograms: false,
        telemetry_path: None,
        data: DataConfig::Synthetic { train_samples: 8, valid_samples: 4 },
    }
}

pub fn model(config: &TrainConfig) -> PixelNetwork {
    PixelNetwork::from_spec(&config.network_spec(), config.seed)
}

/// One recorded `save` call.
#[derive(Debug, Clone)]
pub struct SaveCall {
    pub destination: PathBuf,
    pub history_len: usize,
    pub model: serde_json::Value,
}

/// Keeps saves in memory instead of writing files.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub calls: Vec<SaveCall>,
    pub fail: bool,
}

impl RecordingStore {
    pub fn saves_into(&self, dir: &Path) -> Vec<&SaveCall> {
        self.calls.iter().filter(|c| c.destination == dir).collect()
    }
}

impl ExperimentStore for &mut RecordingStore {
    fn save<M: Serialize>(
        &mut self,
        model: &M,
        _config: &TrainConfig,
        history: &History,
        run_name: &str,
        destination: &Path,
    ) -> Result<PathBuf, PersistError> {
        if self.fail {
            return Err(PersistError::Io {
                path: destination.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
            });
        }
        self.calls.push(SaveCall {
            destination: destination.to_path_buf(),
            history_len: history.len(),
            model: serde_json::to_value(model).expect("model serializes"),
        });
        Ok(destination.join(format!("{run_name}_model.json")))
    }
}
