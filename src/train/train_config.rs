use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::data::loader::DataLoader;
use crate::data::stats::ChannelStats;
use crate::data::synthetic::SyntheticTiles;
use crate::data::tiles::TileFolderLoader;
use crate::data::transform::TransformOp;
use crate::error::{ConfigError, Result};
use crate::network::spec::NetworkSpec;
use crate::train::checkpoint::ScoreWeights;
use crate::train::early_stop::StopCriteria;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// One foreground channel.
    Binary,
    /// One-hot masks over `classes` channels.
    Multi,
}

/// Where batches come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataConfig {
    /// Seeded synthetic tiles, for smoke runs.
    Synthetic { train_samples: usize, valid_samples: usize },
    /// PNG folders laid out as `<dir>/images` and `<dir>/masks`.
    Tiles {
        train_dir: PathBuf,
        valid_dir: PathBuf,
        /// Transform names, applied in order to every tile.
        #[serde(default)]
        transforms: Vec<String>,
        /// Needed by `Standardize`.
        #[serde(default)]
        channel_stats: Option<ChannelStats>,
    },
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig::Synthetic { train_samples: 32, valid_samples: 8 }
    }
}

fn default_input_channels() -> usize { 3 }
fn default_classes() -> usize { 2 }
fn default_replicas() -> usize { 1 }
fn default_learning_rate() -> f64 { 0.05 }
fn default_hidden_units() -> Vec<usize> { vec![8] }
fn default_min_epoch() -> usize { 10 }

/// Configuration of one training run.
///
/// Loaded from JSON; everything with a default may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub run_name: String,
    /// Checkpoints go to `<save_path>/models`, the final model to
    /// `<save_path>/models/final`.
    pub save_path: PathBuf,
    pub global_batch_size: usize,
    /// Tiles are `img_dims` x `img_dims`.
    pub img_dims: usize,
    #[serde(default = "default_input_channels")]
    pub input_channels: usize,
    pub epochs: usize,
    /// Probability cutoff used to binarise predictions for the metric.
    pub threshold: f64,
    pub task_type: TaskType,
    /// Class count for `TaskType::Multi`; ignored for binary tasks.
    #[serde(default = "default_classes")]
    pub classes: usize,
    /// Number of concurrent replicas a global batch is split across.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Widths of the hidden per-pixel layers.
    #[serde(default = "default_hidden_units")]
    pub hidden_units: Vec<usize>,
    #[serde(default)]
    pub seed: u64,
    /// First epoch (0-based) at which a checkpoint may be written.
    #[serde(default = "default_min_epoch")]
    pub min_epoch: usize,
    #[serde(default)]
    pub score_weights: ScoreWeights,
    pub stop_criteria: StopCriteria,
    /// Let a positive early-stop check end the run.
    #[serde(default)]
    pub early_stopping: bool,
    /// Emit parameter histograms to telemetry after each validation pass.
    #[serde(default)]
    pub log_histograms: bool,
    /// JSON-lines telemetry file; telemetry is off when unset.
    #[serde(default)]
    pub telemetry_path: Option<PathBuf>,
    #[serde(default)]
    pub data: DataConfig,
}

impl TrainConfig {
    pub fn load_json(path: &Path) -> Result<TrainConfig, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: TrainConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("global_batch_size", self.global_batch_size),
            ("img_dims", self.img_dims),
            ("input_channels", self.input_channels),
            ("epochs", self.epochs),
            ("replicas", self.replicas),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.hidden_units.contains(&0) {
            return Err(ConfigError::Zero { field: "hidden_units" });
        }
        if self.threshold.is_nan() || self.threshold <= 0.0 || self.threshold >= 1.0 {
            return Err(ConfigError::OutOfUnitRange { field: "threshold", value: self.threshold });
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(ConfigError::Zero { field: "learning_rate" });
        }
        for (field, value) in [
            ("score_weights.loss", self.score_weights.loss),
            ("score_weights.metric", self.score_weights.metric),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if self.task_type == TaskType::Multi && self.classes < 2 {
            return Err(ConfigError::TooFewClasses(self.classes));
        }
        self.stop_criteria.validate()?;
        if let DataConfig::Tiles { transforms, channel_stats, .. } = &self.data {
            TransformOp::resolve_all(transforms, channel_stats.as_ref(), self.input_channels)?;
        }
        Ok(())
    }

    /// Channels of a mask (and of the model output).
    pub fn mask_channels(&self) -> usize {
        match self.task_type {
            TaskType::Binary => 1,
            TaskType::Multi => self.classes,
        }
    }

    pub fn network_spec(&self) -> NetworkSpec {
        NetworkSpec::segmentation(self.input_channels, &self.hidden_units, self.mask_channels())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.save_path.join("models")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.models_dir().join("final")
    }

    /// Builds the training and validation loaders described by `data`.
    pub fn loaders(&self) -> Result<(Box<dyn DataLoader>, Box<dyn DataLoader>)> {
        match &self.data {
            DataConfig::Synthetic { train_samples, valid_samples } => {
                let tiles = |seed| SyntheticTiles::new(seed, self.img_dims, self.input_channels, self.mask_channels());
                let train = tiles(self.seed).loader(*train_samples, self.global_batch_size, true)?;
                let valid = tiles(self.seed.wrapping_add(1)).loader(*valid_samples, self.global_batch_size, false)?;
                Ok((Box::new(train), Box::new(valid)))
            }
            DataConfig::Tiles { train_dir, valid_dir, transforms, channel_stats } => {
                let ops = TransformOp::resolve_all(transforms, channel_stats.as_ref(), self.input_channels)?;
                let open = |dir: &Path| {
                    TileFolderLoader::open(dir, self.img_dims, self.input_channels, self.mask_channels(), self.global_batch_size)
                };
                let train = open(train_dir.as_path())?.with_transforms(ops.clone()).for_training(self.seed);
                // Flips are augmentation; validation only keeps value transforms.
                let valid_ops = ops
                    .into_iter()
                    .filter(|op| !matches!(op, TransformOp::FlipHorizontal | TransformOp::FlipVertical))
                    .collect();
                let valid = open(valid_dir.as_path())?.with_transforms(valid_ops);
                Ok((Box::new(train), Box::new(valid)))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::train::early_stop::StopGate;

    pub(crate) fn sample_config() -> TrainConfig {
        TrainConfig {
            run_name: "unit".into(),
            save_path: PathBuf::from("out"),
            global_batch_size: 4,
            img_dims: 6,
            input_channels: 3,
            epochs: 3,
            threshold: 0.5,
            task_type: TaskType::Binary,
            classes: 2,
            replicas: 2,
            learning_rate: 0.1,
            hidden_units: vec![4],
            seed: 7,
            min_epoch: 1,
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

    #[test]
    fn minimal_json_fills_defaults() {
        let json = r#"{
            "run_name": "r",
            "save_path": "out",
            "global_batch_size": 8,
            "img_dims": 64,
            "epochs": 20,
            "threshold": 0.5,
            "task_type": "binary",
            "stop_criteria": {
                "first": { "epochs": 5, "metric": 0.5 },
                "second": { "epochs": 10, "metric": 0.7 }
            }
        }"#;
        let config: TrainConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.min_epoch, 10);
        assert_eq!(config.score_weights, ScoreWeights { loss: 0.7, metric: 0.3 });
        assert_eq!(config.replicas, 1);
        assert!(!config.early_stopping);
        assert_eq!(config.data, DataConfig::default());
    }

    #[test]
    fn tile_source_parses_with_transforms() {
        let json = r#"{ "source": "tiles", "train_dir": "t", "valid_dir": "v", "transforms": ["Scale", "FlipVertical"] }"#;
        let data: DataConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(data, DataConfig::Tiles { ref transforms, .. } if transforms.len() == 2));
    }

    #[test]
    fn rejects_zero_batch_and_bad_threshold() {
        let mut c = sample_config();
        c.global_batch_size = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Zero { field: "global_batch_size" })));

        let mut c = sample_config();
        c.threshold = 1.0;
        assert!(matches!(c.validate(), Err(ConfigError::OutOfUnitRange { field: "threshold", .. })));
    }

    #[test]
    fn unknown_transform_fails_validation() {
        let mut c = sample_config();
        c.data = DataConfig::Tiles {
            train_dir: "t".into(),
            valid_dir: "v".into(),
            transforms: vec!["getBrightness".into()],
            channel_stats: None,
        };
        assert!(matches!(c.validate(), Err(ConfigError::Data(_))));
    }

    #[test]
    fn multi_class_spec_matches_classes() {
        let mut c = sample_config();
        c.task_type = TaskType::Multi;
        c.classes = 3;
        let spec = c.network_spec();
        assert_eq!(spec.layers.last().map(|l| l.size), Some(3));
        assert_eq!(c.mask_channels(), 3);
    }

    #[test]
    fn synthetic_loaders_drop_train_remainder_only() {
        let mut c = sample_config();
        c.data = DataConfig::Synthetic { train_samples: 10, valid_samples: 6 };
        let (train, valid) = c.loaders().unwrap();
        assert_eq!(train.steps(), 2);
        assert_eq!(valid.steps(), 2);
    }
}
