//! Best-model selection.
//!
//! Phases, by 0-based epoch index:
//! - `BelowMinEpoch` (epoch < min_epoch): never saves.
//! - `FirstSave` (epoch == min_epoch): always saves, whatever the score,
//!   so a checkpoint exists from then on.
//! - `Tracking` (epoch > min_epoch): saves when the weighted sum is at or
//!   below the running minimum.
//!
//! The policy only decides; the caller persists and then calls `commit`.
//! A save that never completed is therefore never reported as best.

use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

/// Blend of validation loss and metric; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub loss: f64,
    pub metric: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights { loss: 0.7, metric: 0.3 }
    }
}

impl ScoreWeights {
    /// `loss_weight * val_loss + metric_weight * (1 - val_metric)`
    pub fn weighted_sum(&self, val_loss: f64, val_metric: f64) -> f64 {
        self.loss * val_loss + self.metric * (1.0 - val_metric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPhase {
    BelowMinEpoch,
    FirstSave,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDecision {
    /// Nothing to persist this epoch.
    Skip(CheckpointPhase),
    /// First eligible epoch; persisted unconditionally.
    SaveFirst,
    /// Score at or below the running minimum.
    SaveImproved,
}

impl CheckpointDecision {
    pub fn should_save(self) -> bool {
        !matches!(self, CheckpointDecision::Skip(_))
    }
}

/// The checkpoint currently judged best.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModelState {
    pub epoch: usize,
    pub weighted_sum: f64,
    /// Model file written for this checkpoint.
    pub location: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    min_epoch: usize,
    weights: ScoreWeights,
    best: Option<BestModelState>,
}

impl CheckpointPolicy {
    pub fn new(min_epoch: usize, weights: ScoreWeights) -> CheckpointPolicy {
        CheckpointPolicy { min_epoch, weights, best: None }
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    pub fn phase(&self, epoch: usize) -> CheckpointPhase {
        match epoch {
            e if e < self.min_epoch => CheckpointPhase::BelowMinEpoch,
            e if e == self.min_epoch => CheckpointPhase::FirstSave,
            _ => CheckpointPhase::Tracking,
        }
    }

    pub fn running_minimum(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.weighted_sum)
    }

    pub fn best(&self) -> Option<&BestModelState> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<BestModelState> {
        self.best
    }

    /// Decides whether the model after `epoch` must be persisted.
    pub fn evaluate(&self, epoch: usize, weighted_sum: f64) -> CheckpointDecision {
        match self.phase(epoch) {
            CheckpointPhase::BelowMinEpoch => CheckpointDecision::Skip(CheckpointPhase::BelowMinEpoch),
            CheckpointPhase::FirstSave => CheckpointDecision::SaveFirst,
            CheckpointPhase::Tracking => match self.running_minimum() {
                // Tracking without a stored minimum means the first save
                // never happened; treat this epoch as the first one.
                None => CheckpointDecision::SaveFirst,
                Some(min) if weighted_sum <= min => CheckpointDecision::SaveImproved,
                Some(_) => CheckpointDecision::Skip(CheckpointPhase::Tracking),
            },
        }
    }

    /// Records a completed save. Only call after persisting succeeded for a
    /// decision that asked for it.
    pub fn commit(&mut self, epoch: usize, weighted_sum: f64, location: &Path) {
        self.best = Some(BestModelState { epoch, weighted_sum, location: location.to_path_buf() });
    }
}
