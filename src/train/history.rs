use serde::{Serialize, Deserialize};

use crate::error::{Result, TrainError};

/// Per-epoch scores of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 0-based epoch index.
    pub epoch: usize,
    pub train_loss: f64,
    pub train_metric: f64,
    pub val_loss: f64,
    pub val_metric: f64,
    /// Blended validation score used to rank checkpoints; lower is better.
    pub weighted_sum: f64,
}

/// Append-only record of a run, one entry per completed epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    records: Vec<EpochRecord>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Appends the next epoch. Epochs must arrive in order without gaps.
    pub fn push(&mut self, record: EpochRecord) -> Result<()> {
        let expected = self.records.len();
        if record.epoch != expected {
            return Err(TrainError::HistoryOrder { expected, got: record.epoch });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    pub fn weighted_sum(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.weighted_sum).collect()
    }
}
