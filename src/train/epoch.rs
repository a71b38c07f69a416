use tracing::debug;

use crate::data::loader::DataLoader;
use crate::error::Result;
use crate::network::model::SegmentationModel;
use crate::optim::sgd::Sgd;
use crate::train::progress::ProgressReporter;
use crate::train::reduce::CrossReplicaReducer;
use crate::train::replica::{Mode, ReplicaResult, ReplicaStepExecutor};

/// Reduced loss and metric summed over the steps of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochTotals {
    pub total_loss: f64,
    pub total_metric: f64,
    /// Batches actually observed.
    pub step_count: usize,
}

impl EpochTotals {
    pub fn add(&mut self, reduced: ReplicaResult) {
        self.total_loss += reduced.loss;
        self.total_metric += reduced.metric;
        self.step_count += 1;
    }

    /// Per-step averages over the loader's declared step count.
    ///
    /// The observed `step_count` is ignored, so a loader that yields more
    /// or fewer batches than it declares skews the average.
    pub fn average(&self, configured_steps: usize) -> ReplicaResult {
        let steps = configured_steps as f64;
        ReplicaResult {
            loss: self.total_loss / steps,
            metric: self.total_metric / steps,
        }
    }
}

/// Drives one full pass over a loader.
#[derive(Debug)]
pub struct EpochRunner {
    executor: ReplicaStepExecutor,
}

impl EpochRunner {
    pub fn new(executor: ReplicaStepExecutor) -> EpochRunner {
        EpochRunner { executor }
    }

    pub fn executor(&self) -> &ReplicaStepExecutor {
        &self.executor
    }

    /// Iterates `loader` once. Steps run strictly in order, each one
    /// reduced before the next batch is fetched. The first failing step
    /// aborts the pass.
    pub fn run_pass<M, L>(
        &self,
        model: &mut M,
        optimizer: &Sgd,
        loader: &mut L,
        mode: Mode,
        progress: &mut dyn ProgressReporter,
    ) -> Result<EpochTotals>
    where
        M: SegmentationModel,
        L: DataLoader + ?Sized,
    {
        let expected = loader.steps();
        progress.start(mode, expected);

        let mut totals = EpochTotals::default();
        for (step, batch) in loader.dataset().enumerate() {
            let batch = batch?;
            let results = self.executor.run_step(model, optimizer, &batch, mode)?;
            let reduced = CrossReplicaReducer::reduce(&results);
            totals.add(reduced);
            debug!(%mode, step, expected, loss = reduced.loss, metric = reduced.metric, "step done");
            progress.step(mode, step, reduced);
        }

        progress.finish(mode);
        if totals.step_count != expected {
            debug!(%mode, observed = totals.step_count, expected, "loader yielded a different step count than declared");
        }
        Ok(totals)
    }
}
