use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::loader::DataLoader;
use crate::error::{Result, TrainError};
use crate::network::model::SegmentationModel;
use crate::optim::sgd::Sgd;
use crate::persist::experiment::{ExperimentStore, JsonExperimentStore};
use crate::telemetry::guarded::GuardedTelemetry;
use crate::telemetry::sink::TelemetrySink;
use crate::train::checkpoint::{BestModelState, CheckpointDecision, CheckpointPhase, CheckpointPolicy};
use crate::train::early_stop::EarlyStopPolicy;
use crate::train::epoch::EpochRunner;
use crate::train::history::{EpochRecord, History};
use crate::train::progress::{NoProgress, ProgressReporter};
use crate::train::replica::{Mode, ReplicaStepExecutor};
use crate::train::train_config::TrainConfig;

/// Mutable state of one run, owned by the orchestrator and threaded
/// through the epoch loop.
#[derive(Debug)]
struct RunState {
    history: History,
    checkpoint: CheckpointPolicy,
    checkpoints_written: usize,
    stopped_at: Option<usize>,
}

/// What a finished run hands back.
#[derive(Debug)]
pub struct TrainingOutcome<M> {
    /// The model after the last completed epoch.
    pub model: M,
    pub history: History,
    /// Best checkpoint written, if the run reached `min_epoch`.
    pub best: Option<BestModelState>,
    /// Number of best-model checkpoints written.
    pub checkpoints_written: usize,
    /// Model file of the unconditional final save.
    pub final_location: PathBuf,
    /// Epoch at which early stopping ended the run.
    pub stopped_at: Option<usize>,
}

/// Owns the epoch loop: train pass, validation pass, bookkeeping,
/// checkpointing and the final save.
pub struct TrainingOrchestrator<M, S = JsonExperimentStore> {
    model: M,
    optimizer: Sgd,
    runner: EpochRunner,
    early_stop: EarlyStopPolicy,
    store: S,
    telemetry: GuardedTelemetry,
    progress: Box<dyn ProgressReporter>,
    epoch_tx: Option<mpsc::Sender<EpochRecord>>,
    config: TrainConfig,
    state: RunState,
}

impl<M, S> TrainingOrchestrator<M, S>
where
    M: SegmentationModel + Serialize,
    S: ExperimentStore,
{
    /// Validates `config` against itself and the model before anything runs.
    pub fn new(model: M, config: TrainConfig, store: S) -> Result<Self> {
        config.validate()?;
        if model.trainable_parameter_count() == 0 {
            return Err(TrainError::NoTrainableParameters);
        }
        if model.input_channels() != config.input_channels {
            return Err(TrainError::shape(format!(
                "model takes {} input channels, config declares {}",
                model.input_channels(),
                config.input_channels
            )));
        }
        if model.output_channels() != config.mask_channels() {
            return Err(TrainError::shape(format!(
                "model predicts {} channels, {:?} task needs {}",
                model.output_channels(),
                config.task_type,
                config.mask_channels()
            )));
        }

        let executor = ReplicaStepExecutor::new(
            config.replicas,
            config.global_batch_size,
            config.img_dims,
            config.threshold,
            config.network_spec().loss,
        )?;
        let early_stop = EarlyStopPolicy::new(config.stop_criteria, config.early_stopping)?;

        Ok(TrainingOrchestrator {
            model,
            optimizer: Sgd::new(config.learning_rate),
            runner: EpochRunner::new(executor),
            early_stop,
            store,
            telemetry: GuardedTelemetry::disabled(),
            progress: Box::new(NoProgress),
            epoch_tx: None,
            state: RunState {
                history: History::new(),
                checkpoint: CheckpointPolicy::new(config.min_epoch, config.score_weights),
                checkpoints_written: 0,
                stopped_at: None,
            },
            config,
        })
    }

    pub fn with_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = GuardedTelemetry::new(sink);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// One `EpochRecord` is sent per completed epoch. A dropped receiver
    /// is ignored.
    pub fn with_epoch_events(mut self, tx: mpsc::Sender<EpochRecord>) -> Self {
        self.epoch_tx = Some(tx);
        self
    }

    /// Runs epochs `0..config.epochs` (fewer if early stopping is enabled
    /// and triggers), then saves the final model unconditionally.
    pub fn fit(mut self, train: &mut dyn DataLoader, valid: &mut dyn DataLoader) -> Result<TrainingOutcome<M>> {
        if train.steps() == 0 {
            return Err(TrainError::EmptyLoader { pass: "train" });
        }
        if valid.steps() == 0 {
            return Err(TrainError::EmptyLoader { pass: "validation" });
        }

        let run_name = self.config.run_name.clone();
        self.telemetry.init(&run_name);
        info!(
            run = %run_name,
            epochs = self.config.epochs,
            replicas = self.runner.executor().replicas(),
            params = self.model.trainable_parameter_count(),
            "starting training"
        );

        for epoch in 0..self.config.epochs {
            self.run_epoch(epoch, train, valid)?;
            if self.state.stopped_at.is_some() {
                break;
            }
        }

        let final_dir = self.config.final_dir();
        info!(dir = %final_dir.display(), "saving final model");
        let final_location = self.store.save(
            &self.model,
            &self.config,
            &self.state.history,
            &run_name,
            &final_dir,
        )?;
        self.telemetry.finish();

        let RunState { history, checkpoint, checkpoints_written, stopped_at } = self.state;
        Ok(TrainingOutcome {
            model: self.model,
            history,
            best: checkpoint.into_best(),
            checkpoints_written,
            final_location,
            stopped_at,
        })
    }

    fn run_epoch(&mut self, epoch: usize, train: &mut dyn DataLoader, valid: &mut dyn DataLoader) -> Result<()> {
        let started = Instant::now();
        let epochs = self.config.epochs;

        let train_totals = self.runner.run_pass(
            &mut self.model,
            &self.optimizer,
            &mut *train,
            Mode::Train,
            self.progress.as_mut(),
        )?;
        let train_avg = train_totals.average(train.steps());
        self.telemetry.scalar(Mode::Train.as_str(), "loss", train_avg.loss, epoch);
        self.telemetry.scalar(Mode::Train.as_str(), "dice", train_avg.metric, epoch);

        let val_totals = self.runner.run_pass(
            &mut self.model,
            &self.optimizer,
            &mut *valid,
            Mode::Eval,
            self.progress.as_mut(),
        )?;
        let val_avg = val_totals.average(valid.steps());
        self.telemetry.scalar(Mode::Eval.as_str(), "loss", val_avg.loss, epoch);
        self.telemetry.scalar(Mode::Eval.as_str(), "dice", val_avg.metric, epoch);
        if self.config.log_histograms {
            self.telemetry.histograms(&self.model.named_parameters(), epoch);
        }

        let weighted_sum = self.state.checkpoint.weights().weighted_sum(val_avg.loss, val_avg.metric);
        let record = EpochRecord {
            epoch,
            train_loss: train_avg.loss,
            train_metric: train_avg.metric,
            val_loss: val_avg.loss,
            val_metric: val_avg.metric,
            weighted_sum,
        };
        self.state.history.push(record)?;

        info!(
            "epoch {}/{}  loss - {:.4}, dice - {:.4}  val_loss - {:.4}, val_dice - {:.4}, w_sum - {:.4}  ({} ms)",
            epoch + 1,
            epochs,
            record.train_loss,
            record.train_metric,
            record.val_loss,
            record.val_metric,
            record.weighted_sum,
            started.elapsed().as_millis()
        );
        self.telemetry.log_metrics(&record);
        if let Some(tx) = &self.epoch_tx {
            let _ = tx.send(record);
        }

        self.checkpoint(epoch, weighted_sum)?;

        if self.early_stop.should_stop(record.val_metric, epoch) {
            if self.early_stop.enabled() {
                info!(epoch, val_dice = record.val_metric, "stopping early");
                self.state.stopped_at = Some(epoch);
            } else {
                debug!(epoch, val_dice = record.val_metric, "early-stop criteria met but early stopping is disabled");
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self, epoch: usize, weighted_sum: f64) -> Result<()> {
        let decision = self.state.checkpoint.evaluate(epoch, weighted_sum);
        match decision {
            CheckpointDecision::Skip(CheckpointPhase::BelowMinEpoch) => {
                debug!(epoch, min_epoch = self.config.min_epoch, "below min epochs, not saving");
                return Ok(());
            }
            CheckpointDecision::Skip(_) => {
                debug!(
                    epoch,
                    weighted_sum,
                    best = self.state.checkpoint.running_minimum(),
                    "no improvement, not saving"
                );
                return Ok(());
            }
            CheckpointDecision::SaveFirst => info!(epoch, weighted_sum, "saving first model"),
            CheckpointDecision::SaveImproved => info!(epoch, weighted_sum, "saving best model"),
        }

        let location = self
            .store
            .save(
                &self.model,
                &self.config,
                &self.state.history,
                &self.config.run_name,
                &self.config.models_dir(),
            )
            .inspect_err(|error| warn!(%error, epoch, "checkpoint save failed"))?;
        self.state.checkpoint.commit(epoch, weighted_sum, &location);
        self.state.checkpoints_written += 1;
        Ok(())
    }
}
