//! Per-replica forward/backward execution.
//!
//! One step splits the global batch into one partition per replica, runs all
//! replicas concurrently on a dedicated thread pool and returns only once
//! every replica finished and the summed gradients were applied. This is the
//! hot path of training: everything the epoch loop does per batch goes
//! through `ReplicaStepExecutor::run_step`.

use std::fmt;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::data::batch::Batch;
use crate::error::{Result, TrainError};
use crate::loss::loss_type::LossType;
use crate::metric::dice::{sample_dice, threshold_mask};
use crate::network::model::{Gradients, SegmentationModel};
use crate::optim::sgd::Sgd;

/// Whether a step updates parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    pub fn is_training(self) -> bool {
        self == Mode::Train
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Eval => "validation",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One replica's share of a batch-level loss and metric.
///
/// Values are pre-scaled so that summing the results of every replica of a
/// step yields the batch value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplicaResult {
    pub loss: f64,
    pub metric: f64,
}

/// What a replica hands back to the coordinating thread.
#[derive(Debug)]
pub struct ReplicaOutput {
    pub result: ReplicaResult,
    /// `None` in eval mode and for empty partitions.
    pub gradients: Option<Gradients>,
}

pub struct ReplicaStepExecutor {
    replicas: usize,
    global_batch_size: usize,
    img_dims: usize,
    threshold: f64,
    loss: LossType,
    pool: ThreadPool,
}

impl fmt::Debug for ReplicaStepExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaStepExecutor")
            .field("replicas", &self.replicas)
            .field("global_batch_size", &self.global_batch_size)
            .field("img_dims", &self.img_dims)
            .field("threshold", &self.threshold)
            .field("loss", &self.loss)
            .finish()
    }
}

impl ReplicaStepExecutor {
    pub fn new(
        replicas: usize,
        global_batch_size: usize,
        img_dims: usize,
        threshold: f64,
        loss: LossType,
    ) -> Result<ReplicaStepExecutor> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(replicas)
            .thread_name(|i| format!("replica-{i}"))
            .build()
            .map_err(|e| TrainError::Device(e.to_string()))?;
        Ok(ReplicaStepExecutor { replicas, global_batch_size, img_dims, threshold, loss, pool })
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Weight of one sample in a replica's loss:
    /// 1 / per_replica_batch / replicas, with per_replica_batch = global / replicas.
    /// Summing over replicas therefore averages over the global batch size
    /// whatever the replica count.
    fn sample_scale(&self) -> f64 {
        let replicas = self.replicas as f64;
        let per_replica_batch = self.global_batch_size as f64 / replicas;
        1.0 / per_replica_batch / replicas
    }

    /// Weight of one pixel's loss: `sample_scale / (height * width)`.
    fn pixel_scale(&self) -> f64 {
        self.sample_scale() / (self.img_dims * self.img_dims) as f64
    }

    fn check_shapes<M: SegmentationModel>(&self, model: &M, batch: &Batch) -> Result<()> {
        let image = &batch.image;
        if image.height != self.img_dims || image.width != self.img_dims {
            return Err(TrainError::shape(format!(
                "batch tiles are {}x{}, configured for {}x{}",
                image.height, image.width, self.img_dims, self.img_dims
            )));
        }
        let mask = &batch.mask;
        if mask.batch != image.batch || mask.height != image.height || mask.width != image.width {
            return Err(TrainError::shape(format!(
                "mask {:?} does not cover image {:?}",
                mask.shape(),
                image.shape()
            )));
        }
        if batch.mask.channels != model.output_channels() {
            return Err(TrainError::shape(format!(
                "mask has {} channels, model predicts {}",
                batch.mask.channels,
                model.output_channels()
            )));
        }
        if batch.len() > self.global_batch_size {
            return Err(TrainError::shape(format!(
                "batch of {} exceeds global batch size {}",
                batch.len(),
                self.global_batch_size
            )));
        }
        Ok(())
    }

    /// Runs one replica on its partition. Never mutates the model.
    ///
    /// `step_samples` is the size of the whole step's batch: Dice is a mean
    /// over the samples actually present, while the loss is weighted
    /// against the configured global batch size.
    pub fn replica_step<M: SegmentationModel>(
        &self,
        model: &M,
        part: &Batch,
        step_samples: usize,
        mode: Mode,
    ) -> Result<ReplicaOutput> {
        if part.is_empty() {
            return Ok(ReplicaOutput { result: ReplicaResult::default(), gradients: None });
        }

        let (prediction, cache) = model.forward(&part.image, mode.is_training())?;

        let loss_sum: f64 = self.loss.loss_map(&part.mask, &prediction).iter().sum();
        let loss = loss_sum * self.pixel_scale();

        let binary = threshold_mask(&prediction, self.threshold);
        let dice_sum: f64 = (0..part.len()).map(|n| sample_dice(&part.mask, &binary, n)).sum();
        let metric = dice_sum / step_samples as f64;

        let gradients = if mode.is_training() {
            let scale = self.pixel_scale();
            let logit_grad = self.loss.logit_gradient(&part.mask, &prediction).map(|g| g * scale);
            Some(model.backward(&cache, &logit_grad)?)
        } else {
            None
        };

        Ok(ReplicaOutput { result: ReplicaResult { loss, metric }, gradients })
    }

    /// Runs every replica of one step concurrently. In train mode the
    /// replica gradients are summed and applied exactly once, after all
    /// replicas returned, so no replica sees a half-updated model.
    pub fn run_step<M: SegmentationModel>(
        &self,
        model: &mut M,
        optimizer: &Sgd,
        batch: &Batch,
        mode: Mode,
    ) -> Result<Vec<ReplicaResult>> {
        self.check_shapes(model, batch)?;
        let parts = batch.partition(self.replicas);
        let step_samples = batch.len();

        let shared: &M = model;
        let outputs = self.pool.install(|| {
            parts
                .par_iter()
                .map(|part| self.replica_step(shared, part, step_samples, mode))
                .collect::<Result<Vec<_>>>()
        })?;

        if mode.is_training() {
            let mut total = model.zero_gradients();
            for grads in outputs.iter().filter_map(|o| o.gradients.as_ref()) {
                total.accumulate(grads)?;
            }
            optimizer.apply_gradients(model.parameters_mut(), &total)?;
        }

        Ok(outputs.into_iter().map(|o| o.result).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::data::synthetic::SyntheticTiles;
    use crate::data::tensor::Tensor4;
    use crate::math::matrix::Matrix;
    use crate::network::network::PixelNetwork;

    fn batch() -> Batch {
        SyntheticTiles::new(1, 6, 3, 1).loader(4, 4, false).unwrap().batches()[0].clone()
    }

    fn model() -> PixelNetwork {
        PixelNetwork::new(vec![
            (4, 3, ActivationFunction::ReLU),
            (1, 4, ActivationFunction::Sigmoid),
        ], 2)
    }

    #[test]
    fn eval_leaves_parameters_untouched() {
        let exec = ReplicaStepExecutor::new(2, 4, 6, 0.5, LossType::BinaryCrossEntropy).unwrap();
        let mut m = model();
        let before = m.clone();
        let results = exec.run_step(&mut m, &Sgd::new(0.5), &batch(), Mode::Eval).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(m, before);
    }

    #[test]
    fn train_step_updates_parameters_once() {
        let exec = ReplicaStepExecutor::new(2, 4, 6, 0.5, LossType::BinaryCrossEntropy).unwrap();
        let mut m = model();
        let before = m.clone();
        exec.run_step(&mut m, &Sgd::new(0.5), &batch(), Mode::Train).unwrap();
        assert_ne!(m, before);
    }

    #[test]
    fn wrong_tile_size_is_fatal() {
        let exec = ReplicaStepExecutor::new(1, 4, 8, 0.5, LossType::BinaryCrossEntropy).unwrap();
        let err = exec.run_step(&mut model(), &Sgd::new(0.1), &batch(), Mode::Eval).unwrap_err();
        assert!(matches!(err, TrainError::Shape(_)));
    }

    #[test]
    fn mask_batch_mismatch_is_a_shape_error() {
        let exec = ReplicaStepExecutor::new(2, 4, 6, 0.5, LossType::BinaryCrossEntropy).unwrap();
        let short_mask = Batch { image: Tensor4::zeros(2, 6, 6, 3), mask: Tensor4::zeros(1, 6, 6, 1) };
        let err = exec.run_step(&mut model(), &Sgd::new(0.1), &short_mask, Mode::Eval).unwrap_err();
        assert!(matches!(err, TrainError::Shape(_)));
    }

    #[test]
    fn mask_resolution_mismatch_is_a_shape_error() {
        let exec = ReplicaStepExecutor::new(2, 4, 6, 0.5, LossType::BinaryCrossEntropy).unwrap();
        let small_mask = Batch { image: Tensor4::zeros(2, 6, 6, 3), mask: Tensor4::zeros(2, 3, 3, 1) };
        let err = exec.run_step(&mut model(), &Sgd::new(0.1), &small_mask, Mode::Train).unwrap_err();
        assert!(matches!(err, TrainError::Shape(_)));
    }

    #[test]
    fn short_batch_dice_is_the_mean_over_present_samples() {
        // Empty masks and all-background predictions: every sample scores 1.
        let mut m = model();
        for l in &mut m.layers {
            l.weights = Matrix::zeros(l.weights.rows, l.weights.cols);
        }
        m.layers[1].biases = Matrix::from_data(vec![vec![-5.0]]);
        let empty = Batch { image: Tensor4::zeros(3, 6, 6, 3), mask: Tensor4::zeros(3, 6, 6, 1) };
        for replicas in [1, 2] {
            let exec = ReplicaStepExecutor::new(replicas, 4, 6, 0.5, LossType::BinaryCrossEntropy).unwrap();
            let results = exec.run_step(&mut m, &Sgd::new(0.1), &empty, Mode::Eval).unwrap();
            let dice: f64 = results.iter().map(|r| r.metric).sum();
            assert!((dice - 1.0).abs() < 1e-12, "{replicas} replicas: {dice}");
        }
    }

    #[test]
    fn replicas_without_samples_contribute_nothing() {
        let exec = ReplicaStepExecutor::new(8, 4, 6, 0.5, LossType::BinaryCrossEntropy).unwrap();
        let results = exec.run_step(&mut model(), &Sgd::new(0.1), &batch(), Mode::Train).unwrap();
        assert_eq!(results.len(), 8);
        assert!(results[4..].iter().all(|r| *r == ReplicaResult::default()));
    }
}
