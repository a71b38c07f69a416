use crate::data::tensor::Tensor4;
use crate::error::{Result, TrainError};
use crate::math::matrix::Matrix;

/// Gradients for every trainable tensor, in `named_parameters` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub tensors: Vec<Matrix>,
}

impl Gradients {
    /// All-reduce: adds `other` into `self` tensor by tensor.
    pub fn accumulate(&mut self, other: &Gradients) -> Result<()> {
        if self.tensors.len() != other.tensors.len() {
            return Err(TrainError::shape(format!(
                "gradient sets disagree: {} vs {} tensors",
                self.tensors.len(),
                other.tensors.len()
            )));
        }
        for (acc, g) in self.tensors.iter_mut().zip(&other.tensors) {
            if !acc.same_shape(g) {
                return Err(TrainError::shape("gradient tensor shapes disagree"));
            }
            acc.add_assign(g);
        }
        Ok(())
    }
}

/// The network collaborator seen by the training loop.
///
/// `forward` is read-only so replicas can share one model concurrently;
/// parameters change only through `parameters_mut`, once per step.
pub trait SegmentationModel: Send + Sync {
    /// Whatever `backward` needs from the forward pass.
    type Cache: Send;

    fn input_channels(&self) -> usize;

    fn output_channels(&self) -> usize;

    /// Maps an NHWC image batch to per-pixel probabilities.
    /// `training` selects training-mode semantics for stochastic layers.
    fn forward(&self, input: &Tensor4, training: bool) -> Result<(Tensor4, Self::Cache)>;

    /// Gradients of the loss given its gradient with respect to the output
    /// logits (one row per pixel).
    fn backward(&self, cache: &Self::Cache, logit_grad: &Matrix) -> Result<Gradients>;

    /// Zero-filled gradients with the shape of every trainable tensor.
    fn zero_gradients(&self) -> Gradients;

    fn parameters_mut(&mut self) -> Vec<&mut Matrix>;

    /// Name and value of every trainable tensor, for histogram logging.
    fn named_parameters(&self) -> Vec<(String, &Matrix)>;

    fn trainable_parameter_count(&self) -> usize {
        self.named_parameters().iter().map(|(_, m)| m.rows * m.cols).sum()
    }
}
