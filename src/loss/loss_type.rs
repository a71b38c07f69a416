use serde::{Serialize, Deserialize};

use crate::data::tensor::Tensor4;
use crate::loss::bce::BceLoss;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;

/// Selects which loss function the replicas use.
///
/// - `BinaryCrossEntropy`: pair with a Sigmoid output (binary tasks).
/// - `CrossEntropy`: pair with a Softmax output (multi-class tasks).
///
/// Both report their gradient with respect to the output logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    BinaryCrossEntropy,
    CrossEntropy,
}

impl LossType {
    /// Raw loss of one pixel.
    pub fn pixel_loss(&self, predicted: &[f64], expected: &[f64]) -> f64 {
        match self {
            LossType::BinaryCrossEntropy => BceLoss::pixel_loss(predicted, expected),
            LossType::CrossEntropy       => CrossEntropyLoss::pixel_loss(predicted, expected),
        }
    }

    pub fn pixel_derivative(&self, predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        match self {
            LossType::BinaryCrossEntropy => BceLoss::logit_gradient(predicted, expected),
            LossType::CrossEntropy       => CrossEntropyLoss::logit_gradient(predicted, expected),
        }
    }

    /// Per-pixel loss map of a whole batch, flattened NHW.
    /// Callers must pass same-shaped tensors.
    pub fn loss_map(&self, label: &Tensor4, prediction: &Tensor4) -> Vec<f64> {
        let c = prediction.channels;
        if c == 0 {
            return Vec::new();
        }
        prediction.data.chunks(c).zip(label.data.chunks(c))
            .map(|(p, y)| self.pixel_loss(p, y))
            .collect()
    }

    /// Gradient of the loss map with respect to the logits, one row per pixel.
    pub fn logit_gradient(&self, label: &Tensor4, prediction: &Tensor4) -> Matrix {
        let c = prediction.channels;
        if c == 0 {
            return Matrix::default();
        }
        Matrix {
            rows: prediction.data.len() / c,
            cols: c,
            data: prediction.data.chunks(c).zip(label.data.chunks(c))
                .map(|(p, y)| self.pixel_derivative(p, y))
                .collect(),
        }
    }
}
