use serde::{Serialize, Deserialize};

use crate::error::{Result, TrainError};
use crate::math::matrix::Matrix;
use crate::network::model::Gradients;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one SGD update to a single tensor.
    pub fn step(&self, param: &mut Matrix, grad: &Matrix) {
        *param = std::mem::take(param) - grad.map(|x| x * self.learning_rate);
    }

    /// Applies one update to every trainable tensor, pairing parameters and
    /// gradients by position.
    pub fn apply_gradients(&self, params: Vec<&mut Matrix>, grads: &Gradients) -> Result<()> {
        if params.is_empty() {
            return Err(TrainError::NoTrainableParameters);
        }
        if params.len() != grads.tensors.len() {
            return Err(TrainError::shape(format!(
                "{} gradients for {} parameters",
                grads.tensors.len(),
                params.len()
            )));
        }
        if let Some((p, g)) = params.iter().zip(&grads.tensors).find(|(p, g)| !p.same_shape(g)) {
            return Err(TrainError::shape(format!(
                "gradient {}x{} does not fit parameter {}x{}",
                g.rows, g.cols, p.rows, p.cols
            )));
        }
        for (param, grad) in params.into_iter().zip(&grads.tensors) {
            self.step(param, grad);
        }
        Ok(())
    }
}
