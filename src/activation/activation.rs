use serde::{Serialize, Deserialize};
use std::f64::consts::E;

use crate::math::matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is vector-valued: it normalises each pixel row across channels
    /// and is only meaningful on the output layer.
    Softmax,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    /// Applies the activation to a (pixels x channels) pre-activation matrix.
    pub fn activate(&self, z: &Matrix) -> Matrix {
        match self {
            ActivationFunction::Softmax => {
                let data = z.data.iter().map(|row| softmax(row)).collect();
                Matrix { rows: z.rows, cols: z.cols, data }
            }
            _ => z.map(|x| self.function(x)),
        }
    }

    /// Element-wise activation. `Softmax` is handled row-wise by `activate`
    /// and falls through as identity here.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Element-wise derivative of the activation at pre-activation `x`.
    ///
    /// Output activations (Sigmoid, Softmax) are paired with a cross-entropy
    /// loss whose combined gradient `predicted - expected` is already taken
    /// with respect to the logits, so the output layer never calls this.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }
}

/// Numerically stable softmax of one row.
fn softmax(row: &[f64]) -> Vec<f64> {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = row.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let z = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![1000.0, 1000.0, 1000.0]]);
        let a = ActivationFunction::Softmax.activate(&z);
        for row in &a.data {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert!((a.data[1][0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_is_centred() {
        assert!((ActivationFunction::Sigmoid.function(0.0) - 0.5).abs() < 1e-12);
        assert!((ActivationFunction::Sigmoid.derivative(0.0) - 0.25).abs() < 1e-12);
    }
}
