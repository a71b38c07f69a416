use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Per-pixel dense layer, i.e. a 1x1 convolution.
///
/// Every pixel is a row of `input_size` channels; the layer maps it to
/// `size` channels with one shared weight matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelLayer {
    pub size: usize,
    /// Shape (input_size, size).
    pub weights: Matrix,
    /// Shape (1, size).
    pub biases: Matrix,
    pub activator: ActivationFunction,
}

impl PixelLayer {
    pub fn new<R: Rng + ?Sized>(size: usize, input_size: usize, activation: ActivationFunction, rng: &mut R) -> PixelLayer {
        let weights = match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => Matrix::he(input_size, size, rng),
            _ => Matrix::xavier(input_size, size, rng),
        };

        PixelLayer {
            size,
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Returns (z, a): pre-activation `xW + b` and its activation.
    pub fn feed_from(&self, input: &Matrix) -> (Matrix, Matrix) {
        let mut z = input.matmul(&self.weights);
        z.add_row(&self.biases);
        let a = self.activator.activate(&z);
        (z, a)
    }

    /// Computes (weights_grad, biases_grad) from `delta`, the loss gradient
    /// with respect to this layer's pre-activation, summed over all pixels.
    pub fn compute_gradients(&self, delta: &Matrix, inputs: &Matrix) -> (Matrix, Matrix) {
        let weights_grad = inputs.transpose().matmul(delta);
        let biases_grad = delta.column_sums();
        (weights_grad, biases_grad)
    }

    /// Propagates `delta` back to the previous layer's activations.
    pub fn backpropagate(&self, delta: &Matrix) -> Matrix {
        delta.matmul(&self.weights.transpose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_layer_forward_and_gradients() {
        let layer = PixelLayer {
            size: 1,
            weights: Matrix::from_data(vec![vec![2.0], vec![-1.0]]),
            biases: Matrix::from_data(vec![vec![0.5]]),
            activator: ActivationFunction::Identity,
        };
        let x = Matrix::from_data(vec![vec![1.0, 1.0], vec![0.0, 2.0]]);
        let (z, a) = layer.feed_from(&x);
        assert_eq!(z.data, vec![vec![1.5], vec![-1.5]]);
        assert_eq!(a, z);

        let delta = Matrix::from_data(vec![vec![1.0], vec![1.0]]);
        let (w, b) = layer.compute_gradients(&delta, &x);
        assert_eq!(w.data, vec![vec![1.0], vec![3.0]]);
        assert_eq!(b.data, vec![vec![2.0]]);
        assert_eq!(layer.backpropagate(&delta).data, vec![vec![2.0, -1.0], vec![2.0, -1.0]]);
    }
}
