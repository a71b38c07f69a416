use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::data::tensor::Tensor4;
use crate::error::{Result, TrainError};
use crate::layers::pixel::PixelLayer;
use crate::math::matrix::Matrix;
use crate::network::model::{Gradients, SegmentationModel};
use crate::network::spec::NetworkSpec;

/// A stack of per-pixel dense layers.
///
/// Hidden layers can use any element-wise activation; the last layer is
/// expected to be Sigmoid (binary) or Softmax (multi-class) so that the
/// loss gradient arrives with respect to its logits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelNetwork {
    pub layers: Vec<PixelLayer>,
}

/// Per-layer inputs and pre-activations recorded during `forward`.
#[derive(Debug)]
pub struct PixelCache {
    inputs: Vec<Matrix>,
    pre_activations: Vec<Matrix>,
}

impl PixelNetwork {
    /// Builds a network from (size, input_size, activation) tuples,
    /// initialising weights from `seed`.
    pub fn new(layer_specs: Vec<(usize, usize, ActivationFunction)>, seed: u64) -> PixelNetwork {
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = layer_specs.into_iter()
            .map(|(size, input_size, activation)| PixelLayer::new(size, input_size, activation, &mut rng))
            .collect();
        PixelNetwork { layers }
    }

    pub fn from_spec(spec: &NetworkSpec, seed: u64) -> PixelNetwork {
        PixelNetwork::new(
            spec.layers.iter().map(|l| (l.size, l.input_size, l.activation)).collect(),
            seed,
        )
    }
}

impl SegmentationModel for PixelNetwork {
    type Cache = PixelCache;

    fn input_channels(&self) -> usize {
        self.layers.first().map_or(0, PixelLayer::input_size)
    }

    fn output_channels(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    // No stochastic layers, so training and inference share one path.
    fn forward(&self, input: &Tensor4, _training: bool) -> Result<(Tensor4, PixelCache)> {
        if self.layers.is_empty() {
            return Err(TrainError::NoTrainableParameters);
        }
        if input.channels != self.input_channels() {
            return Err(TrainError::shape(format!(
                "model expects {} input channels, batch has {}",
                self.input_channels(),
                input.channels
            )));
        }

        let mut cache = PixelCache {
            inputs: Vec::with_capacity(self.layers.len()),
            pre_activations: Vec::with_capacity(self.layers.len()),
        };
        let mut current = input.to_pixel_rows();
        for layer in &self.layers {
            let (z, a) = layer.feed_from(&current);
            cache.inputs.push(current);
            cache.pre_activations.push(z);
            current = a;
        }
        let prediction = Tensor4::from_pixel_rows(&current, input.batch, input.height, input.width);
        Ok((prediction, cache))
    }

    fn backward(&self, cache: &PixelCache, logit_grad: &Matrix) -> Result<Gradients> {
        let last = self.layers.len().checked_sub(1).ok_or(TrainError::NoTrainableParameters)?;
        if logit_grad.cols != self.layers[last].size || logit_grad.rows != cache.inputs[last].rows {
            return Err(TrainError::shape(format!(
                "logit gradient is {}x{}, expected {}x{}",
                logit_grad.rows,
                logit_grad.cols,
                cache.inputs[last].rows,
                self.layers[last].size
            )));
        }

        let mut tensors = vec![Matrix::default(); self.layers.len() * 2];
        let mut delta = logit_grad.clone();
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            let (w_grad, b_grad) = layer.compute_gradients(&delta, &cache.inputs[i]);
            if i > 0 {
                let prev = &self.layers[i - 1];
                let act_derivative = cache.pre_activations[i - 1].map(|x| prev.activator.derivative(x));
                delta = layer.backpropagate(&delta).hadamard(&act_derivative);
            }
            tensors[2 * i] = w_grad;
            tensors[2 * i + 1] = b_grad;
        }
        Ok(Gradients { tensors })
    }

    fn zero_gradients(&self) -> Gradients {
        Gradients {
            tensors: self.layers.iter()
                .flat_map(|l| [
                    Matrix::zeros(l.weights.rows, l.weights.cols),
                    Matrix::zeros(l.biases.rows, l.biases.cols),
                ])
                .collect(),
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Matrix> {
        self.layers.iter_mut()
            .flat_map(|l| [&mut l.weights, &mut l.biases])
            .collect()
    }

    fn named_parameters(&self) -> Vec<(String, &Matrix)> {
        self.layers.iter().enumerate()
            .flat_map(|(i, l)| [
                (format!("pixel_{i}/weights"), &l.weights),
                (format!("pixel_{i}/biases"), &l.biases),
            ])
            .collect()
    }
}
