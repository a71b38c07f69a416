use serde::{Serialize, Deserialize};
use crate::activation::activation::ActivationFunction;
use crate::loss::loss_type::LossType;

/// Describes one layer in a network specification.
///
/// Fields:
/// - `size`: output channels of this layer
/// - `input_size`: channels feeding into this layer (the previous layer's
///   size, or the tile channel count for the first layer)
/// - `activation`: activation function applied after the linear transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

/// Architecture of a pixel network plus the loss it trains with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub layers: Vec<LayerSpec>,
    pub loss: LossType,
}

impl NetworkSpec {
    /// Hidden ReLU layers of the given widths followed by a Sigmoid
    /// (one output channel) or Softmax (`output_channels > 1`) output.
    pub fn segmentation(input_channels: usize, hidden: &[usize], output_channels: usize) -> NetworkSpec {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut input_size = input_channels;
        for &size in hidden {
            layers.push(LayerSpec { size, input_size, activation: ActivationFunction::ReLU });
            input_size = size;
        }
        let (activation, loss) = if output_channels == 1 {
            (ActivationFunction::Sigmoid, LossType::BinaryCrossEntropy)
        } else {
            (ActivationFunction::Softmax, LossType::CrossEntropy)
        };
        layers.push(LayerSpec { size: output_channels, input_size, activation });
        NetworkSpec { layers, loss }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_class_spec_ends_in_softmax() {
        let spec = NetworkSpec::segmentation(3, &[8, 4], 3);
        assert_eq!(spec.layers.len(), 3);
        assert_eq!(spec.layers[1].input_size, 8);
        assert_eq!(spec.layers[2].activation, ActivationFunction::Softmax);
        assert_eq!(spec.loss, LossType::CrossEntropy);
    }
}
