/// Categorical cross-entropy of a softmax pixel against its one-hot class.
pub struct CrossEntropyLoss;

const MIN_PROBABILITY: f64 = 1e-12;

impl CrossEntropyLoss {
    /// `-ln p[class]`, summed over the (one-hot) mask so soft labels work too.
    pub fn pixel_loss(probabilities: &[f64], mask: &[f64]) -> f64 {
        mask.iter()
            .zip(probabilities)
            .filter(|(y, _)| **y != 0.0)
            .map(|(y, p)| -y * p.max(MIN_PROBABILITY).ln())
            .sum()
    }

    /// Softmax followed by cross-entropy differentiates to `p - y` at the
    /// logits, so the output layer's own activation derivative is skipped.
    pub fn logit_gradient(probabilities: &[f64], mask: &[f64]) -> Vec<f64> {
        probabilities.iter().zip(mask).map(|(p, y)| p - y).collect()
    }
}
