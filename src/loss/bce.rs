/// Binary cross-entropy on sigmoid outputs, evaluated one pixel at a time.
///
/// A binary pixel has one channel, but independent multi-label channels
/// are summed so the same code serves both.
pub struct BceLoss;

/// Probabilities are clamped to `[CLAMP, 1 - CLAMP]` before the log.
const CLAMP: f64 = 1e-7;

impl BceLoss {
    pub fn pixel_loss(probabilities: &[f64], mask: &[f64]) -> f64 {
        let mut total = 0.0;
        for (&p, &y) in probabilities.iter().zip(mask) {
            let p = p.clamp(CLAMP, 1.0 - CLAMP);
            total -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
        }
        total
    }

    /// Sigmoid and BCE fold into `p - y` with respect to the logit.
    pub fn logit_gradient(probabilities: &[f64], mask: &[f64]) -> Vec<f64> {
        probabilities.iter().zip(mask).map(|(p, y)| p - y).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturated_prediction_stays_finite() {
        let loss = BceLoss::pixel_loss(&[0.0], &[1.0]);
        assert!(loss.is_finite());
        assert!((loss - -(CLAMP.ln())).abs() < 1e-9);
    }

    #[test]
    fn channels_add_up() {
        let one = BceLoss::pixel_loss(&[0.3], &[1.0]);
        let two = BceLoss::pixel_loss(&[0.3, 0.3], &[1.0, 1.0]);
        assert!((two - 2.0 * one).abs() < 1e-12);
    }
}
