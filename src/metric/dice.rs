use crate::data::tensor::Tensor4;

/// Additive smoothing that keeps Dice defined on empty masks.
pub const SMOOTH: f64 = 1.0;

/// Dice coefficient of two equally sized binary masks:
/// (2·|A∩B| + s) / (|A| + |B| + s).
pub fn dice_coefficient<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (mut intersection, mut total) = (0.0, 0.0);
    for (t, p) in pairs {
        intersection += t * p;
        total += t + p;
    }
    (2.0 * intersection + SMOOTH) / (total + SMOOTH)
}

/// Binarises probabilities at `threshold` (strictly greater is foreground).
pub fn threshold_mask(prediction: &Tensor4, threshold: f64) -> Tensor4 {
    Tensor4 {
        data: prediction.data.iter().map(|&p| if p > threshold { 1.0 } else { 0.0 }).collect(),
        ..prediction.clone()
    }
}

/// Dice of sample `n`, averaged over channels.
pub fn sample_dice(label: &Tensor4, binary_prediction: &Tensor4, n: usize) -> f64 {
    let c = label.channels;
    if c == 0 {
        return 0.0;
    }
    let truth = label.sample(n);
    let pred = binary_prediction.sample(n);
    let total: f64 = (0..c)
        .map(|ch| {
            dice_coefficient(
                truth.iter().skip(ch).step_by(c).copied()
                    .zip(pred.iter().skip(ch).step_by(c).copied()),
            )
        })
        .sum();
    total / c as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_overlap_scores_one() {
        let d = dice_coefficient([(1.0, 1.0), (0.0, 0.0), (1.0, 1.0)]);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_masks_score_near_zero() {
        let d = dice_coefficient([(1.0, 0.0); 50].into_iter().chain([(0.0, 1.0); 50]));
        assert!(d < 0.02);
    }

    #[test]
    fn per_channel_average() {
        // channel 0 matches, channel 1 is empty in both -> both score 1
        let label = Tensor4 { batch: 1, height: 1, width: 2, channels: 2, data: vec![1.0, 0.0, 0.0, 0.0] };
        let pred = threshold_mask(
            &Tensor4 { batch: 1, height: 1, width: 2, channels: 2, data: vec![0.9, 0.1, 0.2, 0.3] },
            0.5,
        );
        assert_eq!(pred.data, vec![1.0, 0.0, 0.0, 0.0]);
        assert!((sample_dice(&label, &pred, 0) - 1.0).abs() < 1e-12);
    }
}
