use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::data::stats::ChannelStats;
use crate::data::tensor::Tensor4;
use crate::error::DataError;

/// Transform names accepted in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    Scale,
    FlipHorizontal,
    FlipVertical,
    Standardize,
}

impl FromStr for TransformKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scale" => Ok(TransformKind::Scale),
            "FlipHorizontal" => Ok(TransformKind::FlipHorizontal),
            "FlipVertical" => Ok(TransformKind::FlipVertical),
            "Standardize" => Ok(TransformKind::Standardize),
            other => Err(DataError::UnknownTransform(other.to_string())),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A fully resolved per-sample transform.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Maps 8-bit intensities into [0, 1].
    Scale,
    /// Mirrors image and mask left-right with probability 0.5.
    FlipHorizontal,
    /// Mirrors image and mask top-bottom with probability 0.5.
    FlipVertical,
    /// Per-channel `(x - mean) / std`.
    Standardize { means: Vec<f64>, stds: Vec<f64> },
}

impl TransformOp {
    /// Resolves a configured name into an operation. `Standardize` needs
    /// statistics for every image channel.
    pub fn resolve(name: &str, stats: Option<&ChannelStats>, channels: usize) -> Result<TransformOp, DataError> {
        Ok(match name.parse::<TransformKind>()? {
            TransformKind::Scale => TransformOp::Scale,
            TransformKind::FlipHorizontal => TransformOp::FlipHorizontal,
            TransformKind::FlipVertical => TransformOp::FlipVertical,
            TransformKind::Standardize => {
                let (means, stds) = stats.map_or((vec![], vec![]), |s| (s.means.clone(), s.stds.clone()));
                if means.len() != channels || stds.len() != channels {
                    return Err(DataError::MissingStatistics {
                        expected: channels,
                        means: means.len(),
                        stds: stds.len(),
                    });
                }
                TransformOp::Standardize { means, stds }
            }
        })
    }

    /// Resolves a list of names, failing on the first unknown one.
    pub fn resolve_all(names: &[String], stats: Option<&ChannelStats>, channels: usize) -> Result<Vec<TransformOp>, DataError> {
        names.iter().map(|n| TransformOp::resolve(n, stats, channels)).collect()
    }

    /// Applies the transform in place to a single-sample image and mask.
    pub fn apply<R: Rng + ?Sized>(&self, image: &mut Tensor4, mask: &mut Tensor4, rng: &mut R) {
        match self {
            TransformOp::Scale => {
                for v in &mut image.data {
                    *v /= 255.0;
                }
            }
            TransformOp::FlipHorizontal => {
                if rng.gen_bool(0.5) {
                    flip(image, true);
                    flip(mask, true);
                }
            }
            TransformOp::FlipVertical => {
                if rng.gen_bool(0.5) {
                    flip(image, false);
                    flip(mask, false);
                }
            }
            TransformOp::Standardize { means, stds } => {
                for pixel in image.data.chunks_mut(image.channels) {
                    for ((v, m), s) in pixel.iter_mut().zip(means).zip(stds) {
                        *v = (*v - m) / s.max(f64::EPSILON);
                    }
                }
            }
        }
    }
}

fn flip(t: &mut Tensor4, horizontal: bool) {
    let src = t.clone();
    for n in 0..t.batch {
        for y in 0..t.height {
            for x in 0..t.width {
                let (sy, sx) = if horizontal {
                    (y, t.width - 1 - x)
                } else {
                    (t.height - 1 - y, x)
                };
                for c in 0..t.channels {
                    t.set(n, y, x, c, src.get(n, sy, sx, c));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn unknown_name_is_a_clear_error() {
        let err = TransformOp::resolve("Sharpen", None, 3).unwrap_err();
        assert!(matches!(err, DataError::UnknownTransform(ref n) if n == "Sharpen"));
    }

    #[test]
    fn standardize_requires_statistics() {
        let err = TransformOp::resolve("Standardize", None, 3).unwrap_err();
        assert!(matches!(err, DataError::MissingStatistics { expected: 3, .. }));
    }

    #[test]
    fn standardize_centres_channels() {
        let stats = ChannelStats { means: vec![0.5], stds: vec![0.25] };
        let op = TransformOp::resolve("Standardize", Some(&stats), 1).unwrap();
        let mut image = Tensor4 { batch: 1, height: 1, width: 2, channels: 1, data: vec![0.5, 1.0] };
        let mut mask = Tensor4::zeros(1, 1, 2, 1);
        op.apply(&mut image, &mut mask, &mut StdRng::seed_from_u64(0));
        assert_eq!(image.data, vec![0.0, 2.0]);
    }

    #[test]
    fn flips_move_image_and_mask_together() {
        let mut image = Tensor4 { batch: 1, height: 1, width: 3, channels: 1, data: vec![1.0, 2.0, 3.0] };
        let mut mask = Tensor4 { batch: 1, height: 1, width: 3, channels: 1, data: vec![1.0, 0.0, 0.0] };
        flip(&mut image, true);
        flip(&mut mask, true);
        assert_eq!(image.data, vec![3.0, 2.0, 1.0]);
        assert_eq!(mask.data, vec![0.0, 0.0, 1.0]);
    }
}
