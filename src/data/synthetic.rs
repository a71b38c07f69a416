use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::batch::Batch;
use crate::data::loader::InMemoryLoader;
use crate::data::tensor::Tensor4;
use crate::error::Result;

/// Deterministic generator of synthetic tissue tiles.
///
/// Every tile holds one disc of "tissue" on a dim background. For binary
/// tasks the mask is the disc; for `classes > 2` the disc is split into
/// concentric rings labelled `1..classes`, with class 0 as background.
#[derive(Debug, Clone)]
pub struct SyntheticTiles {
    pub seed: u64,
    pub dims: usize,
    pub channels: usize,
    /// Mask channel count: 1 for binary, the class count for multi-class.
    pub mask_channels: usize,
    pub noise: f64,
}

impl SyntheticTiles {
    pub fn new(seed: u64, dims: usize, channels: usize, mask_channels: usize) -> SyntheticTiles {
        SyntheticTiles { seed, dims, channels, mask_channels, noise: 0.05 }
    }

    /// Generates `samples` tiles grouped into batches of `batch_size`.
    /// A trailing partial batch is kept when `drop_remainder` is false.
    pub fn loader(&self, samples: usize, batch_size: usize, drop_remainder: bool) -> Result<InMemoryLoader> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut batches = Vec::new();
        let mut start = 0;
        while start < samples {
            let size = batch_size.min(samples - start);
            if size < batch_size && drop_remainder {
                break;
            }
            batches.push(self.batch(size, &mut rng)?);
            start += size;
        }
        Ok(InMemoryLoader::new(batches))
    }

    fn batch(&self, size: usize, rng: &mut StdRng) -> Result<Batch> {
        let d = self.dims;
        let mut image = Tensor4::zeros(size, d, d, self.channels);
        let mut mask = Tensor4::zeros(size, d, d, self.mask_channels);
        let classes = self.mask_channels.max(2);

        for n in 0..size {
            let cy = rng.gen_range(0.25..0.75) * d as f64;
            let cx = rng.gen_range(0.25..0.75) * d as f64;
            let radius = rng.gen_range(d as f64 / 6.0..=d as f64 / 3.0);

            for y in 0..d {
                for x in 0..d {
                    let dist = ((y as f64 - cy).powi(2) + (x as f64 - cx).powi(2)).sqrt();
                    let class = if dist > radius {
                        0
                    } else {
                        let band = ((dist / radius) * (classes - 1) as f64) as usize;
                        classes - 1 - band.min(classes - 2)
                    };
                    let intensity = class as f64 / (classes - 1) as f64;
                    for c in 0..self.channels {
                        let jitter = rng.gen_range(-self.noise..=self.noise);
                        image.set(n, y, x, c, 0.2 + 0.6 * intensity + jitter);
                    }
                    if self.mask_channels == 1 {
                        mask.set(n, y, x, 0, if class > 0 { 1.0 } else { 0.0 });
                    } else {
                        mask.set(n, y, x, class, 1.0);
                    }
                }
            }
        }
        Batch::new(image, mask)
    }
}
