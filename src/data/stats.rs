use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use crate::error::DataError;

/// Per-channel mean and standard deviation of a tile collection,
/// on intensities scaled into [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// Running sums for one image: pixel count, per-channel sum and sum of squares.
#[derive(Debug, Clone, Default)]
struct PixelSums {
    count: u64,
    sum: [f64; 3],
    sum_sq: [f64; 3],
}

impl PixelSums {
    fn merge(mut self, other: PixelSums) -> PixelSums {
        self.count += other.count;
        for c in 0..3 {
            self.sum[c] += other.sum[c];
            self.sum_sq[c] += other.sum_sq[c];
        }
        self
    }
}

fn image_sums(path: &Path) -> Result<PixelSums, DataError> {
    let img = image::open(path)
        .map_err(|source| DataError::Decode { path: path.to_path_buf(), source })?
        .to_rgb8();
    let mut sums = PixelSums::default();
    for pixel in img.pixels() {
        sums.count += 1;
        for c in 0..3 {
            let v = pixel.0[c] as f64 / 255.0;
            sums.sum[c] += v;
            sums.sum_sq[c] += v * v;
        }
    }
    Ok(sums)
}

/// Computes RGB channel statistics over `paths` in parallel.
pub fn channel_stats(paths: &[PathBuf]) -> Result<ChannelStats, DataError> {
    let totals = paths
        .par_iter()
        .map(|p| image_sums(p))
        .try_reduce(PixelSums::default, |a, b| Ok(a.merge(b)))?;

    if totals.count == 0 {
        return Ok(ChannelStats { means: vec![0.0; 3], stds: vec![0.0; 3] });
    }
    let n = totals.count as f64;
    let means: Vec<f64> = totals.sum.iter().map(|s| s / n).collect();
    let stds = totals.sum_sq.iter().zip(&means)
        .map(|(sq, m)| (sq / n - m * m).max(0.0).sqrt())
        .collect();
    Ok(ChannelStats { means, stds })
}

/// Lists `*.png` files directly inside `dir`, sorted by name.
pub fn png_files(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn stats_over_two_flat_tiles() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([0, 255, 0])).save(dir.path().join("a.png")).unwrap();
        RgbImage::from_pixel(2, 2, Rgb([255, 255, 0])).save(dir.path().join("b.png")).unwrap();

        let files = png_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        let stats = channel_stats(&files).unwrap();
        assert!((stats.means[0] - 0.5).abs() < 1e-12);
        assert!((stats.stds[0] - 0.5).abs() < 1e-12);
        assert!((stats.means[1] - 1.0).abs() < 1e-12);
        assert!(stats.stds[1].abs() < 1e-6);
        assert_eq!(stats.means[2], 0.0);
    }
}
