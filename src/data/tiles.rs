use std::path::{Path, PathBuf};

use image::GenericImageView;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::batch::Batch;
use crate::data::loader::DataLoader;
use crate::data::stats::png_files;
use crate::data::tensor::Tensor4;
use crate::data::transform::TransformOp;
use crate::error::{DataError, Result, TrainError};

/// Loads PNG tile/mask pairs from `<root>/images` and `<root>/masks`.
///
/// A mask shares its tile's file name. Binary masks treat any non-zero value
/// as foreground; multi-class masks store the class index in the first
/// channel and are one-hot encoded.
#[derive(Debug)]
pub struct TileFolderLoader {
    pairs: Vec<(PathBuf, PathBuf)>,
    dims: usize,
    channels: usize,
    mask_channels: usize,
    batch_size: usize,
    transforms: Vec<TransformOp>,
    shuffle: bool,
    drop_remainder: bool,
    rng: StdRng,
}

impl TileFolderLoader {
    pub fn open(
        root: &Path,
        dims: usize,
        channels: usize,
        mask_channels: usize,
        batch_size: usize,
    ) -> Result<TileFolderLoader, DataError> {
        let images = png_files(&root.join("images"))?;
        if images.is_empty() {
            return Err(DataError::EmptyFolder(root.join("images")));
        }
        let masks_dir = root.join("masks");
        let pairs = images
            .into_iter()
            .map(|img| {
                let mask = img.file_name().map(|name| masks_dir.join(name));
                match mask {
                    Some(m) if m.is_file() => Ok((img, m)),
                    _ => Err(DataError::MissingMask(img)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TileFolderLoader {
            pairs,
            dims,
            channels,
            mask_channels,
            batch_size,
            transforms: Vec::new(),
            shuffle: false,
            drop_remainder: false,
            rng: StdRng::seed_from_u64(0),
        })
    }

    pub fn with_transforms(mut self, transforms: Vec<TransformOp>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Training setup: reshuffle every pass and drop the trailing partial batch.
    pub fn for_training(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.drop_remainder = true;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn load_sample(&self, image_path: &Path, mask_path: &Path, rng: &mut StdRng) -> Result<Batch> {
        let decode = |path: &Path| {
            image::open(path).map_err(|source| DataError::Decode { path: path.to_path_buf(), source })
        };
        let img = decode(image_path)?;
        if img.width() as usize != self.dims || img.height() as usize != self.dims {
            return Err(DataError::TileSize {
                path: image_path.to_path_buf(),
                width: img.width(),
                height: img.height(),
                dims: self.dims,
            }
            .into());
        }
        let raw: Vec<u8> = match self.channels {
            1 => img.to_luma8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            4 => img.to_rgba8().into_raw(),
            n => return Err(TrainError::shape(format!("unsupported tile channel count {n}"))),
        };
        let mut image = Tensor4 {
            batch: 1,
            height: self.dims,
            width: self.dims,
            channels: self.channels,
            data: raw.into_iter().map(f64::from).collect(),
        };

        let mask_img = decode(mask_path)?.to_luma8();
        if mask_img.width() as usize != self.dims || mask_img.height() as usize != self.dims {
            return Err(DataError::TileSize {
                path: mask_path.to_path_buf(),
                width: mask_img.width(),
                height: mask_img.height(),
                dims: self.dims,
            }
            .into());
        }
        let mut mask = Tensor4::zeros(1, self.dims, self.dims, self.mask_channels);
        for (i, v) in mask_img.into_raw().into_iter().enumerate() {
            if self.mask_channels == 1 {
                mask.data[i] = if v > 0 { 1.0 } else { 0.0 };
            } else {
                let class = (v as usize).min(self.mask_channels - 1);
                mask.data[i * self.mask_channels + class] = 1.0;
            }
        }

        for op in &self.transforms {
            op.apply(&mut image, &mut mask, rng);
        }
        Batch::new(image, mask)
    }

    fn load_batch(&self, indices: &[usize], rng: &mut StdRng) -> Result<Batch> {
        let mut images = Vec::with_capacity(indices.len());
        let mut masks = Vec::with_capacity(indices.len());
        for &i in indices {
            let (img, mask) = &self.pairs[i];
            let sample = self.load_sample(img, mask, rng)?;
            images.push(sample.image);
            masks.push(sample.mask);
        }
        match (Tensor4::stack(&images), Tensor4::stack(&masks)) {
            (Some(image), Some(mask)) => Batch::new(image, mask),
            _ => Err(TrainError::shape("tiles in one batch disagree in shape")),
        }
    }
}

impl DataLoader for TileFolderLoader {
    fn steps(&self) -> usize {
        if self.drop_remainder {
            self.pairs.len() / self.batch_size
        } else {
            self.pairs.len().div_ceil(self.batch_size)
        }
    }

    fn dataset(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let mut order: Vec<usize> = (0..self.pairs.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let mut aug_rng = StdRng::seed_from_u64(self.rng.gen());
        let steps = self.steps();
        let bs = self.batch_size;
        let this = &*self;
        Box::new((0..steps).map(move |step| {
            let end = ((step + 1) * bs).min(order.len());
            this.load_batch(&order[step * bs..end], &mut aug_rng)
        }))
    }
}
