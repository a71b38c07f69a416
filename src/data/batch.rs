use crate::data::tensor::Tensor4;
use crate::error::{Result, TrainError};

/// One step's worth of samples: an image tensor and its segmentation mask.
///
/// The mask holds one foreground channel for binary tasks or a one-hot
/// encoding over the classes for multi-class tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub image: Tensor4,
    pub mask: Tensor4,
}

impl Batch {
    /// Builds a batch, rejecting image/mask pairs that disagree on
    /// batch size or spatial resolution.
    pub fn new(image: Tensor4, mask: Tensor4) -> Result<Batch> {
        if image.batch != mask.batch || image.height != mask.height || image.width != mask.width {
            return Err(TrainError::shape(format!(
                "image {:?} and mask {:?} disagree",
                image.shape(),
                mask.shape()
            )));
        }
        Ok(Batch { image, mask })
    }

    pub fn len(&self) -> usize {
        self.image.batch
    }

    pub fn is_empty(&self) -> bool {
        self.image.batch == 0
    }

    /// Splits the batch into `parts` contiguous partitions along the batch
    /// axis. The first `len % parts` partitions get one extra sample; when
    /// there are fewer samples than parts the trailing partitions are empty.
    pub fn partition(&self, parts: usize) -> Vec<Batch> {
        let n = self.len();
        let base = n / parts;
        let extra = n % parts;
        let mut start = 0;
        (0..parts)
            .map(|i| {
                let size = base + usize::from(i < extra);
                let end = start + size;
                let part = Batch {
                    image: self.image.slice_batch(start, end),
                    mask: self.mask.slice_batch(start, end),
                };
                start = end;
                part
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> Batch {
        Batch::new(Tensor4::zeros(n, 2, 2, 3), Tensor4::zeros(n, 2, 2, 1)).unwrap()
    }

    #[test]
    fn partition_spreads_remainder_over_leading_replicas() {
        let sizes: Vec<usize> = batch(7).partition(3).iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn partition_with_more_replicas_than_samples_leaves_empties() {
        let sizes: Vec<usize> = batch(2).partition(4).iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let err = Batch::new(Tensor4::zeros(2, 4, 4, 3), Tensor4::zeros(2, 4, 3, 1));
        assert!(matches!(err, Err(TrainError::Shape(_))));
    }
}
