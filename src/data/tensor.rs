use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;

/// Dense 4-D tensor in NHWC layout (batch, height, width, channels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor4 {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f64>,
}

impl Tensor4 {
    pub fn zeros(batch: usize, height: usize, width: usize, channels: usize) -> Tensor4 {
        Tensor4 {
            batch,
            height,
            width,
            channels,
            data: vec![0.0; batch * height * width * channels],
        }
    }

    /// Number of values held by one sample.
    pub fn sample_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.batch, self.height, self.width, self.channels]
    }

    pub fn index(&self, n: usize, y: usize, x: usize, c: usize) -> usize {
        ((n * self.height + y) * self.width + x) * self.channels + c
    }

    pub fn get(&self, n: usize, y: usize, x: usize, c: usize) -> f64 {
        self.data[self.index(n, y, x, c)]
    }

    pub fn set(&mut self, n: usize, y: usize, x: usize, c: usize, value: f64) {
        let i = self.index(n, y, x, c);
        self.data[i] = value;
    }

    /// Values of sample `n`, laid out HWC.
    pub fn sample(&self, n: usize) -> &[f64] {
        let len = self.sample_len();
        &self.data[n * len..(n + 1) * len]
    }

    /// Copies samples `start..end` into a new tensor.
    pub fn slice_batch(&self, start: usize, end: usize) -> Tensor4 {
        let len = self.sample_len();
        Tensor4 {
            batch: end - start,
            height: self.height,
            width: self.width,
            channels: self.channels,
            data: self.data[start * len..end * len].to_vec(),
        }
    }

    /// Concatenates same-shaped samples along the batch axis.
    pub fn stack(samples: &[Tensor4]) -> Option<Tensor4> {
        let first = samples.first()?;
        let mut out = Tensor4 {
            batch: 0,
            height: first.height,
            width: first.width,
            channels: first.channels,
            data: Vec::with_capacity(samples.iter().map(|s| s.data.len()).sum()),
        };
        for s in samples {
            if (s.height, s.width, s.channels) != (first.height, first.width, first.channels) {
                return None;
            }
            out.batch += s.batch;
            out.data.extend_from_slice(&s.data);
        }
        Some(out)
    }

    /// Views every pixel as a row: (batch * height * width) x channels.
    pub fn to_pixel_rows(&self) -> Matrix {
        if self.channels == 0 {
            return Matrix::zeros(self.data.len(), 0);
        }
        Matrix {
            rows: self.batch * self.height * self.width,
            cols: self.channels,
            data: self.data.chunks(self.channels).map(|c| c.to_vec()).collect(),
        }
    }

    /// Inverse of `to_pixel_rows`.
    pub fn from_pixel_rows(rows: &Matrix, batch: usize, height: usize, width: usize) -> Tensor4 {
        Tensor4 {
            batch,
            height,
            width,
            channels: rows.cols,
            data: rows.data.iter().flat_map(|r| r.iter().copied()).collect(),
        }
    }
}
