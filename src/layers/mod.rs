pub mod pixel;

pub use pixel::PixelLayer;
