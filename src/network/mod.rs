pub mod model;
pub mod network;
pub mod spec;

pub use model::{Gradients, SegmentationModel};
pub use network::{PixelCache, PixelNetwork};
pub use spec::{LayerSpec, NetworkSpec};
