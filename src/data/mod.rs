pub mod batch;
pub mod loader;
pub mod stats;
pub mod synthetic;
pub mod tensor;
pub mod tiles;
pub mod transform;

pub use batch::Batch;
pub use loader::{DataLoader, InMemoryLoader};
pub use stats::{channel_stats, png_files, ChannelStats};
pub use synthetic::SyntheticTiles;
pub use tensor::Tensor4;
pub use tiles::TileFolderLoader;
pub use transform::{TransformKind, TransformOp};
