pub mod dice;

pub use dice::{dice_coefficient, sample_dice, threshold_mask};
