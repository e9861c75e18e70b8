pub mod locator;
pub mod normalizer;

pub use locator::{locate, BBox, PositionTag};
pub use normalizer::{clean, strip_level_suffix, LevelSuffix};
