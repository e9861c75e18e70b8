pub mod command;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod record;

pub use command::{CommandOcrConfig, CommandOcrEngine};
pub use engine::{MockOcrEngine, OcrDetection, OcrEngine};
pub use error::OcrError;
pub use overlay::render_overlay;
pub use record::{OcrAdapter, Roi, TextRecord};
