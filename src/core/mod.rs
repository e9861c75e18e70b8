pub mod catalog;
pub mod config;
pub mod ocr;
pub mod pipeline;
pub mod stage;
pub mod text;
pub mod video;
