pub mod events;
pub mod runner;
pub mod summary;

pub use events::{
    EventSink, JsonlEventSink, LogEventSink, MemoryEventSink, PipelineEvent, TeeEventSink,
};
pub use runner::{ProcessorOptions, VideoProcessor};
pub use summary::{format_duration, CategorySummary, RunStats, RunSummary, StageSummary};

use thiserror::Error;

use crate::core::catalog::CatalogError;
use crate::core::config::ConfigError;
use crate::core::ocr::OcrError;
use crate::core::video::VideoError;

/// 导致整次运行中止的错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("OCR engine error: {0}")]
    Ocr(#[from] OcrError),
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
    #[error("Summary serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot build OCR worker pool: {0}")]
    ThreadPool(String),
}
