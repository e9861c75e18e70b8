use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Cannot open video {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Start frame {start_frame} is beyond the video length ({frame_count} frames)")]
    StartBeyondEnd { start_frame: u64, frame_count: u64 },
    #[error("Malformed frame #{frame_number}: {reason}")]
    MalformedFrame { frame_number: u64, reason: String },
    #[error("Video decoding is not enabled (build with the `video` feature): {0:?}")]
    Unsupported(PathBuf),
}
