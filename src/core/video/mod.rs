pub mod deduplicator;
pub mod error;
#[cfg(feature = "video")]
pub mod ffmpeg;
pub mod frame;
pub mod phash;
pub mod source;

pub use deduplicator::{DedupDecision, DedupReason, FrameDeduplicator};
pub use error::VideoError;
pub use frame::Frame;
pub use phash::{Fingerprint, PerceptualHasher};
pub use source::{open_source, sampling_interval, FrameSource, MemorySource, SamplingPlan, VideoInfo};
