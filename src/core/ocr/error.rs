use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    /// 引擎无法启动或无响应，整个运行终止
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
    /// ROI 与帧没有交集，后续每一帧都会同样失败
    #[error("ROI origin ({x}, {y}) lies outside the {width}x{height} frame")]
    RoiOutsideFrame {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("OCR failed on frame #{frame_number}: {reason}")]
    Failed { frame_number: u64, reason: String },
    #[error("OCR output malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl OcrError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OcrError::Unavailable(_) | OcrError::RoiOutsideFrame { .. }
        )
    }
}
