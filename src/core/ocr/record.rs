use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::engine::{OcrDetection, OcrEngine};
use super::error::OcrError;
use crate::core::text::{clean, locate, BBox, PositionTag};
use crate::core::video::Frame;

/// 一帧中的一条结构化文本
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRecord {
    pub raw_text: String,
    pub cleaned_text: String,
    pub confidence: f32,
    pub bbox: BBox,
    pub position: PositionTag,
}

impl TextRecord {
    /// `bbox` 必须已是整帧坐标
    pub fn from_detection(detection: OcrDetection, frame_width: u32, frame_height: u32) -> Self {
        let position = locate(&detection.bbox, frame_width, frame_height);
        Self {
            cleaned_text: clean(&detection.text),
            raw_text: detection.text,
            confidence: detection.score,
            bbox: detection.bbox,
            position,
        }
    }
}

/// 识别区域（整帧坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 帧 → OCR → TextRecord 列表
///
/// 设置了 ROI 时只把裁剪后的子图交给引擎，再把框平移回整帧坐标；
/// 方位始终按整帧宽高判断。
#[derive(Clone)]
pub struct OcrAdapter {
    engine: Arc<dyn OcrEngine>,
    roi: Option<Roi>,
    min_score: f32,
}

impl OcrAdapter {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            roi: None,
            min_score: 0.0,
        }
    }

    pub fn with_roi(mut self, roi: Option<Roi>) -> Self {
        self.roi = roi;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn recognize(&self, frame: &Frame) -> Result<Vec<TextRecord>, OcrError> {
        let (detections, dx, dy) = match self.roi {
            Some(roi) => {
                if roi.x >= frame.width || roi.y >= frame.height {
                    return Err(OcrError::RoiOutsideFrame {
                        x: roi.x,
                        y: roi.y,
                        width: frame.width,
                        height: frame.height,
                    });
                }
                let region = frame
                    .crop(roi.x, roi.y, roi.width, roi.height)
                    .map_err(|e| OcrError::Failed {
                        frame_number: frame.frame_number,
                        reason: e.to_string(),
                    })?;
                (self.engine.recognize(&region)?, roi.x as f32, roi.y as f32)
            }
            None => (self.engine.recognize(frame)?, 0.0, 0.0),
        };

        let total = detections.len();
        let records: Vec<TextRecord> = detections
            .into_iter()
            .filter(|d| d.score >= self.min_score)
            .map(|mut d| {
                d.bbox = d.bbox.translate(dx, dy);
                TextRecord::from_detection(d, frame.width, frame.height)
            })
            .collect();

        if records.len() < total {
            debug!(
                "Frame #{}: dropped {} detections below score {:.2}",
                frame.frame_number,
                total - records.len(),
                self.min_score
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::engine::MockOcrEngine;

    fn frame(n: u64) -> Frame {
        Frame::new(400, 200, vec![0u8; 400 * 200 * 4], 0, n)
    }

    fn engine() -> Arc<dyn OcrEngine> {
        Arc::new(MockOcrEngine::with_pattern(|_| {
            vec![
                OcrDetection::new("【龙之剑】", 0.95, BBox::new(10.0, 10.0, 30.0, 20.0)),
                OcrDetection::new("噪声", 0.3, BBox::new(0.0, 0.0, 5.0, 5.0)),
            ]
        }))
    }

    #[test]
    fn test_records_are_cleaned_and_located() {
        let adapter = OcrAdapter::new(engine());
        let records = adapter.recognize(&frame(1)).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw_text, "【龙之剑】");
        assert_eq!(records[0].cleaned_text, "龙之剑");
        assert_eq!(records[0].position, PositionTag::TopLeft);
    }

    #[test]
    fn test_min_score_filters() {
        let adapter = OcrAdapter::new(engine()).with_min_score(0.5);
        let records = adapter.recognize(&frame(1)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cleaned_text, "龙之剑");
    }

    #[test]
    fn test_roi_boxes_translated_to_frame_coordinates() {
        let adapter = OcrAdapter::new(engine()).with_roi(Some(Roi {
            x: 300,
            y: 150,
            width: 100,
            height: 50,
        }));
        let records = adapter.recognize(&frame(1)).unwrap();

        assert_eq!(records[0].bbox, BBox::new(310.0, 160.0, 330.0, 170.0));
        assert_eq!(records[0].position, PositionTag::BottomRight);
    }

    #[test]
    fn test_roi_outside_frame_is_fatal() {
        let engine = Arc::new(MockOcrEngine::with_pattern(|_| {
            vec![OcrDetection::new("龙之剑", 0.9, BBox::new(0.0, 0.0, 1.0, 1.0))]
        }));
        let adapter = OcrAdapter::new(engine).with_roi(Some(Roi {
            x: 1000,
            y: 1000,
            width: 50,
            height: 50,
        }));

        let err = adapter.recognize(&frame(1)).unwrap_err();
        assert!(matches!(
            err,
            OcrError::RoiOutsideFrame {
                x: 1000,
                width: 400,
                ..
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_zero_detections_is_empty_not_error() {
        let adapter = OcrAdapter::new(Arc::new(MockOcrEngine::new()));
        assert!(adapter.recognize(&frame(2)).unwrap().is_empty());
    }
}
