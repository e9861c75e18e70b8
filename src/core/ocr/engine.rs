use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::OcrError;
use crate::core::text::BBox;
use crate::core::video::Frame;

/// OCR 原始结果：文本、置信度、两点矩形框（输入图像自身坐标系）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDetection {
    pub text: String,
    pub score: f32,
    #[serde(rename = "box")]
    pub bbox: BBox,
}

impl OcrDetection {
    pub fn new(text: impl Into<String>, score: f32, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            score,
            bbox,
        }
    }
}

/// 外部 OCR 引擎。对调用方无状态，整个运行共用一个实例。
/// 返回顺序不做任何保证。
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, frame: &Frame) -> Result<Vec<OcrDetection>, OcrError>;

    fn name(&self) -> &str {
        "ocr"
    }
}

type Script = Box<dyn Fn(u64) -> Result<Vec<OcrDetection>, OcrError> + Send + Sync>;

/// 按帧号回放预设结果的引擎
pub struct MockOcrEngine {
    script: Option<Script>,
}

impl MockOcrEngine {
    pub fn new() -> Self {
        Self { script: None }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Vec<OcrDetection> + Send + Sync + 'static,
    {
        Self {
            script: Some(Box::new(move |n| Ok(pattern(n)))),
        }
    }

    pub fn with_fallible<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Result<Vec<OcrDetection>, OcrError> + Send + Sync + 'static,
    {
        Self {
            script: Some(Box::new(pattern)),
        }
    }

    pub fn with_fixed_frames(frames: HashMap<u64, Vec<OcrDetection>>) -> Self {
        Self::with_pattern(move |n| frames.get(&n).cloned().unwrap_or_default())
    }
}

impl Default for MockOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, frame: &Frame) -> Result<Vec<OcrDetection>, OcrError> {
        match &self.script {
            Some(script) => script(frame.frame_number),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u64) -> Frame {
        Frame::new(4, 4, vec![0u8; 64], 0, n)
    }

    #[test]
    fn test_mock_fixed_frames() {
        let mut frames = HashMap::new();
        frames.insert(
            5,
            vec![OcrDetection::new("总计", 0.99, BBox::new(0.0, 0.0, 2.0, 2.0))],
        );
        let engine = MockOcrEngine::with_fixed_frames(frames);

        assert_eq!(engine.recognize(&frame(5)).unwrap().len(), 1);
        assert!(engine.recognize(&frame(6)).unwrap().is_empty());
    }

    #[test]
    fn test_mock_failure() {
        let engine = MockOcrEngine::with_fallible(|n| {
            Err(OcrError::Failed {
                frame_number: n,
                reason: "boom".to_string(),
            })
        });
        let err = engine.recognize(&frame(1)).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_detection_json_uses_box_key() {
        let det: OcrDetection = serde_json::from_str(
            r#"{"text":"Sword","score":0.9,"box":{"x1":1,"y1":2,"x2":3,"y2":4}}"#,
        )
        .unwrap();
        assert_eq!(det.bbox, BBox::new(1.0, 2.0, 3.0, 4.0));
    }
}
