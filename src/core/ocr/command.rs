//! 外部进程 OCR：把帧写成 PNG，调用命令，从 stdout 读取 JSON
//!
//! 支持两种输出：
//! - `[{"text": "...", "score": 0.98, "box": [x1, y1, x2, y2]}, ...]`
//! - PaddleOCR 风格 `[{"rec_texts": [...], "rec_scores": [...], "rec_boxes": [[...]]}]`
//!   （单个对象亦可）

use image::RgbaImage;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use super::engine::{OcrDetection, OcrEngine};
use super::error::OcrError;
use crate::core::text::BBox;
use crate::core::video::Frame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOcrConfig {
    /// 可执行文件
    pub command: String,
    /// 参数，图片路径追加在最后
    #[serde(default)]
    pub args: Vec<String>,
    /// 临时图片目录，默认系统临时目录
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

pub struct CommandOcrEngine {
    config: CommandOcrConfig,
    scratch_dir: PathBuf,
    counter: AtomicU64,
}

impl CommandOcrEngine {
    pub fn new(config: CommandOcrConfig) -> Result<Self, OcrError> {
        let scratch_dir = config
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&scratch_dir)?;
        Ok(Self {
            config,
            scratch_dir,
            counter: AtomicU64::new(0),
        })
    }

    fn scratch_path(&self, frame_number: u64) -> PathBuf {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!(
            "ocr-{}-{}-{}.png",
            std::process::id(),
            frame_number,
            seq
        ))
    }

    fn run(&self, frame: &Frame, image_path: &PathBuf) -> Result<Vec<OcrDetection>, OcrError> {
        let img = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(
            || OcrError::Failed {
                frame_number: frame.frame_number,
                reason: "frame buffer does not fit dimensions".to_string(),
            },
        )?;
        img.save(image_path)?;

        let output = Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(image_path)
            .output()
            .map_err(|e| {
                error!("❌ Failed to launch OCR command {}: {}", self.config.command, e);
                OcrError::Unavailable(format!("{}: {}", self.config.command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed {
                frame_number: frame.frame_number,
                reason: format!("exit status {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("OCR output for frame #{}: {}", frame.frame_number, stdout.trim());
        parse_output(stdout.trim())
    }
}

impl OcrEngine for CommandOcrEngine {
    fn recognize(&self, frame: &Frame) -> Result<Vec<OcrDetection>, OcrError> {
        let image_path = self.scratch_path(frame.frame_number);
        let result = self.run(frame, &image_path);
        let _ = std::fs::remove_file(&image_path);
        result
    }

    fn name(&self) -> &str {
        &self.config.command
    }
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    text: String,
    score: f32,
    #[serde(rename = "box")]
    bbox: [f32; 4],
}

#[derive(Debug, Deserialize)]
struct PaddleResult {
    rec_texts: Vec<String>,
    rec_scores: Vec<f32>,
    rec_boxes: Vec<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireOutput {
    Flat(Vec<WireDetection>),
    PaddleList(Vec<PaddleResult>),
    Paddle(PaddleResult),
}

fn to_bbox(b: [f32; 4]) -> BBox {
    BBox::new(b[0], b[1], b[2], b[3])
}

/// 空输出视为零检测
pub fn parse_output(stdout: &str) -> Result<Vec<OcrDetection>, OcrError> {
    if stdout.is_empty() {
        return Ok(Vec::new());
    }

    let detections = match serde_json::from_str::<WireOutput>(stdout)? {
        WireOutput::Flat(items) => items
            .into_iter()
            .map(|d| OcrDetection::new(d.text, d.score, to_bbox(d.bbox)))
            .collect(),
        WireOutput::PaddleList(results) => results.into_iter().flat_map(paddle_detections).collect(),
        WireOutput::Paddle(result) => paddle_detections(result),
    };
    Ok(detections)
}

fn paddle_detections(result: PaddleResult) -> Vec<OcrDetection> {
    result
        .rec_texts
        .into_iter()
        .zip(result.rec_scores)
        .zip(result.rec_boxes)
        .map(|((text, score), bbox)| OcrDetection::new(text, score, to_bbox(bbox)))
        .collect()
}
