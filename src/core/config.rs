//! 运行配置：JSON5 文件，加载时校验一次

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::ocr::{CommandOcrConfig, Roi};
use crate::core::stage::evidence::{sanitize, PREVIEW_DIR};
use crate::core::stage::{StageConfig, StageKindConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config parse failed: {0}")]
    Parse(#[from] json5::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub video_path: PathBuf,
    pub catalog_path: PathBuf,
    /// 每次运行在该目录下创建一个时间戳子目录
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,
    /// 图片序列输入的帧率
    #[serde(default = "default_sequence_fps")]
    pub sequence_fps: f64,
    #[serde(default = "default_hash_size")]
    pub hash_size: usize,
    #[serde(default = "default_hamming_threshold")]
    pub hamming_threshold: u32,
    /// 兑换前的碎片余额，有数值推断阶段时必填
    #[serde(default)]
    pub initial_balance: Option<i64>,
    #[serde(default)]
    pub start_sec: f64,
    #[serde(default)]
    pub end_sec: Option<f64>,
    #[serde(default)]
    pub roi: Option<Roi>,
    #[serde(default)]
    pub min_score: f32,
    /// 大于 1 时批量并行 OCR；0 表示按 CPU 核数
    #[serde(default = "default_ocr_workers")]
    pub ocr_workers: usize,
    #[serde(default = "default_true")]
    pub save_previews: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub ocr: Option<CommandOcrConfig>,
    pub stages: Vec<StageConfig>,
}

/// OCR 临时文件的默认子目录
pub const SCRATCH_DIR: &str = "scratch";

fn default_output_root() -> PathBuf {
    PathBuf::from("runs")
}

fn default_target_fps() -> f64 {
    3.0
}

fn default_sequence_fps() -> f64 {
    30.0
}

fn default_hash_size() -> usize {
    16
}

fn default_hamming_threshold() -> u32 {
    12
}

fn default_ocr_workers() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    90
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("⚙️ Loading run config: {:?}", path);
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json5(&raw)?;

        // 相对路径按配置文件所在目录解析
        if let Some(base) = path.parent() {
            config.video_path = resolve(base, &config.video_path);
            config.catalog_path = resolve(base, &config.catalog_path);
            config.output_root = resolve(base, &config.output_root);
        }
        Ok(config)
    }

    pub fn from_json5(raw: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = json5::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_fps > 0.0) {
            return Err(invalid(format!("target_fps must be > 0, got {}", self.target_fps)));
        }
        if !(self.sequence_fps > 0.0) {
            return Err(invalid(format!(
                "sequence_fps must be > 0, got {}",
                self.sequence_fps
            )));
        }
        if self.hash_size < 2 {
            return Err(invalid(format!("hash_size must be >= 2, got {}", self.hash_size)));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(invalid(format!("min_score must be in [0, 1], got {}", self.min_score)));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(invalid(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.start_sec < 0.0 {
            return Err(invalid("start_sec must not be negative"));
        }
        if let Some(end) = self.end_sec {
            if end <= self.start_sec {
                return Err(invalid(format!(
                    "end_sec ({}) must be after start_sec ({})",
                    end, self.start_sec
                )));
            }
        }
        if let Some(roi) = self.roi {
            if roi.width == 0 || roi.height == 0 {
                return Err(invalid("roi must have a non-zero size"));
            }
        }
        if self.stages.is_empty() {
            return Err(invalid("at least one stage is required"));
        }

        // 阶段名清洗后作为证据子目录名
        let mut dirs = HashSet::new();
        for stage in &self.stages {
            stage.validate()?;
            let dir = sanitize(&stage.name);
            if dir == PREVIEW_DIR || dir == SCRATCH_DIR {
                return Err(invalid(format!("stage name {:?} is reserved", stage.name)));
            }
            if !dirs.insert(dir) {
                return Err(invalid(format!(
                    "duplicate stage name {:?} (evidence directories collide)",
                    stage.name
                )));
            }
        }

        let needs_balance = self
            .stages
            .iter()
            .any(|s| matches!(s.kind, StageKindConfig::NumericInferenceScan { .. }));
        if needs_balance && self.initial_balance.is_none() {
            return Err(invalid(
                "initial_balance is required when a numeric_inference_scan stage is configured",
            ));
        }
        Ok(())
    }

    /// 0 表示按 CPU 核数
    pub fn effective_ocr_workers(&self) -> usize {
        if self.ocr_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.ocr_workers
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
