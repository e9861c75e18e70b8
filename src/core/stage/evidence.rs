//! 命中证据截图

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use log::debug;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::core::video::{Frame, VideoError};

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JPEG encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Bad frame: {0}")]
    Frame(#[from] VideoError),
}

/// 证据文件的唯一键：阶段 + 类别 + 物品 + 余额
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EvidenceKey {
    pub stage: String,
    pub category: Option<String>,
    pub item: String,
    pub balance: Option<i64>,
}

impl EvidenceKey {
    /// `<stage>_[<category>_]<item>[_<balance>].jpg`
    pub fn file_name(&self) -> String {
        let mut parts = vec![sanitize(&self.stage)];
        if let Some(category) = &self.category {
            parts.push(sanitize(category));
        }
        parts.push(sanitize(&self.item));
        if let Some(balance) = self.balance {
            parts.push(balance.to_string());
        }
        format!("{}.jpg", parts.join("_"))
    }
}

/// 预览图子目录名，阶段目录不能与之重名
pub const PREVIEW_DIR: &str = "previews";

/// 路径分隔符等字符替换成下划线
pub fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub trait EvidenceStore: Send {
    /// 保存命中帧，返回写入位置
    fn save(&mut self, key: &EvidenceKey, frame: &Frame) -> Result<PathBuf, EvidenceError>;

    /// 保存 OCR 叠加预览图
    fn save_preview(&mut self, frame_number: u64, image: &RgbaImage) -> Result<(), EvidenceError>;
}

pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, EvidenceError> {
    // JPEG 不支持 alpha 通道
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb).write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer.into_inner())
}

/// 写到运行目录：`<root>/<stage>/<file>` 与 `<root>/previews/<frame>.jpg`
pub struct FsEvidenceStore {
    root: PathBuf,
    jpeg_quality: u8,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            root: root.into(),
            jpeg_quality,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, path: &Path, image: &RgbaImage) -> Result<(), EvidenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = encode_jpeg(image, self.jpeg_quality)?;
        std::fs::write(path, bytes)?;
        debug!("💾 Wrote {:?}", path);
        Ok(())
    }
}

impl EvidenceStore for FsEvidenceStore {
    fn save(&mut self, key: &EvidenceKey, frame: &Frame) -> Result<PathBuf, EvidenceError> {
        let path = self.root.join(sanitize(&key.stage)).join(key.file_name());
        self.write(&path, &frame.to_image()?)?;
        Ok(path)
    }

    fn save_preview(&mut self, frame_number: u64, image: &RgbaImage) -> Result<(), EvidenceError> {
        let path = self
            .root
            .join(PREVIEW_DIR)
            .join(format!("{:08}.jpg", frame_number));
        self.write(&path, image)
    }
}

/// 只记录键，不落盘。记录通过共享句柄读取。
#[derive(Clone, Default)]
pub struct MemoryEvidenceStore {
    saved: Arc<Mutex<Vec<EvidenceKey>>>,
    previews: Arc<Mutex<Vec<u64>>>,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<EvidenceKey> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn previews(&self) -> Vec<u64> {
        self.previews.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn save(&mut self, key: &EvidenceKey, _frame: &Frame) -> Result<PathBuf, EvidenceError> {
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(key.clone());
        }
        Ok(PathBuf::from(key.file_name()))
    }

    fn save_preview(&mut self, frame_number: u64, _image: &RgbaImage) -> Result<(), EvidenceError> {
        if let Ok(mut previews) = self.previews.lock() {
            previews.push(frame_number);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(category: Option<&str>, balance: Option<i64>) -> EvidenceKey {
        EvidenceKey {
            stage: "兑换后碎片".to_string(),
            category: category.map(str::to_string),
            item: "龙之剑".to_string(),
            balance,
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(key(None, None).file_name(), "兑换后碎片_龙之剑.jpg");
        assert_eq!(key(None, Some(9600)).file_name(), "兑换后碎片_龙之剑_9600.jpg");
        assert_eq!(key(Some("icon"), None).file_name(), "兑换后碎片_icon_龙之剑.jpg");
    }

    #[test]
    fn test_stage_name_is_sanitized() {
        let key = EvidenceKey {
            stage: "shop/after".to_string(),
            category: None,
            item: "Sword".to_string(),
            balance: None,
        };
        assert_eq!(key.file_name(), "shop_after_Sword.jpg");
    }

    #[test]
    fn test_fs_store_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsEvidenceStore::new(dir.path(), 80);
        let frame = Frame::new(8, 8, vec![200u8; 8 * 8 * 4], 0, 3);

        let path = store.save(&key(None, Some(9600)), &frame).unwrap();
        assert_eq!(path, dir.path().join("兑换后碎片").join("兑换后碎片_龙之剑_9600.jpg"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        store
            .save_preview(3, &frame.to_image().unwrap())
            .unwrap();
        assert!(dir.path().join("previews").join("00000003.jpg").exists());
    }

    #[test]
    fn test_memory_store_shares_records() {
        let store = MemoryEvidenceStore::new();
        let mut boxed: Box<dyn EvidenceStore> = Box::new(store.clone());
        let frame = Frame::new(2, 2, vec![0u8; 16], 0, 0);

        boxed.save(&key(None, None), &frame).unwrap();
        assert_eq!(store.saved(), vec![key(None, None)]);
    }
}
