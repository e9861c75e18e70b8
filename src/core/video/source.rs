//! 帧来源：按顺序吐出帧，以及视频元数据与采样计划

use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::error::VideoError;
use super::frame::Frame;

/// 视频基本信息
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoInfo {
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// 时长（秒），帧率无效时为 0
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// 顺序读取的帧来源。`read_frame` 返回 `Ok(None)` 表示读到结尾。
pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError>;

    /// 跳到指定帧，之后 `read_frame` 返回该帧。默认实现逐帧读取丢弃。
    fn seek_to(&mut self, index: u64) -> Result<(), VideoError> {
        for _ in 0..index {
            if self.read_frame()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

/// 采样间隔：round(源帧率 / 目标帧率)，至少为 1
pub fn sampling_interval(source_fps: f64, target_fps: f64) -> u64 {
    if source_fps <= 0.0 || target_fps <= 0.0 {
        return 1;
    }
    ((source_fps / target_fps).round() as u64).max(1)
}

/// 固定步长的采样计划
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplingPlan {
    pub interval: u64,
    pub start_frame: u64,
    pub end_frame: Option<u64>,
}

impl SamplingPlan {
    pub fn new(
        info: &VideoInfo,
        target_fps: f64,
        start_sec: f64,
        end_sec: Option<f64>,
    ) -> Result<Self, VideoError> {
        let interval = sampling_interval(info.fps, target_fps);
        let start_frame = (start_sec.max(0.0) * info.fps).floor() as u64;

        if info.frame_count > 0 && start_frame >= info.frame_count {
            return Err(VideoError::StartBeyondEnd {
                start_frame,
                frame_count: info.frame_count,
            });
        }

        let end_frame = end_sec.map(|sec| (sec.max(0.0) * info.fps).ceil() as u64);

        Ok(Self {
            interval,
            start_frame,
            end_frame,
        })
    }

    /// 该帧是否进入哈希/OCR 阶段
    pub fn is_candidate(&self, index: u64) -> bool {
        index % self.interval == 0
    }

    pub fn is_past_end(&self, index: u64) -> bool {
        self.end_frame.is_some_and(|end| index >= end)
    }
}

/// 图片序列目录：按文件名排序，每个文件一帧
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, VideoError> {
        let entries = std::fs::read_dir(dir).map_err(|e| VideoError::Open {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let first = paths.first().ok_or_else(|| VideoError::Open {
            path: dir.to_path_buf(),
            reason: "no image files found".to_string(),
        })?;
        let (width, height) = image::image_dimensions(first)?;

        info!(
            "🎞️ Image sequence opened: {} frames, {}x{}, {:.2} FPS",
            paths.len(),
            width,
            height,
            fps
        );

        Ok(Self {
            paths,
            cursor: 0,
            fps,
            width,
            height,
        })
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "bmp"
            )
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            fps: self.fps,
            frame_count: self.paths.len() as u64,
            width: self.width,
            height: self.height,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let index = self.cursor as u64;
        self.cursor += 1;

        let img = image::open(path)?.to_rgba8();
        let timestamp_ms = (index as f64 * 1000.0 / self.fps) as u64;
        debug!("Read {:?} as frame #{}", path, index);
        Ok(Some(Frame::from_image(img, timestamp_ms, index)))
    }

    fn seek_to(&mut self, index: u64) -> Result<(), VideoError> {
        self.cursor = (index as usize).min(self.paths.len());
        Ok(())
    }
}

/// 内存中的帧列表，用于嵌入调用与测试
pub struct MemorySource {
    frames: std::vec::IntoIter<Frame>,
    info: VideoInfo,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        let info = VideoInfo {
            fps,
            frame_count: frames.len() as u64,
            width,
            height,
        };
        Self {
            frames: frames.into_iter(),
            info,
        }
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        Ok(self.frames.next())
    }
}

/// 目录按图片序列打开，其他路径交给 ffmpeg（需要 `video` feature）
pub fn open_source(path: &Path, sequence_fps: f64) -> Result<Box<dyn FrameSource>, VideoError> {
    if !path.exists() {
        return Err(VideoError::Open {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path, sequence_fps)?));
    }

    #[cfg(feature = "video")]
    {
        Ok(Box::new(super::ffmpeg::FfmpegSource::open(path)?))
    }

    #[cfg(not(feature = "video"))]
    {
        Err(VideoError::Unsupported(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(fps: f64, frame_count: u64) -> VideoInfo {
        VideoInfo {
            fps,
            frame_count,
            width: 64,
            height: 64,
        }
    }

    #[test]
    fn test_interval_from_fps() {
        assert_eq!(sampling_interval(30.0, 3.0), 10);
        assert_eq!(sampling_interval(29.97, 3.0), 10);
        assert_eq!(sampling_interval(60.0, 8.0), 8);
        assert_eq!(sampling_interval(2.0, 3.0), 1);
        assert_eq!(sampling_interval(0.0, 3.0), 1);
    }

    #[test]
    fn test_candidates_on_stride() {
        let plan = SamplingPlan::new(&info(30.0, 300), 3.0, 0.0, None).unwrap();
        assert_eq!(plan.interval, 10);

        let candidates: Vec<u64> = (0..25).filter(|&i| plan.is_candidate(i)).collect();
        assert_eq!(candidates, vec![0, 10, 20]);
        assert_eq!((1..10).filter(|&i| !plan.is_candidate(i)).count(), 9);
    }

    #[test]
    fn test_start_beyond_end_is_fatal() {
        let result = SamplingPlan::new(&info(30.0, 300), 3.0, 10.0, None);
        assert!(matches!(
            result,
            Err(VideoError::StartBeyondEnd {
                start_frame: 300,
                frame_count: 300
            })
        ));
    }

    #[test]
    fn test_window_bounds() {
        let plan = SamplingPlan::new(&info(30.0, 3000), 3.0, 2.0, Some(4.0)).unwrap();
        assert_eq!(plan.start_frame, 60);
        assert_eq!(plan.end_frame, Some(120));
        assert!(!plan.is_past_end(119));
        assert!(plan.is_past_end(120));
    }

    #[test]
    fn test_duration() {
        assert_eq!(info(30.0, 300).duration_secs(), 10.0);
        assert_eq!(info(0.0, 300).duration_secs(), 0.0);
    }

    #[test]
    fn test_memory_source_reads_in_order() {
        let frames = (0..3)
            .map(|i| Frame::new(2, 2, vec![0u8; 16], i * 100, i))
            .collect();
        let mut source = MemorySource::new(frames, 10.0);
        assert_eq!(source.info().frame_count, 3);

        source.seek_to(1).unwrap();
        assert_eq!(source.read_frame().unwrap().unwrap().frame_number, 1);
        assert_eq!(source.read_frame().unwrap().unwrap().frame_number, 2);
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_sequence_source() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3u8 {
            let img = image::RgbaImage::from_pixel(8, 6, image::Rgba([i * 50, 0, 0, 255]));
            img.save(dir.path().join(format!("frame_{:03}.png", i))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();
        let info = source.info();
        assert_eq!(info.frame_count, 3);
        assert_eq!((info.width, info.height), (8, 6));

        source.seek_to(2).unwrap();
        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!(frame.frame_number, 2);
        assert_eq!(frame.data[0], 100);
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_path_cannot_open() {
        let result = open_source(Path::new("/definitely/not/here.mp4"), 30.0);
        assert!(matches!(result, Err(VideoError::Open { .. })));
    }
}
