use image::{imageops, RgbaImage};
use std::time::Duration;

use super::error::VideoError;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    pub fn from_image(image: RgbaImage, timestamp_ms: u64, frame_number: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw(), timestamp_ms, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 像素缓冲与宽高不匹配时返回错误，该帧会被跳过
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::MalformedFrame {
                frame_number: self.frame_number,
                reason: "zero-sized frame".to_string(),
            });
        }
        let expected = self.pixel_count() * 4;
        if self.data.len() != expected {
            return Err(VideoError::MalformedFrame {
                frame_number: self.frame_number,
                reason: format!("expected {} bytes, got {}", expected, self.data.len()),
            });
        }
        Ok(())
    }

    pub fn to_image(&self) -> Result<RgbaImage, VideoError> {
        self.validate()?;
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            VideoError::MalformedFrame {
                frame_number: self.frame_number,
                reason: "buffer does not fit dimensions".to_string(),
            }
        })
    }

    /// 裁剪出子区域，区域会被夹到帧范围内
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Frame, VideoError> {
        let img = self.to_image()?;
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let w = width.min(self.width - x).max(1);
        let h = height.min(self.height - y).max(1);
        let cropped = imageops::crop_imm(&img, x, y, w, h).to_image();

        Ok(Frame {
            width: w,
            height: h,
            data: cropped.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_image_keeps_metadata() {
        let img = RgbaImage::from_pixel(16, 9, image::Rgba([10, 20, 30, 255]));
        let frame = Frame::from_image(img, 1500, 45);

        assert_eq!((frame.width, frame.height), (16, 9));
        assert_eq!(frame.pixel_count(), 144);
        assert_eq!(frame.timestamp_ms(), 1500);
        assert_eq!(frame.frame_number, 45);
        assert_eq!(frame.to_image().unwrap().get_pixel(3, 3).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_crop_is_clamped() {
        let frame = Frame::new(100, 50, vec![0u8; 100 * 50 * 4], 0, 7);
        let cropped = frame.crop(80, 40, 50, 50).unwrap();

        assert_eq!(cropped.width, 20);
        assert_eq!(cropped.height, 10);
        assert_eq!(cropped.frame_number, 7);
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let short = Frame::new(10, 10, vec![0u8; 12], 0, 3);
        assert!(matches!(
            short.validate(),
            Err(VideoError::MalformedFrame { frame_number: 3, .. })
        ));

        let empty = Frame::new(0, 10, vec![], 0, 4);
        assert!(empty.validate().is_err());
    }
}
