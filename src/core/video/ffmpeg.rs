//! ffmpeg-next 解码（`video` feature）

use ffmpeg_next as ffmpeg;
use log::info;
use std::path::Path;

use super::error::VideoError;
use super::frame::Frame;
use super::source::{FrameSource, VideoInfo};

fn decode_err(e: ffmpeg::Error) -> VideoError {
    VideoError::Decode(e.to_string())
}

/// 顺序解码视频文件，输出 RGBA 帧
pub struct FfmpegSource {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    info: VideoInfo,
    next_index: u64,
    eof_sent: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let open_err = |reason: String| VideoError::Open {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg::init().map_err(|e| open_err(e.to_string()))?;
        let ictx = ffmpeg::format::input(&path).map_err(|e| open_err(e.to_string()))?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_err("no video stream found".to_string()))?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            f64::from(rate)
        } else {
            0.0
        };
        let frame_count = match stream.frames() {
            n if n > 0 => n as u64,
            _ => {
                let secs = ictx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
                (secs * fps).max(0.0) as u64
            }
        };

        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_err(e.to_string()))?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| open_err(e.to_string()))?;

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGBA,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| open_err(e.to_string()))?;

        let info = VideoInfo {
            fps,
            frame_count,
            width: decoder.width(),
            height: decoder.height(),
        };
        info!(
            "🎬 Video opened: {}x{}, {:.2} FPS, {} frames, format {:?}",
            info.width,
            info.height,
            info.fps,
            info.frame_count,
            decoder.format()
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            info,
            next_index: 0,
            eof_sent: false,
        })
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame, VideoError> {
        let mut rgba = ffmpeg::frame::Video::empty();
        self.scaler.run(decoded, &mut rgba).map_err(decode_err)?;

        let width = self.info.width;
        let height = self.info.height;
        let data = rgba.data(0);
        let stride = rgba.stride(0);

        // stride 可能大于 width*4，逐行拷贝
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height as usize {
            let row_start = y * stride;
            pixels.extend_from_slice(&data[row_start..row_start + width as usize * 4]);
        }

        let index = self.next_index;
        self.next_index += 1;
        let timestamp_ms = if self.info.fps > 0.0 {
            (index as f64 * 1000.0 / self.info.fps) as u64
        } else {
            0
        };
        Ok(Frame::new(width, height, pixels, timestamp_ms, index))
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder.send_packet(&packet).map_err(decode_err)?;
                }
                None => {
                    self.decoder.send_eof().map_err(decode_err)?;
                    self.eof_sent = true;
                }
            }
        }
    }
}
