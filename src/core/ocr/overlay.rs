//! 识别预览图：九宫格分界线（绿）+ 每个文本框（红）

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::record::TextRecord;
use crate::core::text::BBox;
use crate::core::video::{Frame, VideoError};

const GRID_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BOX_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const THICKNESS: u32 = 2;

pub fn render_overlay(frame: &Frame, records: &[TextRecord]) -> Result<RgbaImage, VideoError> {
    let mut img = frame.to_image()?;
    let (w, h) = img.dimensions();

    for x in [w / 4, w * 3 / 4] {
        draw_filled_rect_mut(&mut img, Rect::at(x as i32, 0).of_size(THICKNESS, h), GRID_COLOR);
    }
    for y in [h / 4, h * 3 / 4] {
        draw_filled_rect_mut(&mut img, Rect::at(0, y as i32).of_size(w, THICKNESS), GRID_COLOR);
    }

    for record in records {
        let Some(rect) = clamped_rect(&record.bbox, w, h) else {
            continue;
        };
        // 逐层内缩画空心框得到线宽
        for t in 0..THICKNESS {
            if rect.width() <= 2 * t || rect.height() <= 2 * t {
                break;
            }
            let inner = Rect::at(rect.left() + t as i32, rect.top() + t as i32)
                .of_size(rect.width() - 2 * t, rect.height() - 2 * t);
            draw_hollow_rect_mut(&mut img, inner, BOX_COLOR);
        }
    }
    Ok(img)
}

/// 框夹到画面内，退化为空时返回 None
fn clamped_rect(bbox: &BBox, w: u32, h: u32) -> Option<Rect> {
    if w == 0 || h == 0 {
        return None;
    }
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(h - 1);

    let (x1, x2) = (clamp_x(bbox.x1.min(bbox.x2)), clamp_x(bbox.x1.max(bbox.x2)));
    let (y1, y2) = (clamp_y(bbox.y1.min(bbox.y2)), clamp_y(bbox.y1.max(bbox.y2)));
    Some(Rect::at(x1 as i32, y1 as i32).of_size(x2 - x1 + 1, y2 - y1 + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::text::PositionTag;

    fn record(bbox: BBox) -> TextRecord {
        TextRecord {
            raw_text: "x".to_string(),
            cleaned_text: "x".to_string(),
            confidence: 1.0,
            bbox,
            position: PositionTag::Center,
        }
    }

    #[test]
    fn test_overlay_draws_grid_and_boxes() {
        let frame = Frame::new(100, 100, vec![0u8; 100 * 100 * 4], 0, 0);
        let img = render_overlay(&frame, &[record(BBox::new(40.0, 40.0, 60.0, 60.0))]).unwrap();

        assert_eq!(*img.get_pixel(25, 10), GRID_COLOR);
        assert_eq!(*img.get_pixel(10, 75), GRID_COLOR);
        assert_eq!(*img.get_pixel(50, 40), BOX_COLOR);
        assert_eq!(*img.get_pixel(40, 50), BOX_COLOR);
        // 框内部不填充
        assert_eq!(*img.get_pixel(50, 50), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_box_is_clamped() {
        let frame = Frame::new(20, 20, vec![0u8; 20 * 20 * 4], 0, 0);
        let img = render_overlay(&frame, &[record(BBox::new(-5.0, -5.0, 50.0, 50.0))]).unwrap();
        assert_eq!(*img.get_pixel(0, 0), BOX_COLOR);
        assert_eq!(*img.get_pixel(19, 19), BOX_COLOR);
    }

    #[test]
    fn test_box_outline_has_thickness() {
        let frame = Frame::new(100, 100, vec![0u8; 100 * 100 * 4], 0, 0);
        let img = render_overlay(&frame, &[record(BBox::new(40.0, 40.0, 60.0, 60.0))]).unwrap();

        assert_eq!(*img.get_pixel(50, 41), BOX_COLOR);
        assert_eq!(*img.get_pixel(59, 50), BOX_COLOR);
        assert_eq!(*img.get_pixel(50, 42), Rgba([0, 0, 0, 0]));
    }
}
