//! 九宫格方位判断

use serde::{Deserialize, Serialize};
use std::fmt;

/// 两点式矩形框 (x1, y1, x2, y2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }
}

/// 文本框中心所在的屏幕区域。
///
/// 只有一个轴落在中间带时，中间带并入另一个轴的方向：
/// 垂直居中 + 水平靠左 → `LeftCenter`，水平居中 + 垂直靠上 → `TopCenter`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionTag {
    #[serde(alias = "左上")]
    TopLeft,
    #[serde(alias = "上中")]
    TopCenter,
    #[serde(alias = "右上")]
    TopRight,
    #[serde(alias = "左中", alias = "middle-left")]
    LeftCenter,
    #[serde(alias = "中间")]
    Center,
    #[serde(alias = "右中", alias = "middle-right")]
    RightCenter,
    #[serde(alias = "左下")]
    BottomLeft,
    #[serde(alias = "下中")]
    BottomCenter,
    #[serde(alias = "右下")]
    BottomRight,
}

impl PositionTag {
    pub const ALL: [PositionTag; 9] = [
        PositionTag::TopLeft,
        PositionTag::TopCenter,
        PositionTag::TopRight,
        PositionTag::LeftCenter,
        PositionTag::Center,
        PositionTag::RightCenter,
        PositionTag::BottomLeft,
        PositionTag::BottomCenter,
        PositionTag::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionTag::TopLeft => "top-left",
            PositionTag::TopCenter => "top-center",
            PositionTag::TopRight => "top-right",
            PositionTag::LeftCenter => "left-center",
            PositionTag::Center => "center",
            PositionTag::RightCenter => "right-center",
            PositionTag::BottomLeft => "bottom-left",
            PositionTag::BottomCenter => "bottom-center",
            PositionTag::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for PositionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Low,
    Mid,
    High,
}

fn band(value: f32, low_bound: u32, high_bound: u32) -> Band {
    if value < low_bound as f32 {
        Band::Low
    } else if value > high_bound as f32 {
        Band::High
    } else {
        Band::Mid
    }
}

/// 分界线为 int(w/4)、int(3w/4)、int(h/4)、int(3h/4)
pub fn locate(bbox: &BBox, frame_width: u32, frame_height: u32) -> PositionTag {
    let (cx, cy) = bbox.center();
    let horizontal = band(cx, frame_width / 4, frame_width * 3 / 4);
    let vertical = band(cy, frame_height / 4, frame_height * 3 / 4);

    match (vertical, horizontal) {
        (Band::Mid, Band::Mid) => PositionTag::Center,
        (Band::Low, Band::Mid) => PositionTag::TopCenter,
        (Band::High, Band::Mid) => PositionTag::BottomCenter,
        (Band::Mid, Band::Low) => PositionTag::LeftCenter,
        (Band::Mid, Band::High) => PositionTag::RightCenter,
        (Band::Low, Band::Low) => PositionTag::TopLeft,
        (Band::Low, Band::High) => PositionTag::TopRight,
        (Band::High, Band::Low) => PositionTag::BottomLeft,
        (Band::High, Band::High) => PositionTag::BottomRight,
    }
}
