//! DCT 感知哈希
//!
//! 灰度 → 缩放到 (4·N)² → 二维 DCT-II → 取左上 N×N 低频块 → 高于中位数的位置 1。
//! 视觉上相似的帧汉明距离小。

use image::{imageops, DynamicImage};
use rustdct::{Dct2, DctPlanner, TransformType2And3};
use std::fmt;
use std::sync::Arc;

use super::error::VideoError;
use super::frame::Frame;

/// 低频块相对哈希边长的放大倍数
const HIGHFREQ_FACTOR: usize = 4;

/// 定长位向量指纹，计算后不可变
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    words: Vec<u64>,
    bits: usize,
}

impl Fingerprint {
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut words = vec![0u64; bits.len().div_ceil(64)];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                words[i / 64] |= 1 << (i % 64);
            }
        }
        Self {
            words,
            bits: bits.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// 汉明距离；长度不同时多出的位全部算作不同
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        let common: u32 = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        common + self.bits.abs_diff(other.bits) as u32
    }

    pub fn to_hex(&self) -> String {
        self.words.iter().map(|w| format!("{:016x}", w)).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}b:{})", self.bits, self.to_hex())
    }
}

pub fn is_duplicate(new: &Fingerprint, last: &Fingerprint, threshold: u32) -> bool {
    new.distance(last) <= threshold
}

pub struct PerceptualHasher {
    hash_size: usize,
    dct: Arc<dyn TransformType2And3<f32>>,
}

impl PerceptualHasher {
    pub fn new(hash_size: usize) -> Self {
        let hash_size = hash_size.max(2);
        let mut planner = DctPlanner::new();
        let dct = planner.plan_dct2(hash_size * HIGHFREQ_FACTOR);
        Self { hash_size, dct }
    }

    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    pub fn bits(&self) -> usize {
        self.hash_size * self.hash_size
    }

    pub fn hash(&self, frame: &Frame) -> Result<Fingerprint, VideoError> {
        let img = frame.to_image()?;
        let side = self.hash_size * HIGHFREQ_FACTOR;
        let gray = DynamicImage::ImageRgba8(img).to_luma8();
        let small = imageops::resize(
            &gray,
            side as u32,
            side as u32,
            imageops::FilterType::Lanczos3,
        );

        let mut pixels: Vec<f32> = small.into_raw().into_iter().map(f32::from).collect();

        // 行变换
        for row in pixels.chunks_exact_mut(side) {
            self.dct.process_dct2(row);
        }
        // 列变换
        let mut column = vec![0f32; side];
        for x in 0..side {
            for y in 0..side {
                column[y] = pixels[y * side + x];
            }
            self.dct.process_dct2(&mut column);
            for y in 0..side {
                pixels[y * side + x] = column[y];
            }
        }

        let n = self.hash_size;
        let mut low: Vec<f32> = Vec::with_capacity(n * n);
        for y in 0..n {
            low.extend_from_slice(&pixels[y * side..y * side + n]);
        }

        let med = median(&low);
        let bits: Vec<bool> = low.iter().map(|&v| v > med).collect();
        Ok(Fingerprint::from_bits(&bits))
    }
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
