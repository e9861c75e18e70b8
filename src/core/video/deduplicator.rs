use super::error::VideoError;
use super::frame::Frame;
use super::phash::{is_duplicate, Fingerprint, PerceptualHasher};

/// 单槽去重器 - 只和最后一次保留的帧比较
///
/// 基准只在保留帧时更新，所以一串缓慢漂移的重复帧最终会和最后保留的帧拉开距离，
/// 而不是和前一帧比较后一直被判为重复。
pub struct FrameDeduplicator {
    hasher: PerceptualHasher,
    /// 汉明距离阈值，小于等于即重复
    threshold: u32,
    last_kept: Option<Fingerprint>,
    kept: u64,
}

/// 去重决策结果
#[derive(Debug, Clone)]
pub struct DedupDecision {
    pub is_duplicate: bool,
    pub reason: DedupReason,
    /// 与最后保留帧的汉明距离，首帧为 None
    pub distance: Option<u32>,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DedupReason {
    FirstFrame, // 首帧，保留
    Changed,    // 距离超过阈值，保留
    TooSimilar, // 太相似，去重
}

impl FrameDeduplicator {
    pub fn new(hash_size: usize, threshold: u32) -> Self {
        Self {
            hasher: PerceptualHasher::new(hash_size),
            threshold,
            last_kept: None,
            kept: 0,
        }
    }

    /// 计算指纹并决定去留；保留时更新基准
    pub fn check(&mut self, frame: &Frame) -> Result<DedupDecision, VideoError> {
        let fingerprint = self.hasher.hash(frame)?;
        Ok(self.check_fingerprint(fingerprint))
    }

    pub fn check_fingerprint(&mut self, fingerprint: Fingerprint) -> DedupDecision {
        let decision = match &self.last_kept {
            None => DedupDecision {
                is_duplicate: false,
                reason: DedupReason::FirstFrame,
                distance: None,
                fingerprint,
            },
            Some(last) => {
                let distance = fingerprint.distance(last);
                if is_duplicate(&fingerprint, last, self.threshold) {
                    DedupDecision {
                        is_duplicate: true,
                        reason: DedupReason::TooSimilar,
                        distance: Some(distance),
                        fingerprint,
                    }
                } else {
                    DedupDecision {
                        is_duplicate: false,
                        reason: DedupReason::Changed,
                        distance: Some(distance),
                        fingerprint,
                    }
                }
            }
        };

        if !decision.is_duplicate {
            self.last_kept = Some(decision.fingerprint.clone());
            self.kept += 1;
        }
        decision
    }

    pub fn kept_count(&self) -> u64 {
        self.kept
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn clear(&mut self) {
        self.last_kept = None;
        self.kept = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame(width: u32, height: u32, fill: u8, frame_number: u64) -> Frame {
        let data = vec![fill; (width * height * 4) as usize];
        Frame::new(width, height, data, 0, frame_number)
    }

    fn fp(ones: usize) -> Fingerprint {
        let bits: Vec<bool> = (0..64).map(|i| i < ones).collect();
        Fingerprint::from_bits(&bits)
    }

    #[test]
    fn test_first_frame_kept_then_identical_dropped() {
        let mut dedup = FrameDeduplicator::new(8, 4);

        let first = dedup.check(&create_test_frame(64, 64, 128, 0)).unwrap();
        assert!(!first.is_duplicate);
        assert_eq!(first.reason, DedupReason::FirstFrame);

        let second = dedup.check(&create_test_frame(64, 64, 128, 1)).unwrap();
        assert!(second.is_duplicate);
        assert_eq!(second.distance, Some(0));
        assert_eq!(dedup.kept_count(), 1);
    }

    #[test]
    fn test_baseline_only_moves_on_kept_frames() {
        let mut dedup = FrameDeduplicator::new(8, 3);

        assert!(!dedup.check_fingerprint(fp(0)).is_duplicate);
        // 每次只漂移 2 位，和前一帧比永远是重复，但和基准比第 2 步就超过阈值
        assert!(dedup.check_fingerprint(fp(2)).is_duplicate);
        let drifted = dedup.check_fingerprint(fp(4));
        assert!(!drifted.is_duplicate);
        assert_eq!(drifted.reason, DedupReason::Changed);
        assert_eq!(drifted.distance, Some(4));

        // 基准已更新为 fp(4)
        assert!(dedup.check_fingerprint(fp(5)).is_duplicate);
    }

    #[test]
    fn test_malformed_frame_is_frame_local_error() {
        let mut dedup = FrameDeduplicator::new(8, 4);
        let bad = Frame::new(4, 4, vec![0u8; 3], 0, 9);
        assert!(dedup.check(&bad).is_err());
        assert!(!dedup.check(&create_test_frame(16, 16, 0, 10)).unwrap().is_duplicate);
    }

    #[test]
    fn test_clear_resets_baseline() {
        let mut dedup = FrameDeduplicator::new(8, 4);
        dedup.check_fingerprint(fp(1));
        dedup.clear();
        assert_eq!(dedup.kept_count(), 0);
        assert_eq!(
            dedup.check_fingerprint(fp(1)).reason,
            DedupReason::FirstFrame
        );
    }
}
