//! 运行结束后的统计报告

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::core::stage::StagePipeline;

/// 毫秒数转成可读时长：`850 ms` / `42 秒` / `3分7秒`
pub fn format_duration(total_ms: f64) -> String {
    let total_ms = total_ms.max(0.0).round() as u64;
    if total_ms < 1000 {
        return format!("{} ms", total_ms);
    }
    let seconds = total_ms / 1000;
    if seconds < 60 {
        return format!("{} 秒", seconds);
    }
    format!("{}分{}秒", seconds / 60, seconds % 60)
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// 运行过程中逐帧累积的计数与耗时
///
/// 运行结束时 `frames_read` = skipped + duplicate + failed + ocr_failed + processed，
/// 起始窗口之前被 seek 越过的帧不计入。
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub frames_read: u64,
    pub frames_skipped: u64,
    pub frames_duplicate: u64,
    pub frames_processed: u64,
    /// 指纹计算失败
    pub frames_failed: u64,
    pub frames_ocr_failed: u64,
    pub hash_time: Duration,
    pub hash_count: u64,
    pub ocr_time: Duration,
    pub ocr_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingSummary {
    pub total_ms: f64,
    pub hash_total_ms: f64,
    pub hash_mean_ms: f64,
    pub ocr_total_ms: f64,
    pub ocr_mean_ms: f64,
    /// 每个实际处理帧的平均总耗时
    pub per_processed_frame_ms: f64,
    pub stage_total_ms: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: Option<String>,
    pub hit_count: usize,
    pub missing_count: usize,
    pub hit: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub name: String,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_skipped: u64,
    pub frames_duplicate: u64,
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub frames_ocr_failed: u64,
    pub sampling_interval: u64,
    pub timing: TimingSummary,
    pub stages: Vec<StageSummary>,
}

impl RunSummary {
    pub fn build(
        stats: &RunStats,
        sampling_interval: u64,
        total: Duration,
        pipeline: &StagePipeline,
    ) -> Self {
        let mean = |time: Duration, count: u64| {
            if count == 0 {
                0.0
            } else {
                millis(time) / count as f64
            }
        };

        let timing = TimingSummary {
            total_ms: millis(total),
            hash_total_ms: millis(stats.hash_time),
            hash_mean_ms: mean(stats.hash_time, stats.hash_count),
            ocr_total_ms: millis(stats.ocr_time),
            ocr_mean_ms: mean(stats.ocr_time, stats.ocr_count),
            per_processed_frame_ms: mean(total, stats.frames_processed),
            stage_total_ms: pipeline
                .stage_timings()
                .into_iter()
                .map(|(name, time)| (name.to_string(), millis(time)))
                .collect(),
        };

        let names = pipeline.catalog().names();
        let stages = pipeline
            .stage_hits()
            .map(|(stage, hits)| StageSummary {
                name: stage.name().to_string(),
                categories: hits
                    .groups()
                    .into_iter()
                    .map(|(category, set)| {
                        let hit: Vec<String> = set.iter().cloned().collect();
                        // BTreeSet 差集天然有序
                        let missing: Vec<String> = names.difference(set).cloned().collect();
                        CategorySummary {
                            category: category.map(str::to_string),
                            hit_count: hit.len(),
                            missing_count: missing.len(),
                            hit,
                            missing,
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            frames_read: stats.frames_read,
            frames_skipped: stats.frames_skipped,
            frames_duplicate: stats.frames_duplicate,
            frames_processed: stats.frames_processed,
            frames_failed: stats.frames_failed,
            frames_ocr_failed: stats.frames_ocr_failed,
            sampling_interval,
            timing,
            stages,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl StageSummary {
    pub fn category(&self, category: Option<&str>) -> Option<&CategorySummary> {
        self.categories
            .iter()
            .find(|c| c.category.as_deref() == category)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== 识别结果 ====")?;
        writeln!(
            f,
            "读取 {} 帧（采样间隔 {}），跳过 {}，重复 {}，OCR {}，失败 {}（指纹 {} / OCR {}）",
            self.frames_read,
            self.sampling_interval,
            self.frames_skipped,
            self.frames_duplicate,
            self.frames_processed,
            self.frames_failed + self.frames_ocr_failed,
            self.frames_failed,
            self.frames_ocr_failed
        )?;
        writeln!(
            f,
            "总耗时 {}，哈希 {}（平均 {:.1} ms），OCR {}（平均 {:.1} ms），每帧平均 {:.1} ms",
            format_duration(self.timing.total_ms),
            format_duration(self.timing.hash_total_ms),
            self.timing.hash_mean_ms,
            format_duration(self.timing.ocr_total_ms),
            self.timing.ocr_mean_ms,
            self.timing.per_processed_frame_ms
        )?;

        for stage in &self.stages {
            let stage_ms = self.timing.stage_total_ms.get(&stage.name).copied().unwrap_or(0.0);
            writeln!(f)?;
            writeln!(f, "[{}] 耗时 {}", stage.name, format_duration(stage_ms))?;
            for category in &stage.categories {
                let label = match &category.category {
                    Some(c) => format!("{}/{}", stage.name, c),
                    None => stage.name.clone(),
                };
                writeln!(
                    f,
                    "{}：识别到 {} 个，缺少 {} 个",
                    label, category.hit_count, category.missing_count
                )?;
                if category.missing.is_empty() {
                    writeln!(f, "  ✅ 全部目标物品已识别")?;
                } else {
                    writeln!(f, "  ❌ 缺少：{}", category.missing.join("、"))?;
                }
            }
        }
        Ok(())
    }
}
