//! 主循环：采样 → 去重 → OCR → 阶段

use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::time::{Duration, Instant};

use super::events::{EventSink, PipelineEvent};
use super::summary::{RunStats, RunSummary};
use super::PipelineError;
use crate::core::config::RunConfig;
use crate::core::ocr::{render_overlay, OcrAdapter, OcrError, TextRecord};
use crate::core::stage::StagePipeline;
use crate::core::video::{Frame, FrameDeduplicator, FrameSource, SamplingPlan};

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub target_fps: f64,
    pub start_sec: f64,
    pub end_sec: Option<f64>,
    pub hash_size: usize,
    pub hamming_threshold: u32,
    /// 大于 1 时按批并行 OCR
    pub ocr_workers: usize,
    pub save_previews: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            target_fps: 3.0,
            start_sec: 0.0,
            end_sec: None,
            hash_size: 16,
            hamming_threshold: 12,
            ocr_workers: 1,
            save_previews: false,
        }
    }
}

impl ProcessorOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            target_fps: config.target_fps,
            start_sec: config.start_sec,
            end_sec: config.end_sec,
            hash_size: config.hash_size,
            hamming_threshold: config.hamming_threshold,
            ocr_workers: config.effective_ocr_workers(),
            save_previews: config.save_previews,
        }
    }
}

type OcrResult = (Result<Vec<TextRecord>, OcrError>, Duration);

pub struct VideoProcessor {
    options: ProcessorOptions,
    dedup: FrameDeduplicator,
    ocr: OcrAdapter,
    stages: StagePipeline,
    events: Box<dyn EventSink>,
    pool: Option<rayon::ThreadPool>,
}

impl VideoProcessor {
    pub fn new(
        options: ProcessorOptions,
        ocr: OcrAdapter,
        stages: StagePipeline,
        events: Box<dyn EventSink>,
    ) -> Result<Self, PipelineError> {
        let pool = if options.ocr_workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.ocr_workers)
                .thread_name(|i| format!("ocr-worker-{}", i))
                .build()
                .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        info!(
            "🚀 VideoProcessor: {} stages, OCR engine {}, {} worker(s)",
            stages.stages().len(),
            ocr.engine_name(),
            options.ocr_workers.max(1)
        );

        Ok(Self {
            dedup: FrameDeduplicator::new(options.hash_size, options.hamming_threshold),
            options,
            ocr,
            stages,
            events,
            pool,
        })
    }

    pub fn stages(&self) -> &StagePipeline {
        &self.stages
    }

    /// 处理整段视频。单帧失败只计数跳过；视频打不开、起点越界、
    /// OCR 引擎不可用会中止运行。
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        label: &str,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let info = source.info();
        let plan = SamplingPlan::new(
            &info,
            self.options.target_fps,
            self.options.start_sec,
            self.options.end_sec,
        )?;

        self.events.emit(&PipelineEvent::RunStarted {
            video: label.to_string(),
            info,
            plan,
        });

        let mut stats = RunStats::default();
        // 窗口之前的帧不计入任何计数
        if plan.start_frame > 0 {
            source.seek_to(plan.start_frame)?;
        }

        let batch_size = match &self.pool {
            Some(_) => self.options.ocr_workers * 2,
            None => 1,
        };
        let mut batch: Vec<Frame> = Vec::with_capacity(batch_size);
        let mut index = plan.start_frame;

        loop {
            if plan.is_past_end(index) {
                info!("⏹️ Reached end offset at frame #{}", index);
                break;
            }

            let mut frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.events.emit(&PipelineEvent::StreamEnded {
                        frame: index,
                        reason: "end of stream".to_string(),
                    });
                    break;
                }
                Err(e) => {
                    // 解码中途出错按流结束处理
                    warn!("⚠️ Decode failed at frame #{}: {}", index, e);
                    self.events.emit(&PipelineEvent::StreamEnded {
                        frame: index,
                        reason: e.to_string(),
                    });
                    break;
                }
            };

            stats.frames_read += 1;
            let current = index;
            index += 1;
            frame.frame_number = current;

            if !plan.is_candidate(current) {
                stats.frames_skipped += 1;
                continue;
            }

            let hash_started = Instant::now();
            let decision = self.dedup.check(&frame);
            stats.hash_time += hash_started.elapsed();
            stats.hash_count += 1;

            match decision {
                Err(e) => {
                    stats.frames_failed += 1;
                    self.events.emit(&PipelineEvent::FrameFailed {
                        frame: current,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Ok(decision) if decision.is_duplicate => {
                    stats.frames_duplicate += 1;
                    self.events.emit(&PipelineEvent::FrameDuplicate {
                        frame: current,
                        distance: decision.distance.unwrap_or(0),
                    });
                    continue;
                }
                Ok(decision) => {
                    self.events.emit(&PipelineEvent::FrameKept {
                        frame: current,
                        timestamp_ms: frame.timestamp_ms(),
                        distance: decision.distance,
                    });
                }
            }

            batch.push(frame);
            if batch.len() >= batch_size {
                self.process_batch(std::mem::take(&mut batch), &mut stats)?;
            }
        }

        if !batch.is_empty() {
            self.process_batch(batch, &mut stats)?;
        }

        let elapsed = started.elapsed();
        self.events.emit(&PipelineEvent::RunFinished {
            frames_read: stats.frames_read,
            frames_processed: stats.frames_processed,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        });
        self.events.flush();

        Ok(RunSummary::build(&stats, plan.interval, elapsed, &self.stages))
    }

    /// OCR 可以并行，阶段按帧序串行提交
    fn process_batch(&mut self, frames: Vec<Frame>, stats: &mut RunStats) -> Result<(), PipelineError> {
        let ocr = &self.ocr;
        let recognize = |frame: &Frame| -> OcrResult {
            let started = Instant::now();
            let result = ocr.recognize(frame);
            (result, started.elapsed())
        };

        let results: Vec<OcrResult> = match &self.pool {
            Some(pool) if frames.len() > 1 => {
                debug!("OCR batch of {} frames", frames.len());
                pool.install(|| frames.par_iter().map(recognize).collect())
            }
            _ => frames.iter().map(recognize).collect(),
        };

        for (frame, (result, elapsed)) in frames.iter().zip(results) {
            stats.ocr_time += elapsed;
            stats.ocr_count += 1;

            let records = match result {
                Ok(records) => records,
                Err(e) if e.is_fatal() => {
                    error!("❌ OCR aborted: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    stats.frames_ocr_failed += 1;
                    self.events.emit(&PipelineEvent::FrameFailed {
                        frame: frame.frame_number,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            stats.frames_processed += 1;
            self.events.emit(&PipelineEvent::OcrCompleted {
                frame: frame.frame_number,
                elapsed_ms: elapsed.as_secs_f64() * 1000.0,
                records: records.clone(),
            });

            if self.options.save_previews {
                match render_overlay(frame, &records) {
                    Ok(preview) => {
                        if let Err(e) = self.stages.save_preview(frame.frame_number, &preview) {
                            warn!("⚠️ Preview for frame #{} not saved: {}", frame.frame_number, e);
                        }
                    }
                    Err(e) => warn!("⚠️ Preview for frame #{} not rendered: {}", frame.frame_number, e),
                }
            }

            self.stages.run_frame(frame, &records, self.events.as_mut());
        }
        Ok(())
    }
}
