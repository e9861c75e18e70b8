//! 结构化运行事件与输出端

use log::{debug, error, info, log, warn, Level};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::ocr::TextRecord;
use crate::core::video::{SamplingPlan, VideoInfo};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        video: String,
        info: VideoInfo,
        plan: SamplingPlan,
    },
    FrameKept {
        frame: u64,
        timestamp_ms: u64,
        distance: Option<u32>,
    },
    FrameDuplicate {
        frame: u64,
        distance: u32,
    },
    FrameFailed {
        frame: u64,
        reason: String,
    },
    OcrCompleted {
        frame: u64,
        elapsed_ms: f64,
        records: Vec<TextRecord>,
    },
    StageInactive {
        frame: u64,
        stage: String,
    },
    StageNoNewItems {
        frame: u64,
        stage: String,
    },
    StageHit {
        frame: u64,
        stage: String,
        item: String,
        category: Option<String>,
        balance: Option<i64>,
    },
    EvidenceSaved {
        frame: u64,
        stage: String,
        path: PathBuf,
    },
    EvidenceFailed {
        frame: u64,
        stage: String,
        item: String,
        reason: String,
    },
    StreamEnded {
        frame: u64,
        reason: String,
    },
    RunFinished {
        frames_read: u64,
        frames_processed: u64,
        elapsed_ms: f64,
    },
}

impl PipelineEvent {
    pub fn level(&self) -> Level {
        match self {
            PipelineEvent::RunStarted { .. }
            | PipelineEvent::StageHit { .. }
            | PipelineEvent::RunFinished { .. } => Level::Info,
            PipelineEvent::FrameFailed { .. } | PipelineEvent::StreamEnded { .. } => Level::Warn,
            PipelineEvent::EvidenceFailed { .. } => Level::Error,
            _ => Level::Debug,
        }
    }

    /// 阶段相关事件返回阶段名，用作日志 target
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineEvent::StageInactive { stage, .. }
            | PipelineEvent::StageNoNewItems { stage, .. }
            | PipelineEvent::StageHit { stage, .. }
            | PipelineEvent::EvidenceSaved { stage, .. }
            | PipelineEvent::EvidenceFailed { stage, .. } => Some(stage.as_str()),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            PipelineEvent::RunStarted { video, info, plan } => format!(
                "🎬 Run started: {} ({:.2} fps, {} frames, {}x{}), interval {}, start frame {}",
                video, info.fps, info.frame_count, info.width, info.height, plan.interval, plan.start_frame
            ),
            PipelineEvent::FrameKept {
                frame,
                timestamp_ms,
                distance,
            } => match distance {
                Some(d) => format!("🖼️ Frame #{} @{}ms kept (distance {})", frame, timestamp_ms, d),
                None => format!("🖼️ Frame #{} @{}ms kept (first frame)", frame, timestamp_ms),
            },
            PipelineEvent::FrameDuplicate { frame, distance } => {
                format!("🔁 Frame #{} duplicate (distance {})", frame, distance)
            }
            PipelineEvent::FrameFailed { frame, reason } => {
                format!("⚠️ Frame #{} skipped: {}", frame, reason)
            }
            PipelineEvent::OcrCompleted {
                frame,
                elapsed_ms,
                records,
            } => {
                let texts: Vec<String> = records
                    .iter()
                    .map(|r| format!("{}@{}", r.cleaned_text, r.position))
                    .collect();
                format!(
                    "🔤 Frame #{} OCR {:.1}ms: [{}]",
                    frame,
                    elapsed_ms,
                    texts.join(", ")
                )
            }
            PipelineEvent::StageInactive { frame, stage } => {
                format!("Frame #{}: {} not on screen", frame, stage)
            }
            PipelineEvent::StageNoNewItems { frame, stage } => {
                format!("Frame #{}: {} on screen, no new items", frame, stage)
            }
            PipelineEvent::StageHit {
                frame,
                stage,
                item,
                category,
                balance,
            } => {
                let mut msg = format!("✅ Frame #{}: {} hit {}", frame, stage, item);
                if let Some(category) = category {
                    msg.push_str(&format!(" [{}]", category));
                }
                if let Some(balance) = balance {
                    msg.push_str(&format!(" (balance {})", balance));
                }
                msg
            }
            PipelineEvent::EvidenceSaved { frame, path, .. } => {
                format!("💾 Frame #{} evidence saved: {:?}", frame, path)
            }
            PipelineEvent::EvidenceFailed {
                frame,
                stage,
                item,
                reason,
            } => format!(
                "❌ Frame #{}: saving evidence for {}/{} failed: {}",
                frame, stage, item, reason
            ),
            PipelineEvent::StreamEnded { frame, reason } => {
                format!("⏹️ Stream ended at frame #{}: {}", frame, reason)
            }
            PipelineEvent::RunFinished {
                frames_read,
                frames_processed,
                elapsed_ms,
            } => format!(
                "🏁 Run finished: {} frames read, {} processed in {:.0}ms",
                frames_read, frames_processed, elapsed_ms
            ),
        }
    }
}

pub trait EventSink: Send {
    fn emit(&mut self, event: &PipelineEvent);

    fn flush(&mut self) {}
}

/// 写入 `log`，阶段事件的 target 为阶段名
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &PipelineEvent) {
        let level = event.level();
        match event.stage() {
            Some(stage) => log!(target: stage, level, "{}", event.message()),
            None => match level {
                Level::Error => error!("{}", event.message()),
                Level::Warn => warn!("{}", event.message()),
                Level::Info => info!("{}", event.message()),
                _ => debug!("{}", event.message()),
            },
        }
    }
}

/// 每行一个 JSON 对象
pub struct JsonlEventSink {
    writer: BufWriter<File>,
}

impl JsonlEventSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl EventSink for JsonlEventSink {
    fn emit(&mut self, event: &PipelineEvent) {
        let result = serde_json::to_writer(&mut self.writer, event)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = result {
            warn!("⚠️ Event log write failed: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("⚠️ Event log flush failed: {}", e);
        }
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// 收集到内存，克隆出的句柄共享同一份记录
#[derive(Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&mut self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// 同时分发给多个输出端
#[derive(Default)]
pub struct TeeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl TeeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for TeeEventSink {
    fn emit(&mut self, event: &PipelineEvent) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit() -> PipelineEvent {
        PipelineEvent::StageHit {
            frame: 30,
            stage: "兑换后碎片".to_string(),
            item: "龙之剑".to_string(),
            category: None,
            balance: Some(9600),
        }
    }

    #[test]
    fn test_levels_and_stage_target() {
        assert_eq!(hit().level(), Level::Info);
        assert_eq!(hit().stage(), Some("兑换后碎片"));
        let dup = PipelineEvent::FrameDuplicate {
            frame: 1,
            distance: 3,
        };
        assert_eq!(dup.level(), Level::Debug);
        assert_eq!(dup.stage(), None);
        assert!(hit().message().contains("balance 9600"));
    }

    #[test]
    fn test_jsonl_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let mut sink = JsonlEventSink::create(&path).unwrap();
            sink.emit(&hit());
            sink.emit(&PipelineEvent::StreamEnded {
                frame: 99,
                reason: "eof".to_string(),
            });
            sink.flush();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "stage_hit");
        assert_eq!(first["balance"], 9600);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "stream_ended");
    }

    #[test]
    fn test_tee_fans_out_to_memory_sinks() {
        let a = MemoryEventSink::new();
        let b = MemoryEventSink::new();
        let mut tee = TeeEventSink::new().with(a.clone()).with(b.clone()).with(LogEventSink);

        tee.emit(&hit());
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }
}
