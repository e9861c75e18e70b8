use image::RgbaImage;
use log::{debug, error};
use std::time::{Duration, Instant};

use super::evidence::{EvidenceError, EvidenceKey, EvidenceStore};
use super::hits::HitSet;
use super::{Stage, StageConfig, StageHit, StageOutcome};
use crate::core::catalog::Catalog;
use crate::core::config::ConfigError;
use crate::core::ocr::TextRecord;
use crate::core::pipeline::events::{EventSink, PipelineEvent};
use crate::core::video::Frame;

/// 运行期的全部可变状态：目录只读，命中集合与阶段一一对应
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub catalog: Catalog,
    pub hits: Vec<HitSet>,
}

/// 一帧的阶段结果
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// 锚点在画面上的阶段
    pub active_stages: Vec<String>,
    pub hits: Vec<(String, StageHit)>,
}

pub struct StagePipeline {
    stages: Vec<Stage>,
    state: PipelineState,
    evidence: Box<dyn EvidenceStore>,
    stage_time: Vec<Duration>,
}

impl StagePipeline {
    pub fn new(stages: Vec<Stage>, catalog: Catalog, evidence: Box<dyn EvidenceStore>) -> Self {
        let hits = stages.iter().map(Stage::empty_hits).collect();
        let stage_time = vec![Duration::ZERO; stages.len()];
        Self {
            stages,
            state: PipelineState { catalog, hits },
            evidence,
            stage_time,
        }
    }

    pub fn from_configs(
        configs: &[StageConfig],
        catalog: Catalog,
        evidence: Box<dyn EvidenceStore>,
    ) -> Result<Self, ConfigError> {
        let stages = configs
            .iter()
            .map(Stage::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(stages, catalog, evidence))
    }

    /// 按声明顺序评估所有阶段，命中即保存证据。阶段评估本身不会失败，
    /// 证据写入失败只记录日志与事件，命中仍然有效。
    pub fn run_frame(
        &mut self,
        frame: &Frame,
        records: &[TextRecord],
        events: &mut dyn EventSink,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        let frame_number = frame.frame_number;

        for (index, stage) in self.stages.iter().enumerate() {
            let started = Instant::now();
            let outcome = stage.evaluate(
                records,
                &self.state.catalog,
                &mut self.state.hits[index],
            );

            match outcome {
                StageOutcome::Inactive => {
                    events.emit(&PipelineEvent::StageInactive {
                        frame: frame_number,
                        stage: stage.name().to_string(),
                    });
                }
                StageOutcome::Active { hits } => {
                    report.active_stages.push(stage.name().to_string());
                    if hits.is_empty() {
                        events.emit(&PipelineEvent::StageNoNewItems {
                            frame: frame_number,
                            stage: stage.name().to_string(),
                        });
                    }

                    for hit in hits {
                        events.emit(&PipelineEvent::StageHit {
                            frame: frame_number,
                            stage: stage.name().to_string(),
                            item: hit.item.clone(),
                            category: hit.category.clone(),
                            balance: hit.balance,
                        });

                        let key = EvidenceKey {
                            stage: stage.name().to_string(),
                            category: hit.category.clone(),
                            item: hit.item.clone(),
                            balance: hit.balance,
                        };
                        match self.evidence.save(&key, frame) {
                            Ok(path) => events.emit(&PipelineEvent::EvidenceSaved {
                                frame: frame_number,
                                stage: stage.name().to_string(),
                                path,
                            }),
                            Err(e) => {
                                error!("❌ Evidence write failed for {:?}: {}", key, e);
                                events.emit(&PipelineEvent::EvidenceFailed {
                                    frame: frame_number,
                                    stage: stage.name().to_string(),
                                    item: hit.item.clone(),
                                    reason: e.to_string(),
                                });
                            }
                        }

                        report.hits.push((stage.name().to_string(), hit));
                    }
                }
            }

            self.stage_time[index] += started.elapsed();
        }

        debug!(
            "Frame #{}: {} stages active, {} new hits",
            frame_number,
            report.active_stages.len(),
            report.hits.len()
        );
        report
    }

    pub fn save_preview(&mut self, frame_number: u64, image: &RgbaImage) -> Result<(), EvidenceError> {
        self.evidence.save_preview(frame_number, image)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.state.catalog
    }

    /// (阶段名, 累计评估耗时)
    pub fn stage_timings(&self) -> Vec<(&str, Duration)> {
        self.stages
            .iter()
            .zip(&self.stage_time)
            .map(|(stage, time)| (stage.name(), *time))
            .collect()
    }

    /// (阶段, 命中集合)
    pub fn stage_hits(&self) -> impl Iterator<Item = (&Stage, &HitSet)> {
        self.stages.iter().zip(&self.state.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::events::MemoryEventSink;
    use crate::core::stage::tests::{catalog, record};
    use crate::core::stage::{BalanceSide, MemoryEvidenceStore, StageKindConfig};
    use crate::core::text::PositionTag;

    struct FailingStore;

    impl EvidenceStore for FailingStore {
        fn save(&mut self, _key: &EvidenceKey, _frame: &Frame) -> Result<std::path::PathBuf, EvidenceError> {
            Err(EvidenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn save_preview(&mut self, _frame_number: u64, _image: &RgbaImage) -> Result<(), EvidenceError> {
            Ok(())
        }
    }

    fn configs() -> Vec<StageConfig> {
        vec![
            StageConfig {
                name: "popup".to_string(),
                kind: StageKindConfig::PositionRestrictedScan {
                    anchor: "总计".to_string(),
                    position: PositionTag::Center,
                },
            },
            StageConfig {
                name: "shards".to_string(),
                kind: StageKindConfig::NumericInferenceScan {
                    anchor: None,
                    balance: BalanceSide::After,
                },
            },
        ]
    }

    fn frame(n: u64) -> Frame {
        Frame::new(4, 4, vec![0u8; 64], n * 100, n)
    }

    #[test]
    fn test_stages_run_in_order_and_save_evidence() {
        let store = MemoryEvidenceStore::new();
        let mut pipeline =
            StagePipeline::from_configs(&configs(), catalog(), Box::new(store.clone())).unwrap();
        let mut events = MemoryEventSink::new();

        let records = vec![
            record("总计", PositionTag::BottomCenter),
            record("Shield", PositionTag::Center),
            record("9600", PositionTag::TopRight),
        ];
        let report = pipeline.run_frame(&frame(7), &records, &mut events);

        let hits: Vec<(&str, &str)> = report
            .hits
            .iter()
            .map(|(stage, hit)| (stage.as_str(), hit.item.as_str()))
            .collect();
        assert_eq!(hits, vec![("popup", "Shield"), ("shards", "Sword")]);
        assert_eq!(report.active_stages, vec!["popup", "shards"]);

        let saved: Vec<String> = store.saved().iter().map(EvidenceKey::file_name).collect();
        assert_eq!(saved, vec!["popup_Shield.jpg", "shards_Sword_9600.jpg"]);

        let hit_events = events
            .events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::StageHit { .. }))
            .count();
        assert_eq!(hit_events, 2);
    }

    #[test]
    fn test_repeat_frame_adds_nothing() {
        let store = MemoryEvidenceStore::new();
        let mut pipeline =
            StagePipeline::from_configs(&configs(), catalog(), Box::new(store.clone())).unwrap();
        let mut events = MemoryEventSink::new();
        let records = vec![record("9600", PositionTag::Center)];

        assert_eq!(pipeline.run_frame(&frame(1), &records, &mut events).hits.len(), 1);
        assert!(pipeline.run_frame(&frame(2), &records, &mut events).hits.is_empty());
        assert_eq!(store.saved().len(), 1);
        assert_eq!(pipeline.state().hits[1].len(), 1);
    }

    #[test]
    fn test_evidence_failure_keeps_hit() {
        let mut pipeline =
            StagePipeline::from_configs(&configs(), catalog(), Box::new(FailingStore)).unwrap();
        let mut events = MemoryEventSink::new();

        let report = pipeline.run_frame(&frame(1), &[record("9600", PositionTag::Center)], &mut events);
        assert_eq!(report.hits.len(), 1);
        assert!(pipeline.state().hits[1].contains(None, "Sword"));
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::EvidenceFailed { .. })));
    }

    #[test]
    fn test_empty_records_are_noop() {
        let mut pipeline = StagePipeline::from_configs(
            &configs(),
            catalog(),
            Box::new(MemoryEvidenceStore::new()),
        )
        .unwrap();
        let report = pipeline.run_frame(&frame(1), &[], &mut MemoryEventSink::new());
        assert!(report.hits.is_empty());
        // 数值阶段没有锚点，总是处于激活状态
        assert_eq!(report.active_stages, vec!["shards"]);
        assert_eq!(pipeline.stage_timings().len(), 2);
    }
}
