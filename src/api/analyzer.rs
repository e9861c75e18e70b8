//! 视频遥测分析器

use chrono::Local;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::catalog::Catalog;
use crate::core::config::{ConfigError, RunConfig, SCRATCH_DIR};
use crate::core::ocr::{CommandOcrEngine, OcrAdapter, OcrEngine};
use crate::core::pipeline::{
    JsonlEventSink, LogEventSink, PipelineError, ProcessorOptions, RunSummary, TeeEventSink,
    VideoProcessor,
};
use crate::core::stage::{FsEvidenceStore, StagePipeline};
use crate::core::video::{open_source, FrameSource};

/// 一次分析运行 - 配置 + 数值表 + 输出目录
///
/// ```no_run
/// use video_telemetry::api::analyzer::VideoAnalyzer;
///
/// let analyzer = VideoAnalyzer::open("run.json5".as_ref())?;
/// let summary = analyzer.run()?;
/// println!("{}", summary);
/// # Ok::<(), video_telemetry::core::pipeline::PipelineError>(())
/// ```
pub struct VideoAnalyzer {
    config: RunConfig,
    catalog: Catalog,
    run_dir: PathBuf,
}

impl VideoAnalyzer {
    /// 从 JSON5 配置文件创建
    pub fn open(config_path: &Path) -> Result<Self, PipelineError> {
        Self::create(RunConfig::load(config_path)?)
    }

    /// 校验配置并加载数值表，输出目录按当前时间命名
    pub fn create(config: RunConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let catalog = Catalog::load(&config.catalog_path, config.initial_balance.unwrap_or(0))?;
        let run_dir = config
            .output_root
            .join(Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());

        info!("🎬 VideoAnalyzer: created, output {:?}", run_dir);
        Ok(Self {
            config,
            catalog,
            run_dir,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// 使用配置中的外部 OCR 命令处理视频
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut ocr_config = self
            .config
            .ocr
            .clone()
            .ok_or_else(|| ConfigError::Invalid("`ocr` command is required".to_string()))?;
        if ocr_config.scratch_dir.is_none() {
            ocr_config.scratch_dir = Some(self.run_dir.join(SCRATCH_DIR));
        }
        let engine = CommandOcrEngine::new(ocr_config)?;
        self.run_with_engine(Arc::new(engine))
    }

    pub fn run_with_engine(&self, engine: Arc<dyn OcrEngine>) -> Result<RunSummary, PipelineError> {
        let mut source = open_source(&self.config.video_path, self.config.sequence_fps)?;
        self.run_source(source.as_mut(), engine)
    }

    /// 运行目录下写出 events.jsonl、summary.json、证据截图与预览图
    pub fn run_source(
        &self,
        source: &mut dyn FrameSource,
        engine: Arc<dyn OcrEngine>,
    ) -> Result<RunSummary, PipelineError> {
        std::fs::create_dir_all(&self.run_dir)?;

        let events = TeeEventSink::new()
            .with(LogEventSink)
            .with(JsonlEventSink::create(&self.run_dir.join("events.jsonl"))?);
        let evidence = FsEvidenceStore::new(&self.run_dir, self.config.jpeg_quality);
        let stages = StagePipeline::from_configs(
            &self.config.stages,
            self.catalog.clone(),
            Box::new(evidence),
        )?;
        let ocr = OcrAdapter::new(engine)
            .with_roi(self.config.roi)
            .with_min_score(self.config.min_score);

        let mut processor = VideoProcessor::new(
            ProcessorOptions::from_config(&self.config),
            ocr,
            stages,
            Box::new(events),
        )?;
        let summary = processor.run(source, &self.config.video_path.display().to_string())?;

        let summary_path = self.run_dir.join("summary.json");
        std::fs::write(&summary_path, summary.to_json()?)?;
        info!("📊 Summary written to {:?}", summary_path);
        Ok(summary)
    }
}

impl Drop for VideoAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ VideoAnalyzer: released");
    }
}
