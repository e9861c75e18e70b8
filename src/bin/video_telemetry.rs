use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use video_telemetry::api::analyzer::VideoAnalyzer;
use video_telemetry::core::catalog::Catalog;
use video_telemetry::core::config::RunConfig;
use video_telemetry::core::pipeline::PipelineError;

#[derive(Parser)]
#[command(name = "video-telemetry")]
#[command(about = "Confirm catalog items in recorded gameplay video via OCR", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a video with a JSON5 run config.
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the video path from the config
        #[arg(long)]
        video: Option<PathBuf>,
        /// Override the OCR worker count (0 = one per CPU)
        #[arg(long)]
        workers: Option<usize>,
        /// Skip writing OCR preview images
        #[arg(long)]
        no_previews: bool,
    },

    /// Print the before/after balance maps of a catalog.
    Catalog {
        #[arg(short, long)]
        catalog: PathBuf,
        /// Balance before the first exchange
        #[arg(short, long, default_value_t = 0)]
        balance: i64,
    },
}

fn run(
    config: PathBuf,
    video: Option<PathBuf>,
    workers: Option<usize>,
    no_previews: bool,
) -> Result<(), PipelineError> {
    let mut config = RunConfig::load(&config)?;
    if let Some(video) = video {
        config.video_path = video;
    }
    if let Some(workers) = workers {
        config.ocr_workers = workers;
    }
    if no_previews {
        config.save_previews = false;
    }

    let analyzer = VideoAnalyzer::create(config)?;
    let summary = analyzer.run()?;
    println!("{}", summary);
    println!("输出目录: {}", analyzer.run_dir().display());
    Ok(())
}

fn print_catalog(path: PathBuf, balance: i64) -> Result<(), PipelineError> {
    let catalog = Catalog::load(&path, balance)?;
    let maps = catalog.balances();

    println!("兑换前余额 → 物品 ({} 项)", maps.before.len());
    for (balance, name) in maps.before.iter().rev() {
        println!("  {:>8}  {}", balance, name);
    }
    println!("兑换后余额 → 物品 ({} 项)", maps.after.len());
    for (balance, name) in maps.after.iter().rev() {
        println!("  {:>8}  {}", balance, name);
    }
    Ok(())
}

fn main() -> ExitCode {
    video_telemetry::init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            config,
            video,
            workers,
            no_previews,
        } => run(config, video, workers, no_previews),
        Command::Catalog { catalog, balance } => print_catalog(catalog, balance),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
