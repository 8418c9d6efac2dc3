mod cli;
mod config;
mod error;
mod ffmpeg;
mod plot;
mod report;
mod scoring;
mod stats;

use crate::cli::CliArgs;
use crate::error::Result;
use crate::ffmpeg::VmafComputer;
use crate::report::JsonReport;
use chrono::Local;
use log::{error, info, warn, LevelFilter};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let start_time = Instant::now();
    let args = cli::parse_args();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::from(2);
    }

    info!("Arguments: {:?}", args);

    match run(&args) {
        Ok(()) => {
            info!("Scoring completed in {:.2?}", start_time.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Scoring failed after {:.2?}: {}", start_time.elapsed(), e);
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Sets up logging to stderr and optionally to a file. Stdout carries the report.
fn setup_logging(args: &CliArgs) -> std::result::Result<(), fern::InitError> {
    let crate_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let console_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("better_vmaf", crate_level);

    let console_config = fern::Dispatch::new()
        .level(console_level)
        .chain(std::io::stderr());

    let mut logger = base_config.chain(console_config);

    // File log keeps Info and above even when the console is quiet
    let mut log_path = None;
    if args.log {
        let dir = args.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = dir.join(format!("better_vmaf_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        logger = logger.chain(fern::Dispatch::new().chain(fern::log_file(&path)?));
        log_path = Some(path);
    }

    logger.apply()?;
    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }
    Ok(())
}

fn run(args: &CliArgs) -> Result<()> {
    // --- 1. Configuration ---
    let (scoring_config, options) = config::from_args(args)?;
    info!("Reference: {}", options.reference.display());
    info!("Distorted: {}", options.distortion.display());
    info!(
        "Compare chroma: {}, chroma weight: {}",
        scoring_config.compare_chroma,
        scoring_config.chroma_weight()
    );

    // --- 2. Run libvmaf and score the planes ---
    let scores = VmafComputer::new(&options, &scoring_config).run()?;
    let result = scoring::score(&scores, &scoring_config);

    // Very low luma scores usually mean misaligned inputs, not a bad encode

    let luma = result.channels.luma();
    if !luma.is_defined() {
        warn!("No frames were scored; statistics are undefined");
    } else if luma.mean < 10.0 {
        warn!(
            "Mean luma VMAF ({:.2}) is suspiciously low (< 10). Inputs may be out of sync or swapped.",
            luma.mean
        );
    }

    // --- 3. Report ---
    print!("{}", report::render(&result));

    if let Some(path) = &args.json {
        JsonReport::new(&options, &scoring_config, scores.frame_count(), &result).write(path)?;
        println!("JSON: {}", path.display());
    }

    // Plot failures still exit non-zero, but only after the report is printed
    if let Some(path) = &args.plot {
        let weighted = scoring::weighted_frame_scores(&scores, &scoring_config);
        plot::generate_plot(&scores, &weighted, options.subsampling, path)?;
        println!("Plot: {}", path.display());
    }

    Ok(())
}
