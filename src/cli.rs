// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "VMAF scoring with optional weighted chroma channels", long_about = None)]
pub struct CliArgs {
    /// Reference video file for VMAF comparison
    #[arg(short, long)]
    pub reference: PathBuf,

    /// Distorted video file for VMAF comparison
    #[arg(short, long)]
    pub distortion: PathBuf,

    /// Only score every Nth frame for faster comparisons
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub vmaf_subsampling: u32,

    /// Score the luma channel only (standalone VMAF behaviour)
    #[arg(long)]
    pub no_compare_chroma: bool,

    /// Weight of the luma channel relative to each chroma channel
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub chroma_weight: u32,

    /// Enable VMAF's temporal (motion) component. Not recommended for high quality targets
    #[arg(long)]
    pub vmaf_motion: bool,

    /// libvmaf threads per channel (default: derived from the CPU count)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Write a JSON report to this path
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Write a per-frame score plot (PNG) to this path
    #[arg(long, value_name = "FILE")]
    pub plot: Option<PathBuf>,

    /// Enable logging to file (e.g., better_vmaf_YYYYMMDD_HHMMSS.log)
    #[arg(long)]
    pub log: bool,

    /// Directory for the log file (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Verbose console logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
