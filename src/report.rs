// src/report.rs

use crate::config::{ScoringConfiguration, VmafOptions};
use crate::error::Result;
use crate::scoring::{Channels, WeightedScoreResult};
use crate::stats::ChannelStatistics;
use log::info;
use serde::Serialize;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const LABEL_WIDTH: usize = 20;

/// Renders the score table shown on stdout.
pub fn render(result: &WeightedScoreResult) -> String {
    let mut out = String::from("VMAF Score Result:\n");
    match &result.channels {
        Channels::Luma(luma) => write_section(&mut out, "Y channel", luma),
        Channels::Yuv { luma, chroma_u, chroma_v } => {
            write_section(&mut out, "Y channel", luma);
            write_section(&mut out, "U channel", chroma_u);
            write_section(&mut out, "V channel", chroma_v);
            // Luma-only runs would just repeat the Y section here
            write_section(&mut out, "Weighted frames", &result.weighted_frames);
        }
    }
    let _ = writeln!(out, "\nFinal Score: {:.6}", result.final_score);
    out
}

fn write_section(out: &mut String, title: &str, stats: &ChannelStatistics) {
    let _ = writeln!(out, "\n{title}");
    for (label, value) in [
        ("Mean", stats.mean),
        ("Geometric Mean", stats.geometric_mean),
        ("Min", stats.min),
        ("Max", stats.max),
        ("Standard Deviation", stats.standard_deviation),
    ] {
        let _ = writeln!(out, "{label:<LABEL_WIDTH$}: {value:.2}");
    }
}

#[derive(Serialize, Debug)]
pub struct JsonReport<'a> {
    pub reference: &'a Path,
    pub distortion: &'a Path,
    pub configuration: &'a ScoringConfiguration,
    pub subsampling: u32,
    pub vmaf_motion: bool,
    pub frame_count: usize,
    #[serde(flatten)]
    pub result: &'a WeightedScoreResult,
}

impl<'a> JsonReport<'a> {
    pub fn new(
        options: &'a VmafOptions,
        configuration: &'a ScoringConfiguration,
        frame_count: usize,
        result: &'a WeightedScoreResult,
    ) -> Self {
        Self {
            reference: &options.reference,
            distortion: &options.distortion,
            configuration,
            subsampling: options.subsampling,
            vmaf_motion: options.motion,
            frame_count,
            result,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved JSON report to {}", path.display());
        Ok(())
    }
}
