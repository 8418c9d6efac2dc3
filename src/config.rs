// src/config.rs

use crate::cli::CliArgs;
use crate::error::{BetterVmafError, Result};
use serde::Serialize;
use std::path::PathBuf;

/// How per-channel scores are combined into the final score.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringConfiguration {
    pub compare_chroma: bool,
    chroma_weight: u32,
}

impl ScoringConfiguration {
    /// Rejects a zero weight: the luma/chroma ratio is meaningless without it.
    pub fn new(compare_chroma: bool, chroma_weight: u32) -> Result<Self> {
        if chroma_weight == 0 {
            return Err(BetterVmafError::Config(
                "chroma weight must be a positive integer".to_string(),
            ));
        }
        Ok(Self { compare_chroma, chroma_weight })
    }

    #[cfg(test)]
    pub fn luma_only() -> Self {
        Self { compare_chroma: false, chroma_weight: 1 }
    }

    pub fn chroma_weight(&self) -> u32 {
        self.chroma_weight
    }

    pub fn channel_count(&self) -> usize {
        if self.compare_chroma { 3 } else { 1 }
    }
}

/// Everything the ffmpeg run needs besides the scoring configuration.
#[derive(Debug, Clone)]
pub struct VmafOptions {
    pub reference: PathBuf,
    pub distortion: PathBuf,
    pub subsampling: u32,
    pub motion: bool,
    pub threads: Option<usize>,
}

impl VmafOptions {
    pub fn new(reference: PathBuf, distortion: PathBuf) -> Self {
        Self {
            reference,
            distortion,
            subsampling: 1,
            motion: false,
            threads: None,
        }
    }
}

/// Splits the parsed arguments into the two immutable configurations.
pub fn from_args(args: &CliArgs) -> Result<(ScoringConfiguration, VmafOptions)> {
    let scoring = ScoringConfiguration::new(!args.no_compare_chroma, args.chroma_weight)?;

    if args.vmaf_subsampling == 0 {
        return Err(BetterVmafError::Config(
            "vmaf subsampling must be at least 1".to_string(),
        ));
    }
    if args.threads == Some(0) {
        return Err(BetterVmafError::Config("thread count must be at least 1".to_string()));
    }

    let options = VmafOptions {
        subsampling: args.vmaf_subsampling,
        motion: args.vmaf_motion,
        threads: args.threads,
        ..VmafOptions::new(args.reference.clone(), args.distortion.clone())
    };
    Ok((scoring, options))
}
