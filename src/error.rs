// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BetterVmafError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg command failed: {0}")]
    Command(String),

    #[error("Failed to parse VMAF log: {0}")]
    Parse(String),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plotting error: {0}")]
    Plot(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),
}

pub type Result<T> = std::result::Result<T, BetterVmafError>;
