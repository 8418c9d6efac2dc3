// src/ffmpeg.rs

use crate::config::{ScoringConfiguration, VmafOptions};
use crate::error::{BetterVmafError, Result};
use crate::scoring::ChannelScores;
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempPath;

const SCALE: &str = "scale=1920:1080";
const VMAF_MODEL: &str = "vmaf_v0.6.1";

// --- VMAF log format ---

#[derive(Deserialize, Debug)]
struct VmafLog {
    frames: Vec<FrameMetrics>,
}

#[derive(Deserialize, Debug)]
struct FrameMetrics {
    #[serde(rename = "frameNum")]
    frame_num: Option<u64>,
    metrics: Metrics,
}

#[derive(Deserialize, Debug)]
struct Metrics {
    vmaf: Option<f64>,
}

// --- Core ---

/// Runs ffmpeg's libvmaf filter over the reference/distorted pair and
/// collects per-frame scores for each requested plane.
pub struct VmafComputer<'a> {
    options: &'a VmafOptions,
    config: &'a ScoringConfiguration,
}

impl<'a> VmafComputer<'a> {
    pub fn new(options: &'a VmafOptions, config: &'a ScoringConfiguration) -> Self {
        Self { options, config }
    }

    pub fn run(&self) -> Result<ChannelScores> {
        ensure_input(&self.options.reference)?;
        ensure_input(&self.options.distortion)?;
        check_libvmaf()?;

        // Removed on drop, whichever way this function returns.
        let log_files = create_log_files(self.config.channel_count())?;
        let log_paths: Vec<String> = log_files.iter().map(|p| filter_path(p)).collect();

        let graph = build_filter_graph(self.options, self.config, &log_paths);
        info!("Constructed VMAF filter graph: {}", graph);

        let args = ffmpeg_args(self.options, &graph);
        let description = if self.config.compare_chroma { "VMAF (Y, U, V)" } else { "VMAF (Y)" };
        run_ffmpeg(&args, description)?;

        // Log order matches plane order: Y, then U and V when chroma is scored
        let series = log_files
            .iter()
            .map(|path| parse_vmaf_log(path))
            .collect::<Result<Vec<_>>>()?;

        Ok(ChannelScores::from_series(series))
    }
}

fn ensure_input(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(BetterVmafError::Input(format!(
            "Input video file not found: {}",
            path.display()
        )));
    }
    Ok(())
}

fn create_log_files(count: usize) -> Result<Vec<TempPath>> {
    (0..count)
        .map(|_| -> Result<TempPath> {
            let file = tempfile::Builder::new()
                .prefix("vmaf_log_")
                .suffix(".json")
                .tempfile()?;
            let path = file.into_temp_path();
            debug!("Created VMAF log file {}", path.display());
            Ok(path)
        })
        .collect()
}

/// Threads handed to each libvmaf instance. Three instances run side by side
/// when chroma is compared.
pub fn thread_count(options: &VmafOptions, config: &ScoringConfiguration) -> usize {
    if let Some(threads) = options.threads {
        return threads;
    }
    let cpus = num_cpus::get();
    if config.compare_chroma { cpus / 3 + 2 } else { cpus }
}

/// Formats a log path for use as a libvmaf option value inside a filter graph.
///
/// The value is escaped twice, like the `model` option below: once for the
/// option parser (`\`, `'`, `:`) and once more for the graph parser (`\`,
/// `'`, `[`, `]`, `,`, `;`). Windows separators become `/`.
pub fn filter_path(path: &Path) -> String {
    escape_log_path(&path.to_string_lossy(), cfg!(windows))
}

fn escape_log_path(path: &str, windows: bool) -> String {
    let path = if windows { path.replace('\\', "/") } else { path.to_string() };
    // Option level first, then graph level over the result.
    let option_level = escape_chars(&path, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn filter_params(options: &VmafOptions, threads: usize, log_path: &str) -> String {
    format!(
        "n_threads={threads}:log_fmt=json:log_path={log_path}:model=version={VMAF_MODEL}\\\\:motion.motion_force_zero={}:n_subsample={}",
        !options.motion, options.subsampling
    )
}

pub fn build_filter_graph(
    options: &VmafOptions,
    config: &ScoringConfiguration,
    log_paths: &[String],
) -> String {
    assert_eq!(
        log_paths.len(),
        config.channel_count(),
        "one VMAF log per scored channel"
    );
    let threads = thread_count(options, config);

    // Both inputs are normalised to 1080p 4:2:0 before scoring
    let mut chains = vec![
        format!("[0:v:0]{SCALE},format=yuv420p[dis]"),
        format!("[1:v:0]{SCALE},format=yuv420p[ref]"),
    ];

    if config.compare_chroma {
        chains.push("[dis]extractplanes=y+u+v[dis_0][dis_1][dis_2]".to_string());
        chains.push("[ref]extractplanes=y+u+v[ref_0][ref_1][ref_2]".to_string());
        for (i, log_path) in log_paths.iter().enumerate() {
            // Chroma planes come out subsampled; bring every plane back to full size.
            chains.push(format!("[dis_{i}]{SCALE}[dis_{i}]"));
            chains.push(format!("[ref_{i}]{SCALE}[ref_{i}]"));
            chains.push(format!(
                "[dis_{i}][ref_{i}]libvmaf={}",
                filter_params(options, threads, log_path)
            ));
        }
    } else {
        chains.push(format!(
            "[dis][ref]libvmaf={}",
            filter_params(options, threads, &log_paths[0])
        ));
    }

    chains.join(";")
}

/// Distorted first, reference second: libvmaf takes the distorted stream as
/// its main input.
pub fn ffmpeg_args(options: &VmafOptions, filter_graph: &str) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        // Same frame rate on both inputs keeps frames paired one to one
        "-r".to_string(),
        "1".to_string(),
        "-i".to_string(),
        options.distortion.to_string_lossy().to_string(),
        "-r".to_string(),
        "1".to_string(),
        "-i".to_string(),
        options.reference.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter_graph.to_string(),
        // Scores go to the log files; the decoded output is discarded
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}

/// Executes an FFmpeg command.
pub fn run_ffmpeg(args: &[String], description: &str) -> Result<()> {
    info!("Running FFmpeg for {}: ffmpeg {}", description, args.join(" "));

    let mut command = Command::new("ffmpeg");
    command.args(args);
    command.stdout(Stdio::null()); // Nothing useful on stdout with `-f null`
    command.stderr(Stdio::piped()); // Capture stderr for logging/errors

    let start_time = std::time::Instant::now();
    let output = command.output().map_err(|e| {
        BetterVmafError::Command(format!("failed to start ffmpeg: {}", e))
    })?;
    let duration = start_time.elapsed();

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        error!("FFmpeg command failed for {} ({}ms): {}", description, duration.as_millis(), stderr);
        return Err(BetterVmafError::Command(format!(
            "FFmpeg {} failed ({}): {}",
            description, output.status, stderr.trim()
        )));
    }

    debug!("FFmpeg stderr for {} ({}ms): {}", description, duration.as_millis(), stderr);
    info!("FFmpeg command successful for {} ({}ms)", description, duration.as_millis());
    Ok(())
}

// --- libvmaf preflight ---

static LIBVMAF_FILTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*\S+\s+libvmaf\s").expect("Invalid libvmaf filter regex")
});

fn has_libvmaf(filters_listing: &str) -> bool {
    LIBVMAF_FILTER.is_match(filters_listing)
}

/// Fails early when the ffmpeg on PATH was built without libvmaf.
pub fn check_libvmaf() -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| BetterVmafError::Command(format!("failed to start ffmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(BetterVmafError::Command(format!(
            "ffmpeg -filters exited with {}",
            output.status
        )));
    }

    if !has_libvmaf(&String::from_utf8_lossy(&output.stdout)) {
        return Err(BetterVmafError::Command(
            "ffmpeg was built without the libvmaf filter".to_string(),
        ));
    }
    debug!("ffmpeg provides libvmaf");
    Ok(())
}

// --- Log parsing ---

/// Reads the per-frame `vmaf` scores from a libvmaf JSON log, in frame order.
pub fn parse_vmaf_log(log_path: &Path) -> Result<Vec<f64>> {
    info!("Parsing VMAF log file: {}", log_path.display());
    let content = fs::read_to_string(log_path)?;
    let scores = parse_vmaf_json(&content)?;
    if scores.is_empty() {
        warn!("VMAF log {} contains no frames", log_path.display());
    }
    info!("Parsed {} frames from {}", scores.len(), log_path.display());
    Ok(scores)
}

fn parse_vmaf_json(content: &str) -> Result<Vec<f64>> {
    // Only `frames[].metrics.vmaf` is read; pooled metrics and features are ignored
    let log: VmafLog = serde_json::from_str(content)?;
    log.frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            frame.metrics.vmaf.ok_or_else(|| {
                BetterVmafError::Parse(format!(
                    "frame {} has no vmaf metric",
                    frame.frame_num.unwrap_or(i as u64)
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn options() -> VmafOptions {
        VmafOptions {
            threads: Some(4),
            ..VmafOptions::new(PathBuf::from("ref.mkv"), PathBuf::from("dist.mkv"))
        }
    }

    #[test]
    fn luma_filter_graph() {
        let config = ScoringConfiguration::luma_only();
        let graph = build_filter_graph(&options(), &config, &["/tmp/y.json".to_string()]);
        assert_eq!(
            graph,
            "[0:v:0]scale=1920:1080,format=yuv420p[dis];\
             [1:v:0]scale=1920:1080,format=yuv420p[ref];\
             [dis][ref]libvmaf=n_threads=4:log_fmt=json:log_path=/tmp/y.json:\
             model=version=vmaf_v0.6.1\\\\:motion.motion_force_zero=true:n_subsample=1"
        );
    }

    #[test]
    fn chroma_filter_graph_scores_each_plane() {
        let config = ScoringConfiguration::new(true, 4).unwrap();
        let logs = ["/tmp/y.json", "/tmp/u.json", "/tmp/v.json"].map(String::from);
        let opts = VmafOptions { motion: true, subsampling: 3, ..options() };
        let graph = build_filter_graph(&opts, &config, &logs);

        assert!(graph.contains("[dis]extractplanes=y+u+v[dis_0][dis_1][dis_2]"));
        assert!(graph.contains("[ref]extractplanes=y+u+v[ref_0][ref_1][ref_2]"));
        for (i, log) in logs.iter().enumerate() {
            assert!(graph.contains(&format!("[dis_{i}]scale=1920:1080[dis_{i}]")));
            assert!(graph.contains(&format!("[ref_{i}]scale=1920:1080[ref_{i}]")));
            assert!(graph.contains(&format!("[dis_{i}][ref_{i}]libvmaf=n_threads=4:log_fmt=json:log_path={log}:")));
        }
        assert_eq!(graph.matches("motion.motion_force_zero=false:n_subsample=3").count(), 3);
        assert!(!graph.ends_with(';'));
    }

    #[test]
    #[should_panic(expected = "one VMAF log per scored channel")]
    fn filter_graph_needs_a_log_per_channel() {
        let config = ScoringConfiguration::new(true, 4).unwrap();
        build_filter_graph(&options(), &config, &["/tmp/y.json".to_string()]);
    }

    #[test]
    fn thread_count_defaults() {
        let opts = VmafOptions { threads: None, ..options() };
        let cpus = num_cpus::get();
        assert_eq!(thread_count(&opts, &ScoringConfiguration::luma_only()), cpus);
        assert_eq!(
            thread_count(&opts, &ScoringConfiguration::new(true, 2).unwrap()),
            cpus / 3 + 2
        );
        assert_eq!(thread_count(&options(), &ScoringConfiguration::luma_only()), 4);
    }

    #[test]
    fn args_put_distorted_first() {
        let args = ffmpeg_args(&options(), "GRAPH");
        let inputs: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(inputs, ["dist.mkv", "ref.mkv"]);
        assert_eq!(args[args.len() - 3..], ["-f", "null", "-"]);
        assert!(args.iter().any(|a| a == "GRAPH"));
    }

    #[test]
    fn log_paths_are_filter_safe() {
        assert_eq!(escape_log_path("/tmp/vmaf_log_1.json", false), "/tmp/vmaf_log_1.json");
        assert_eq!(
            escape_log_path(r"C:\Users\me\Temp\vmaf_log_1.json", true),
            r"C\\:/Users/me/Temp/vmaf_log_1.json"
        );
    }

    #[test]
    fn special_characters_in_log_paths_are_escaped() {
        // `:` is escaped for the option parser, then that backslash for the graph parser
        assert_eq!(escape_log_path("/tmp/a:b/log.json", false), r"/tmp/a\\:b/log.json");
        assert_eq!(escape_log_path("/tmp/a,b;c/log.json", false), r"/tmp/a\,b\;c/log.json");
        assert_eq!(escape_log_path("/tmp/[x]/log.json", false), r"/tmp/\[x\]/log.json");
        assert_eq!(escape_log_path("/tmp/it's/log.json", false), r"/tmp/it\\\'s/log.json");
    }

    #[test]
    fn escaped_log_path_keeps_filter_graph_structure() {
        let config = ScoringConfiguration::luma_only();
        let log = escape_log_path("/tmp/odd;dir,x:y/log.json", false);
        let graph = build_filter_graph(&options(), &config, &[log]);
        // Three chains, none of them split by the path
        assert_eq!(graph.split(';').filter(|c| !c.ends_with('\\')).count(), 3);
    }

    #[test]
    fn detects_libvmaf_in_filter_listing() {
        let listing = "Filters:\n\
            \x20 T.C = Timeline support\n\
            \x20... libvmaf           VV->V      Calculate the VMAF between two video streams.\n";
        assert!(has_libvmaf(listing));

        let cuda_only = " ... libvmaf_cuda      VV->V      Calculate the VMAF using CUDA.\n";
        assert!(!has_libvmaf(cuda_only));
        assert!(!has_libvmaf(" ... psnr              VV->V      Calculate the PSNR.\n"));
    }

    #[test]
    fn parses_vmaf_scores_in_frame_order() {
        let json = r#"{
            "version": "2.3.1",
            "frames": [
                {"frameNum": 0, "metrics": {"integer_adm2": 0.98, "vmaf": 97.5}},
                {"frameNum": 1, "metrics": {"vmaf": 93.25}},
                {"frameNum": 2, "metrics": {"vmaf": 99.0}}
            ],
            "pooled_metrics": {"vmaf": {"min": 93.25, "max": 99.0, "mean": 96.58}}
        }"#;
        assert_eq!(parse_vmaf_json(json).unwrap(), vec![97.5, 93.25, 99.0]);
    }

    #[test]
    fn missing_vmaf_metric_is_a_parse_error() {
        let json = r#"{"frames": [{"frameNum": 7, "metrics": {"psnr_y": 40.0}}]}"#;
        let err = parse_vmaf_json(json).unwrap_err();
        assert!(matches!(err, BetterVmafError::Parse(ref msg) if msg.contains("frame 7")));
    }

    #[test]
    fn malformed_log_is_a_json_error() {
        assert!(matches!(
            parse_vmaf_json("{\"frames\": ["),
            Err(BetterVmafError::Json(_))
        ));
    }

    #[test]
    fn reads_log_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"frames": [{{"metrics": {{"vmaf": 88.0}}}}]}}"#).unwrap();
        assert_eq!(parse_vmaf_log(file.path()).unwrap(), vec![88.0]);
    }

    #[test]
    fn empty_log_yields_empty_series() {
        assert!(parse_vmaf_json(r#"{"frames": []}"#).unwrap().is_empty());
    }

    #[test]
    fn log_files_are_removed_on_drop() {
        let files = create_log_files(3).unwrap();
        let paths: Vec<PathBuf> = files.iter().map(|p| p.to_path_buf()).collect();
        assert!(paths.iter().all(|p| p.exists()));
        drop(files);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn missing_input_is_reported() {
        let opts = VmafOptions::new(
            PathBuf::from("/nonexistent/ref.mkv"),
            PathBuf::from("/nonexistent/dist.mkv"),
        );
        let config = ScoringConfiguration::luma_only();
        let err = VmafComputer::new(&opts, &config).run().unwrap_err();
        assert!(matches!(err, BetterVmafError::Input(_)));
    }
}
