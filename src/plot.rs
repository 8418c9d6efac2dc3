// src/plot.rs

use crate::error::{BetterVmafError, Result};
use crate::scoring::ChannelScores;
use log::{info, warn};
use plotters::prelude::*;
use plotters::style::full_palette::{GREEN, ORANGE, PURPLE};
use quantiles::ckms::CKMS;
use std::path::Path;

/// Lines drawn across the plot: mean and low percentiles of one series.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StatLines {
    mean: f64,
    perc_1: f64,
    perc_25: f64,
    perc_75: f64,
}

fn stat_lines(scores: &[f64]) -> Option<StatLines> {
    let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }

    let mut ckms = CKMS::<f64>::new(0.001);
    for score in &finite {
        ckms.insert(*score);
    }
    let percentile = |q: f64| ckms.query(q).map(|(_, value)| value).unwrap_or(f64::NAN);

    Some(StatLines {
        mean: finite.iter().sum::<f64>() / finite.len() as f64,
        perc_1: percentile(0.01),
        perc_25: percentile(0.25),
        perc_75: percentile(0.75),
    })
}

/// Axis ranges and stat lines, worked out before anything is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotLayout {
    stats: StatLines,
    longest: usize,
    x_max: u64,
    y_min: f64,
    y_max: f64,
}

/// Source frame number of the i-th scored frame. Saturates for large
/// subsampling factors.
fn frame_number(i: usize, frame_step: u32) -> u64 {
    (i as u64).saturating_mul(u64::from(frame_step))
}

fn plot_layout(
    series: &[&[f64]],
    weighted: &[f64],
    luma: &[f64],
    frame_step: u32,
) -> Result<PlotLayout> {
    // Stat lines follow the weighted series. An empty chroma log leaves it
    // empty, in which case the luma series still gives a usable plot.
    let stats = stat_lines(weighted)
        .or_else(|| {
            warn!("Weighted series has no finite scores; stat lines use the Y channel");
            stat_lines(luma)
        })
        .ok_or_else(|| BetterVmafError::Plot("No valid VMAF scores to plot".to_string()))?;

    let longest = series.iter().map(|s| s.len()).max().unwrap_or(0);
    let x_max = frame_number(longest.saturating_sub(1), frame_step).max(1);

    let finite = || series.iter().flat_map(|s| s.iter().copied()).filter(|s| s.is_finite());
    let lowest = finite().fold(f64::INFINITY, f64::min);
    let highest = finite().fold(f64::NEG_INFINITY, f64::max);

    Ok(PlotLayout {
        stats,
        longest,
        x_max,
        // Keep 100 visible and never start the axis above 95
        y_min: lowest.floor().clamp(0.0, 95.0),
        y_max: highest.max(100.0) + 0.5,
    })
}

/// Plots per-frame scores of every channel plus the weighted series.
///
/// `frame_step` is the VMAF subsampling factor, so the x axis shows source
/// frame numbers.
pub fn generate_plot(
    scores: &ChannelScores,
    weighted: &[f64],
    frame_step: u32,
    output_path: &Path,
) -> Result<()> {
    info!("Generating VMAF plot: {}", output_path.display());

    let mut series: Vec<(&str, &[f64], RGBColor)> = Vec::new();
    match scores {
        ChannelScores::Luma(y) => series.push(("Y", y.as_slice(), BLUE)),
        ChannelScores::Yuv { y, u, v } => {
            series.push(("Y", y.as_slice(), BLUE));
            series.push(("U", u.as_slice(), GREEN));
            series.push(("V", v.as_slice(), PURPLE));
            series.push(("Weighted", weighted, BLACK));
        }
    }

    let values: Vec<&[f64]> = series.iter().map(|(_, s, _)| *s).collect();
    let PlotLayout { stats, longest, x_max, y_min, y_max } =
        plot_layout(&values, weighted, scores.luma(), frame_step)?;

    let root = BitMapBackend::new(output_path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| BetterVmafError::Plot(format!("Failed to fill plot background: {}", e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("VMAF Scores ({} Frames)", longest), ("sans-serif", 24).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0u64..x_max, y_min..y_max)
        .map_err(|e| BetterVmafError::Plot(format!("Failed to build chart: {}", e)))?;

    let y_label_format = |y: &f64| format!("{:.1}", y);
    chart
        .configure_mesh()
        .x_desc("Frame Number")
        .y_desc("VMAF Score")
        .y_label_formatter(&y_label_format)
        .axis_desc_style(("sans-serif", 16))
        .label_style(("sans-serif", 14))
        .y_max_light_lines(10)
        .y_labels(10)
        .draw()
        .map_err(|e| BetterVmafError::Plot(format!("Failed to draw mesh: {:?}", e)))?;

    // One line per channel; empty channels are skipped, not fatal
    for (name, values, color) in &series {
        if values.is_empty() {
            warn!("{} channel has no scores; leaving it off the plot", name);
            continue;
        }
        let color = *color;
        chart
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, s)| (frame_number(i, frame_step), *s)),
                color.mix(0.8).stroke_width(1),
            ))
            .map_err(|e| BetterVmafError::Plot(format!("Failed to draw {} series: {:?}", name, e)))?
            .label(format!("{} Scores", name))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.filled()));
    }

    // Horizontal stat lines spanning the whole x range
    for (label, value, color) in [
        (format!("Mean: {:.2}", stats.mean), stats.mean, BLACK),
        (format!("1%:   {:.2}", stats.perc_1), stats.perc_1, RED),
        (format!("25%: {:.2}", stats.perc_25), stats.perc_25, ORANGE),
        (format!("75%: {:.2}", stats.perc_75), stats.perc_75, GREEN),
    ] {
        chart
            .draw_series(LineSeries::new(vec![(0, value), (x_max, value)], stat_line_style(color)))
            .map_err(|e| BetterVmafError::Plot(format!("Failed to draw stat line: {:?}", e)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], stat_line_style(color)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerMiddle)
        .margin(10)
        .label_font(("sans-serif", 12))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| BetterVmafError::Plot(format!("Failed to draw legend: {:?}", e)))?;

    root.present()
        .map_err(|e| BetterVmafError::Plot(format!("Failed to save plot: {:?}", e)))?;
    info!("Successfully generated VMAF plot: {}", output_path.display());

    Ok(())
}

fn stat_line_style(color: RGBColor) -> ShapeStyle {
    ShapeStyle {
        color: color.to_rgba(),
        filled: false,
        stroke_width: 1,
    }
}
