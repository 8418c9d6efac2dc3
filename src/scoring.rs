// src/scoring.rs

use crate::config::ScoringConfiguration;
use crate::stats::ChannelStatistics;
use log::{debug, warn};
use serde::Serialize;

/// Per-frame VMAF scores, one series per scored plane, in frame order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelScores {
    Luma(Vec<f64>),
    Yuv { y: Vec<f64>, u: Vec<f64>, v: Vec<f64> },
}

impl ChannelScores {
    /// Builds the variant from series in Y, U, V order.
    ///
    /// Panics unless exactly 1 or 3 series are given.
    pub fn from_series(mut series: Vec<Vec<f64>>) -> Self {
        match series.len() {
            1 => Self::Luma(series.remove(0)),
            3 => {
                let v = series.remove(2);
                let u = series.remove(1);
                let y = series.remove(0);
                Self::Yuv { y, u, v }
            }
            n => panic!("expected 1 or 3 channel score series, got {n}"),
        }
    }

    pub fn luma(&self) -> &[f64] {
        match self {
            Self::Luma(y) | Self::Yuv { y, .. } => y,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.luma().len()
    }

    pub fn statistics(&self) -> Channels {
        match self {
            Self::Luma(y) => Channels::Luma(ChannelStatistics::from_scores(y)),
            Self::Yuv { y, u, v } => Channels::Yuv {
                luma: ChannelStatistics::from_scores(y),
                chroma_u: ChannelStatistics::from_scores(u),
                chroma_v: ChannelStatistics::from_scores(v),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Channels {
    Luma(ChannelStatistics),
    Yuv {
        luma: ChannelStatistics,
        chroma_u: ChannelStatistics,
        chroma_v: ChannelStatistics,
    },
}

impl Channels {
    pub fn luma(&self) -> &ChannelStatistics {
        match self {
            Self::Luma(luma) | Self::Yuv { luma, .. } => luma,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct WeightedScoreResult {
    pub channels: Channels,
    /// Statistics over the per-frame weighted series.
    pub weighted_frames: ChannelStatistics,
    pub final_score: f64,
}

/// Combines the channels' geometric means into one score.
///
/// Luma only: the luma geometric mean, unchanged. With chroma:
/// `(luma * w + u + v) / (w + 2)`.
///
/// Panics if the channel layout disagrees with `config.compare_chroma`.
pub fn final_score(channels: &Channels, config: &ScoringConfiguration) -> f64 {
    match (channels, config.compare_chroma) {
        (Channels::Luma(luma), false) => luma.geometric_mean,
        (Channels::Yuv { luma, chroma_u, chroma_v }, true) => weigh(
            luma.geometric_mean,
            chroma_u.geometric_mean,
            chroma_v.geometric_mean,
            config.chroma_weight(),
        ),
        (channels, compare_chroma) => unreachable!(
            "channel layout {:?} does not match compare_chroma={}",
            channels, compare_chroma
        ),
    }
}

fn weigh(y: f64, u: f64, v: f64, chroma_weight: u32) -> f64 {
    let w = f64::from(chroma_weight);
    (y * w + u + v) / (w + 2.0)
}

/// Per-frame weighted scores. Mismatched chroma series are truncated to the
/// shortest one.
pub fn weighted_frame_scores(scores: &ChannelScores, config: &ScoringConfiguration) -> Vec<f64> {
    match (scores, config.compare_chroma) {
        (ChannelScores::Luma(y), false) => y.clone(),
        (ChannelScores::Yuv { y, u, v }, true) => {
            if y.len() != u.len() || y.len() != v.len() {
                warn!(
                    "Channel frame counts differ (Y: {}, U: {}, V: {}); weighting the first {} frames",
                    y.len(),
                    u.len(),
                    v.len(),
                    y.len().min(u.len()).min(v.len())
                );
            }
            y.iter()
                .zip(u)
                .zip(v)
                .map(|((&y, &u), &v)| weigh(y, u, v, config.chroma_weight()))
                .collect()
        }
        (scores, compare_chroma) => unreachable!(
            "{} score series do not match compare_chroma={}",
            if matches!(scores, ChannelScores::Luma(_)) { 1 } else { 3 },
            compare_chroma
        ),
    }
}

/// Computes every channel's statistics and the final weighted score.
pub fn score(scores: &ChannelScores, config: &ScoringConfiguration) -> WeightedScoreResult {
    let channels = scores.statistics();
    let weighted = weighted_frame_scores(scores, config);
    let result = WeightedScoreResult {
        channels,
        weighted_frames: ChannelStatistics::from_scores(&weighted),
        final_score: final_score(&channels, config),
    };
    debug!("Scored {} frames: {:?}", scores.frame_count(), result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_geo_mean(gm: f64) -> ChannelStatistics {
        ChannelStatistics { geometric_mean: gm, ..ChannelStatistics::from_scores(&[gm]) }
    }

    #[test]
    fn chroma_weighted_final_score() {
        let channels = Channels::Yuv {
            luma: with_geo_mean(90.0),
            chroma_u: with_geo_mean(85.0),
            chroma_v: with_geo_mean(95.0),
        };
        let config = ScoringConfiguration::new(true, 4).unwrap();
        assert!((final_score(&channels, &config) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn luma_only_final_score_is_geometric_mean() {
        let channels = Channels::Luma(with_geo_mean(92.3));
        let config = ScoringConfiguration::new(false, 4).unwrap();
        assert_eq!(final_score(&channels, &config), 92.3);
    }

    #[test]
    fn luma_only_score_matches_luma_statistics() {
        let scores = ChannelScores::Luma(vec![91.0, 95.5, 88.25, 99.0]);
        let result = score(&scores, &ScoringConfiguration::luma_only());
        assert_eq!(result.final_score, result.channels.luma().geometric_mean);
        assert_eq!(result.weighted_frames, *result.channels.luma());
    }

    #[test]
    fn weight_shifts_score_towards_luma() {
        let channels = Channels::Yuv {
            luma: with_geo_mean(80.0),
            chroma_u: with_geo_mean(100.0),
            chroma_v: with_geo_mean(100.0),
        };
        let light = final_score(&channels, &ScoringConfiguration::new(true, 1).unwrap());
        let heavy = final_score(&channels, &ScoringConfiguration::new(true, 8).unwrap());
        assert!((light - 280.0 / 3.0).abs() < 1e-12);
        assert!((heavy - 84.0).abs() < 1e-12);
    }

    #[test]
    fn per_frame_weighting() {
        let scores = ChannelScores::Yuv {
            y: vec![90.0, 80.0],
            u: vec![85.0, 100.0],
            v: vec![95.0, 100.0],
        };
        let config = ScoringConfiguration::new(true, 4).unwrap();
        let weighted = weighted_frame_scores(&scores, &config);
        assert_eq!(weighted.len(), 2);
        assert!((weighted[0] - 90.0).abs() < 1e-12);
        assert!((weighted[1] - 520.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn per_frame_weighting_truncates_to_shortest() {
        let scores = ChannelScores::Yuv {
            y: vec![90.0, 90.0, 90.0],
            u: vec![90.0, 90.0],
            v: vec![90.0, 90.0, 90.0],
        };
        let config = ScoringConfiguration::new(true, 2).unwrap();
        assert_eq!(weighted_frame_scores(&scores, &config).len(), 2);
    }

    #[test]
    fn empty_chroma_channel_propagates_nan() {
        let scores = ChannelScores::Yuv {
            y: vec![90.0, 92.0],
            u: vec![],
            v: vec![88.0, 91.0],
        };
        let result = score(&scores, &ScoringConfiguration::new(true, 4).unwrap());
        assert!(result.channels.luma().is_defined());
        assert!(result.final_score.is_nan());
        assert!(result.weighted_frames.mean.is_nan());
    }

    #[test]
    fn from_series_builds_variants() {
        assert_eq!(
            ChannelScores::from_series(vec![vec![1.0]]),
            ChannelScores::Luma(vec![1.0])
        );
        assert_eq!(
            ChannelScores::from_series(vec![vec![1.0], vec![2.0], vec![3.0]]),
            ChannelScores::Yuv { y: vec![1.0], u: vec![2.0], v: vec![3.0] }
        );
    }

    #[test]
    #[should_panic(expected = "expected 1 or 3")]
    fn two_series_is_a_contract_violation() {
        ChannelScores::from_series(vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    #[should_panic]
    fn layout_mismatch_is_a_contract_violation() {
        let channels = Channels::Luma(with_geo_mean(90.0));
        final_score(&channels, &ScoringConfiguration::new(true, 4).unwrap());
    }
}
