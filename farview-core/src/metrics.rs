//! Network quality model.
//!
//! A [`NetworkQualityMetrics`] value is one tick's immutable snapshot of the
//! path. Its composite `quality_score` is a weighted sum of four normalized
//! sub-scores (bandwidth, latency, loss, jitter), each clamped to `[0, 1]`.
//! [`ScoreHistory`] keeps the last few composite scores so downstream
//! consumers react to the *smoothed* score, never a single noisy sample.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ── Score weights and normalization ──────────────────────────────

/// Bandwidth that earns a full bandwidth sub-score: 100 Mbit/s in bytes/s.
const FULL_BANDWIDTH_BPS: f64 = 12_500_000.0;
/// Latency at or below this scores 1.0.
const LATENCY_FLOOR_MS: f64 = 50.0;
/// Latency span over which the sub-score decays to 0.
const LATENCY_SPAN_MS: f64 = 150.0;
/// Loss ratio penalty factor: 5 % loss zeroes the sub-score.
const LOSS_PENALTY: f64 = 20.0;
/// Jitter at or below this scores 1.0.
const JITTER_FLOOR_MS: f64 = 10.0;
/// Jitter span over which the sub-score decays to 0.
const JITTER_SPAN_MS: f64 = 40.0;

const WEIGHT_BANDWIDTH: f64 = 0.3;
const WEIGHT_LATENCY: f64 = 0.3;
const WEIGHT_LOSS: f64 = 0.2;
const WEIGHT_JITTER: f64 = 0.2;

/// Latency assumed for a channel with no RTT measurement yet. Scores as
/// "acceptable", not "best" or "worst".
pub const NEUTRAL_LATENCY_MS: f64 = 50.0;
/// Jitter assumed for a channel with no RTT measurement yet.
pub const NEUTRAL_JITTER_MS: f64 = 10.0;

/// Number of composite scores retained for smoothing.
pub const SMOOTHING_WINDOW: usize = 10;

fn unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

// ── QualityLevel ─────────────────────────────────────────────────

/// Coarse link classification derived from the smoothed composite score.
///
/// The derived `Ord` follows declaration order: `Poor < Fair < Good <
/// Excellent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum QualityLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLevel {
    /// Classify a composite score.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            QualityLevel::Excellent
        } else if score >= 0.6 {
            QualityLevel::Good
        } else if score >= 0.4 {
            QualityLevel::Fair
        } else {
            QualityLevel::Poor
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLevel::Excellent => write!(f, "excellent"),
            QualityLevel::Good => write!(f, "good"),
            QualityLevel::Fair => write!(f, "fair"),
            QualityLevel::Poor => write!(f, "poor"),
        }
    }
}

// ── NetworkQualityMetrics ────────────────────────────────────────

/// Immutable snapshot of path measurements for one evaluation interval.
#[derive(Debug, Clone, Copy)]
pub struct NetworkQualityMetrics {
    /// Throughput in bytes per second, ≥ 0.
    pub bandwidth_bps: f64,
    /// Smoothed round-trip latency in milliseconds, ≥ 0.
    pub latency_ms: f64,
    /// Packet loss ratio in `[0, 1]`.
    pub packet_loss: f64,
    /// Latency variation in milliseconds, ≥ 0.
    pub jitter_ms: f64,
    /// When the snapshot was taken.
    pub timestamp: Instant,
}

impl NetworkQualityMetrics {
    pub fn bandwidth_score(&self) -> f64 {
        unit(self.bandwidth_bps / FULL_BANDWIDTH_BPS)
    }

    pub fn latency_score(&self) -> f64 {
        unit(1.0 - (self.latency_ms - LATENCY_FLOOR_MS) / LATENCY_SPAN_MS)
    }

    pub fn packet_loss_score(&self) -> f64 {
        unit(1.0 - self.packet_loss * LOSS_PENALTY)
    }

    pub fn jitter_score(&self) -> f64 {
        unit(1.0 - (self.jitter_ms - JITTER_FLOOR_MS) / JITTER_SPAN_MS)
    }

    /// Weighted composite score in `[0, 1]`.
    ///
    /// A pure function of the four measurements; the same snapshot always
    /// scores the same.
    pub fn quality_score(&self) -> f64 {
        WEIGHT_BANDWIDTH * self.bandwidth_score()
            + WEIGHT_LATENCY * self.latency_score()
            + WEIGHT_LOSS * self.packet_loss_score()
            + WEIGHT_JITTER * self.jitter_score()
    }

    /// Level of this snapshot alone, without smoothing.
    pub fn level(&self) -> QualityLevel {
        QualityLevel::from_score(self.quality_score())
    }
}

// ── ScoreHistory ─────────────────────────────────────────────────

/// Bounded ring of recent composite scores.
///
/// The smoothed score is the arithmetic mean of whatever is present, so a
/// partially-filled window still smooths over all available samples.
#[derive(Debug, Clone)]
pub struct ScoreHistory {
    scores: VecDeque<f64>,
    capacity: usize,
}

impl ScoreHistory {
    /// History with the standard [`SMOOTHING_WINDOW`] capacity.
    pub fn new() -> Self {
        Self::with_capacity(SMOOTHING_WINDOW)
    }

    /// History with a custom window size (testing and tuning).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a score, evicting the oldest when the window is full.
    pub fn push(&mut self, score: f64) {
        if self.scores.len() == self.capacity {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    /// Mean of the retained scores; 0.0 when empty.
    pub fn smoothed(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl Default for ScoreHistory {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
