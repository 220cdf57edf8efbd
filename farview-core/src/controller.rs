//! Hysteresis bitrate ladder.
//!
//! Consumes the smoothed quality score once per tick and moves a clamped
//! bitrate up or down in fixed steps. The band between `quality_threshold`
//! and the excellent mark is a deliberate dead zone: holding there prevents
//! hunting around the threshold boundary. Severe degradation steps down at
//! twice the upward rate — under-provisioning stutters on screen, while
//! over-provisioning merely wastes headroom.
//!
//! Every encoder reconfiguration costs a keyframe and a socket
//! renegotiation, so a change is reported only when the clamped value
//! actually moved.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::QualityError;

// ── Score breakpoints ────────────────────────────────────────────

/// Smoothed score at or above which the controller probes upward.
const PROBE_UP_SCORE: f64 = 0.8;
/// Smoothed score below which degradation is treated as severe.
const SEVERE_SCORE: f64 = 0.3;

// ── BitrateConfig ────────────────────────────────────────────────

/// Controller bounds and step size, all in bits per second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BitrateConfig {
    pub min_bitrate: u64,
    pub max_bitrate: u64,
    pub initial_bitrate: u64,
    pub step_size: u64,
    /// Lower edge of the hold band, in `(0, 1)`.
    pub quality_threshold: f64,
}

impl BitrateConfig {
    /// Check the construction invariants:
    /// `0 < min ≤ initial ≤ max`, `step_size > 0`, `threshold ∈ (0, 1)`.
    pub fn validate(&self) -> Result<(), QualityError> {
        if self.step_size == 0 {
            return Err(QualityError::InvalidBitrateConfig(
                "step_size must be positive",
            ));
        }
        if self.min_bitrate == 0 {
            return Err(QualityError::InvalidBitrateConfig(
                "min_bitrate must be positive",
            ));
        }
        if self.min_bitrate > self.max_bitrate {
            return Err(QualityError::InvalidBitrateConfig(
                "min_bitrate exceeds max_bitrate",
            ));
        }
        if self.initial_bitrate < self.min_bitrate || self.initial_bitrate > self.max_bitrate {
            return Err(QualityError::InvalidBitrateConfig(
                "initial_bitrate outside [min_bitrate, max_bitrate]",
            ));
        }
        if !(self.quality_threshold > 0.0 && self.quality_threshold < 1.0) {
            return Err(QualityError::InvalidBitrateConfig(
                "quality_threshold outside (0, 1)",
            ));
        }
        Ok(())
    }
}

impl Default for BitrateConfig {
    /// 1–50 Mbit/s starting at 10, 2 Mbit/s steps, hold band from 0.6.
    fn default() -> Self {
        Self {
            min_bitrate: 1_000_000,
            max_bitrate: 50_000_000,
            initial_bitrate: 10_000_000,
            step_size: 2_000_000,
            quality_threshold: 0.6,
        }
    }
}

// ── AdaptiveBitrateController ────────────────────────────────────

/// Bitrate ladder driven by the smoothed quality score.
///
/// State is a single clamped bitrate in `[min_bitrate, max_bitrate]`. The
/// trace is fully deterministic for a fixed config and score sequence: no
/// randomness, no clock.
#[derive(Debug, Clone)]
pub struct AdaptiveBitrateController {
    config: BitrateConfig,
    current_bitrate: u64,
}

impl AdaptiveBitrateController {
    /// Create a controller seeded at `initial_bitrate`.
    ///
    /// Rejects configs that violate the [`BitrateConfig`] invariants so a
    /// misconfigured host fails before its session starts.
    pub fn new(config: BitrateConfig) -> Result<Self, QualityError> {
        config.validate()?;
        Ok(Self {
            current_bitrate: config.initial_bitrate,
            config,
        })
    }

    /// Apply one smoothed score, in priority order:
    ///
    /// 1. `s ≥ 0.8` — probe upward by one step.
    /// 2. `threshold ≤ s < 0.8` — hold (dead zone).
    /// 3. `0.3 ≤ s < threshold` — back off one step.
    /// 4. `s < 0.3` — back off two steps.
    ///
    /// Returns the new bitrate only when the clamped value actually moved;
    /// holds and clamps already saturated at a bound yield `None`.
    pub fn observe(&mut self, smoothed_score: f64) -> Option<u64> {
        let step = self.config.step_size;
        let next = if smoothed_score >= PROBE_UP_SCORE {
            self.current_bitrate
                .saturating_add(step)
                .min(self.config.max_bitrate)
        } else if smoothed_score >= self.config.quality_threshold {
            self.current_bitrate
        } else if smoothed_score >= SEVERE_SCORE {
            self.current_bitrate
                .saturating_sub(step)
                .max(self.config.min_bitrate)
        } else {
            self.current_bitrate
                .saturating_sub(step * 2)
                .max(self.config.min_bitrate)
        };

        if next == self.current_bitrate {
            return None;
        }
        debug!(
            from = self.current_bitrate,
            to = next,
            score = smoothed_score,
            "bitrate adjusted"
        );
        self.current_bitrate = next;
        Some(next)
    }

    /// Reseed at `initial_bitrate` (session start).
    pub fn reset(&mut self) {
        self.current_bitrate = self.config.initial_bitrate;
    }

    pub fn current_bitrate(&self) -> u64 {
        self.current_bitrate
    }

    pub fn config(&self) -> &BitrateConfig {
        &self.config
    }
}

// ── Tests ────────────────────────────────────────────────────────
