//! Projection of policy caps and the live recommendation onto concrete
//! encoder parameters.
//!
//! The quantization table is intentionally coarse: every resolution or
//! frame-rate change forces a full encoder re-init and a keyframe, so
//! bandwidth-utilization precision is traded for reconfiguration
//! stability. The governor's caps are authoritative — the controller only
//! ever modulates bitrate, and never past what the tier is entitled to.

use serde::{Deserialize, Serialize};

use crate::governor::QualityProfile;

// ── Quantization table ───────────────────────────────────────────

/// `(minimum bitrate, width, height, fps)` — highest matching row wins.
const BREAKPOINTS: &[(u64, u32, u32, u32)] = &[
    (30_000_000, 3840, 2160, 60),
    (15_000_000, 2560, 1440, 60),
    (8_000_000, 1920, 1080, 60),
    (4_000_000, 1920, 1080, 30),
];

/// Fallback when the bitrate is under every breakpoint.
const FLOOR: (u32, u32, u32) = (1280, 720, 30);

// ── EncoderSettings ──────────────────────────────────────────────

/// Concrete parameters handed to the encoder.
///
/// `width`/`height` must match what the wire framer stamps into its frame
/// headers; `bitrate` is the budget the encoder tracks so per-frame
/// payloads stay within the framer's chunking budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
}

/// Merge the governor's caps with the controller's live bitrate and
/// quantize the result.
///
/// `final_bitrate = min(profile cap, live bitrate)` selects a breakpoint
/// row; the profile's `resolution_scale` then multiplies the quantized
/// dimensions (kept even for encoder alignment) and the emitted fps never
/// exceeds the profile's target.
pub fn project(profile: &QualityProfile, live_bitrate: u64) -> EncoderSettings {
    let bitrate = live_bitrate.min(profile.max_bitrate);
    let (width, height, fps) = BREAKPOINTS
        .iter()
        .find(|(min, ..)| bitrate >= *min)
        .map(|&(_, w, h, f)| (w, h, f))
        .unwrap_or(FLOOR);

    EncoderSettings {
        width: scale_even(width, profile.resolution_scale),
        height: scale_even(height, profile.resolution_scale),
        fps: fps.min(profile.target_fps),
        bitrate,
    }
}

/// Scale a dimension, rounding down to the nearest even value.
fn scale_even(dim: u32, scale: f64) -> u32 {
    ((dim as f64 * scale) as u32) & !1
}

// ── Tests ────────────────────────────────────────────────────────
