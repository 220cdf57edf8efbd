//! Static quality policy.
//!
//! [`decide`] maps connection topology, subscription tier, and the AI
//! enhancement quota to a hard-capped [`QualityProfile`]. It is a pure
//! function with no state and no side effects, so the whole policy is
//! testable as a decision table. Live measurements never enter here — the
//! projector merges them afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Policy inputs ────────────────────────────────────────────────

/// Connection topology, detected at session setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionScenario {
    /// Same-network direct link; link cost is effectively zero.
    LocalNearField,
    /// Relayed through an intermediary server.
    RemoteRelay,
    /// Direct peer-to-peer across the WAN.
    RemoteP2p,
}

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserTier {
    Free,
    Pro,
    Vip,
}

/// State of the rationed AI super-resolution quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AiQuota {
    Sufficient,
    Low,
    Exhausted,
}

/// Encoder speed/quality trade-off label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingPreset {
    /// Lowest latency, least compression.
    Fast,
    Medium,
    /// Highest compression efficiency, most encode time.
    Slow,
}

impl fmt::Display for EncodingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingPreset::Fast => write!(f, "fast"),
            EncodingPreset::Medium => write!(f, "medium"),
            EncodingPreset::Slow => write!(f, "slow"),
        }
    }
}

// ── QualityProfile ───────────────────────────────────────────────

/// Baseline caps for a session, independent of live measurements.
///
/// The unit exchanged between the governor and the settings projector, and
/// ultimately the bundle the encoder integration reads its limits from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Hard bitrate cap in bits per second.
    pub max_bitrate: u64,
    /// Frame-rate target the projector may not exceed.
    pub target_fps: u32,
    /// Fraction of the quantized resolution to emit, in `(0, 1]`.
    pub resolution_scale: f64,
    pub enable_hdr: bool,
    pub enable_ai_super_resolution: bool,
    pub preset: EncodingPreset,
}

/// Decide the baseline profile for a session.
///
/// A local near-field link short-circuits tier and quota entirely: the link
/// costs nothing, so the encoder runs in its lowest-latency mode rather
/// than its highest-compression mode. For remote scenarios the tier sets
/// the caps; the quota gates only the AI flag — bandwidth cost and compute
/// cost are rationed on separate axes.
pub fn decide(scenario: ConnectionScenario, tier: UserTier, quota: AiQuota) -> QualityProfile {
    if scenario == ConnectionScenario::LocalNearField {
        return QualityProfile {
            max_bitrate: 100_000_000,
            target_fps: 120,
            resolution_scale: 1.0,
            enable_hdr: true,
            enable_ai_super_resolution: false,
            preset: EncodingPreset::Fast,
        };
    }

    let p2p = scenario == ConnectionScenario::RemoteP2p;
    match tier {
        UserTier::Vip => QualityProfile {
            max_bitrate: if p2p { 20_000_000 } else { 10_000_000 },
            target_fps: 60,
            resolution_scale: 1.0,
            enable_hdr: true,
            enable_ai_super_resolution: quota != AiQuota::Exhausted,
            preset: EncodingPreset::Slow,
        },
        UserTier::Pro => QualityProfile {
            max_bitrate: if p2p { 10_000_000 } else { 5_000_000 },
            target_fps: 60,
            resolution_scale: if p2p { 1.0 } else { 0.75 },
            enable_hdr: false,
            enable_ai_super_resolution: quota == AiQuota::Sufficient,
            preset: EncodingPreset::Medium,
        },
        // Cost containment beats topology for free accounts.
        UserTier::Free => QualityProfile {
            max_bitrate: 2_000_000,
            target_fps: 30,
            resolution_scale: 0.5,
            enable_hdr: false,
            enable_ai_super_resolution: false,
            preset: EncodingPreset::Fast,
        },
    }
}

// ── Tests ────────────────────────────────────────────────────────
