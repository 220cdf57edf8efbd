//! # farview-core
//!
//! Adaptive quality/bitrate control for a real-time remote-desktop video
//! stream. Converts noisy, continuously-sampled network-path measurements
//! into stable encoder parameters, and reconciles those live measurements
//! with a static policy layer driven by connection topology, subscription
//! tier, and a rationed AI-enhancement quota.
//!
//! ## Architecture
//!
//! ```text
//! transport I/O tasks                    tick task (QualityService)
//! ┌───────────────────────┐             ┌──────────────────────────────┐
//! │ record_sent/received  │   atomics   │ NetworkQualityMonitor        │
//! │ record_lost           │ ──────────► │   ↓ smoothed score           │
//! │ EwmaRtt::record       │             │ AdaptiveBitrateController    │
//! └───────────────────────┘             │   ↓ live bitrate             │
//!                                       │ governor::decide ─► project  │
//!                                       └───────┬──────────────────────┘
//!                                               │ watch + mpsc
//!                                               ▼
//!                                encoder reconfiguration / UI callbacks
//! ```
//!
//! ## Sub-modules
//!
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | `stats`      | Lock-free packet/byte counters fed by the transport  |
//! | `metrics`    | Quality snapshot, composite score, smoothing history |
//! | `monitor`    | Per-tick evaluation and level-transition detection   |
//! | `controller` | Hysteresis bitrate ladder                            |
//! | `governor`   | Pure topology/tier/quota → profile policy            |
//! | `projector`  | Cap merge + quantization to encoder parameters       |
//! | `rtt`        | RTT measurement boundary (transport collaborator)    |
//! | `service`    | Tick driver, channels, session lifecycle             |
//! | `error`      | `QualityError` — typed, `thiserror`-based errors     |

pub mod controller;
pub mod error;
pub mod governor;
pub mod metrics;
pub mod monitor;
pub mod projector;
pub mod rtt;
pub mod service;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use controller::{AdaptiveBitrateController, BitrateConfig};
pub use error::QualityError;
pub use governor::{
    AiQuota, ConnectionScenario, EncodingPreset, QualityProfile, UserTier, decide,
};
pub use metrics::{NetworkQualityMetrics, QualityLevel, SMOOTHING_WINDOW, ScoreHistory};
pub use monitor::{NetworkQualityMonitor, TickReading};
pub use projector::{EncoderSettings, project};
pub use rtt::{EwmaRtt, NeutralRtt, RttEstimate, RttProvider};
pub use service::{
    DEFAULT_TICK_INTERVAL, QualityEvent, QualityReport, QualityService, QualityServiceConfig,
    StreamPolicy,
};
pub use stats::{IntervalCounters, PacketStatistics};
