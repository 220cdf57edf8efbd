//! Round-trip-time measurement boundary.
//!
//! Latency and jitter are measured by the transport (echo/ack timestamps),
//! not by this subsystem; [`RttProvider`] is the seam the transport plugs
//! into. Two implementations ship here: [`NeutralRtt`] for hosts with no
//! measurement path, and [`EwmaRtt`], a lock-free smoothed tracker the
//! transport feeds raw samples into from its ack path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::metrics::{NEUTRAL_JITTER_MS, NEUTRAL_LATENCY_MS};

// ── RttEstimate ──────────────────────────────────────────────────

/// A smoothed latency/jitter estimate in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttEstimate {
    pub latency_ms: f64,
    pub jitter_ms: f64,
}

impl RttEstimate {
    /// The estimate assumed for an unmeasured channel: scores as
    /// "acceptable", not "best" or "worst".
    pub const NEUTRAL: Self = Self {
        latency_ms: NEUTRAL_LATENCY_MS,
        jitter_ms: NEUTRAL_JITTER_MS,
    };
}

// ── RttProvider ──────────────────────────────────────────────────

/// Source of latency/jitter measurements, implemented by the transport.
pub trait RttProvider: Send + Sync {
    /// The latest smoothed estimate, or `None` before the first sample.
    fn estimate(&self) -> Option<RttEstimate>;
}

/// Provider for hosts without a measurement path; the monitor falls back
/// to [`RttEstimate::NEUTRAL`].
#[derive(Debug, Default)]
pub struct NeutralRtt;

impl RttProvider for NeutralRtt {
    fn estimate(&self) -> Option<RttEstimate> {
        None
    }
}

// ── EwmaRtt ──────────────────────────────────────────────────────

/// Smoothed RTT tracker fed from the transport's ack path.
///
/// Smoothing follows the classic srtt/rttvar discipline: α = 1/8 for the
/// mean, jitter tracked as the smoothed absolute deviation from the mean.
/// State lives in microsecond atomics so [`record`](Self::record) never
/// blocks or allocates. Single writer expected (the transport's ack task);
/// readers may observe the two fields from adjacent samples, which is
/// harmless for scoring.
#[derive(Debug, Default)]
pub struct EwmaRtt {
    /// Smoothed RTT in microseconds; 0 means no sample yet.
    srtt_us: AtomicU64,
    /// Smoothed deviation in microseconds.
    jitter_us: AtomicU64,
}

impl EwmaRtt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw RTT sample.
    pub fn record(&self, rtt: Duration) {
        let sample = (rtt.as_micros() as u64).max(1);
        let prev = self.srtt_us.load(Ordering::Relaxed);
        if prev == 0 {
            self.srtt_us.store(sample, Ordering::Relaxed);
            return;
        }

        // srtt = 7/8 · srtt + 1/8 · sample
        let srtt = prev - prev / 8 + sample / 8;
        let deviation = prev.abs_diff(sample);
        let jitter_prev = self.jitter_us.load(Ordering::Relaxed);
        let jitter = if jitter_prev == 0 {
            deviation
        } else {
            jitter_prev - jitter_prev / 8 + deviation / 8
        };

        self.srtt_us.store(srtt.max(1), Ordering::Relaxed);
        self.jitter_us.store(jitter, Ordering::Relaxed);
    }
}

impl RttProvider for EwmaRtt {
    fn estimate(&self) -> Option<RttEstimate> {
        let srtt = self.srtt_us.load(Ordering::Relaxed);
        if srtt == 0 {
            return None;
        }
        Some(RttEstimate {
            latency_ms: srtt as f64 / 1000.0,
            jitter_ms: self.jitter_us.load(Ordering::Relaxed) as f64 / 1000.0,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
