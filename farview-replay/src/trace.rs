//! Recorded network traces and the offline replay driver.
//!
//! A trace is a JSON array of per-tick samples captured from a live
//! session (or synthesized with [`synthetic_trace`]). Replaying drives the
//! monitor → controller → governor → projector pipeline with a synthetic
//! clock, producing one [`ReplayRow`] per sample. Replays are fully
//! deterministic: the same trace and config always yield the same rows.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use farview_core::{
    AdaptiveBitrateController, EncoderSettings, IntervalCounters, NetworkQualityMonitor,
    PacketStatistics, QualityError, QualityLevel, RttEstimate, RttProvider, StreamPolicy, project,
};
use serde::{Deserialize, Serialize};

use crate::config::ReplayConfig;

// ── Trace model ──────────────────────────────────────────────────

/// One evaluation interval's worth of recorded transport activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSample {
    /// Interval length in seconds.
    pub interval_secs: f64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    /// Measured latency for this interval, if the capture had one.
    pub latency_ms: Option<f64>,
    /// Measured jitter for this interval, if the capture had one.
    pub jitter_ms: Option<f64>,
    /// Entitlement change taking effect at this sample, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub policy_change: Option<PolicyChange>,
}

/// An entitlement change embedded in a trace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyChange {
    pub scenario: farview_core::ConnectionScenario,
    pub tier: farview_core::UserTier,
    pub quota: farview_core::AiQuota,
}

impl From<PolicyChange> for StreamPolicy {
    fn from(c: PolicyChange) -> Self {
        StreamPolicy {
            scenario: c.scenario,
            tier: c.tier,
            quota: c.quota,
        }
    }
}

/// Load a trace from a JSON file.
pub fn load_trace(path: &Path) -> Result<Vec<TraceSample>, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    let samples = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(samples)
}

/// Synthesize a degrade-and-recover trace: `ticks` healthy intervals,
/// `ticks` of heavy loss and latency, then `ticks` healthy again.
pub fn synthetic_trace(ticks: usize) -> Vec<TraceSample> {
    let healthy = TraceSample {
        interval_secs: 2.0,
        bytes_sent: 24_000_000,
        bytes_received: 1_000_000,
        packets_sent: 17_000,
        packets_received: 700,
        packets_lost: 0,
        latency_ms: Some(35.0),
        jitter_ms: Some(8.0),
        policy_change: None,
    };
    let congested = TraceSample {
        interval_secs: 2.0,
        bytes_sent: 1_200_000,
        bytes_received: 50_000,
        packets_sent: 900,
        packets_received: 40,
        packets_lost: 90,
        latency_ms: Some(240.0),
        jitter_ms: Some(45.0),
        policy_change: None,
    };

    let mut samples = Vec::with_capacity(ticks * 3);
    samples.extend(std::iter::repeat_n(healthy.clone(), ticks));
    samples.extend(std::iter::repeat_n(congested, ticks));
    samples.extend(std::iter::repeat_n(healthy, ticks));
    samples
}

// ── Replay driver ────────────────────────────────────────────────

/// One pipeline decision per trace sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplayRow {
    pub tick: usize,
    pub quality_score: f64,
    pub smoothed_score: f64,
    pub level: QualityLevel,
    pub bitrate: u64,
    pub settings: EncoderSettings,
    /// Set on ticks where the controller actually moved.
    pub bitrate_changed: bool,
    /// Set on ticks where the smoothed level transitioned.
    pub level_changed: bool,
}

/// RTT source scripted from trace samples.
struct ScriptedRtt {
    latest: Mutex<Option<RttEstimate>>,
}

impl ScriptedRtt {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(None),
        })
    }

    fn set(&self, latency_ms: Option<f64>, jitter_ms: Option<f64>) {
        let mut latest = self.latest.lock().unwrap();
        *latest = match (latency_ms, jitter_ms) {
            (None, None) => None,
            (lat, jit) => Some(RttEstimate {
                latency_ms: lat.unwrap_or(farview_core::metrics::NEUTRAL_LATENCY_MS),
                jitter_ms: jit.unwrap_or(farview_core::metrics::NEUTRAL_JITTER_MS),
            }),
        };
    }
}

impl RttProvider for ScriptedRtt {
    fn estimate(&self) -> Option<RttEstimate> {
        *self.latest.lock().unwrap()
    }
}

/// Run a trace through the full decision pipeline.
pub fn replay(config: &ReplayConfig, samples: &[TraceSample]) -> Result<Vec<ReplayRow>, QualityError> {
    let stats = Arc::new(PacketStatistics::new());
    let rtt = ScriptedRtt::new();
    let rtt_dyn: Arc<dyn RttProvider> = rtt.clone();
    let mut monitor = NetworkQualityMonitor::new(Arc::clone(&stats), rtt_dyn);
    let mut controller = AdaptiveBitrateController::new(config.bitrate)?;
    let mut policy = StreamPolicy::from(&config.policy);

    let t0 = Instant::now();
    let mut clock = t0;
    // Anchor the interval origin, mirroring session start.
    monitor.prime(t0);

    let mut rows = Vec::with_capacity(samples.len());
    for (tick, sample) in samples.iter().enumerate() {
        if let Some(change) = sample.policy_change {
            policy = change.into();
        }

        stats.accumulate(&IntervalCounters {
            bytes_sent: sample.bytes_sent,
            bytes_received: sample.bytes_received,
            packets_sent: sample.packets_sent,
            packets_received: sample.packets_received,
            packets_lost: sample.packets_lost,
        });
        rtt.set(sample.latency_ms, sample.jitter_ms);
        clock += Duration::from_secs_f64(sample.interval_secs.max(0.0));

        let reading = monitor.tick(clock);
        let bitrate_changed = controller.observe(reading.smoothed_score).is_some();
        let settings = project(&policy.decide(), controller.current_bitrate());

        rows.push(ReplayRow {
            tick,
            quality_score: reading.metrics.quality_score(),
            smoothed_score: reading.smoothed_score,
            level: reading.level,
            bitrate: controller.current_bitrate(),
            settings,
            bitrate_changed,
            level_changed: reading.level_changed,
        });
    }
    Ok(rows)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_trace_has_three_phases() {
        let samples = synthetic_trace(5);
        assert_eq!(samples.len(), 15);
        assert_eq!(samples[0].packets_lost, 0);
        assert_eq!(samples[7].packets_lost, 90);
        assert_eq!(samples[14].packets_lost, 0);
    }

    #[test]
    fn trace_roundtrips_through_json() {
        let samples = synthetic_trace(2);
        let text = serde_json::to_string(&samples).unwrap();
        let parsed: Vec<TraceSample> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), samples.len());
        assert_eq!(parsed[0].bytes_sent, samples[0].bytes_sent);
        assert!(parsed[0].policy_change.is_none());
    }

    #[test]
    fn replay_is_deterministic() {
        let config = ReplayConfig::default();
        let samples = synthetic_trace(8);
        let first = replay(&config, &samples).unwrap();
        let second = replay(&config, &samples).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn replay_reacts_to_congestion() {
        let config = ReplayConfig::default();
        let samples = synthetic_trace(10);
        let rows = replay(&config, &samples).unwrap();

        let peak = rows[..10].iter().map(|r| r.bitrate).max().unwrap();
        let trough = rows[10..20].iter().map(|r| r.bitrate).min().unwrap();
        assert!(peak > trough, "peak {peak} not above trough {trough}");

        // Bitrate always inside the configured bounds.
        for row in &rows {
            assert!(row.bitrate >= config.bitrate.min_bitrate);
            assert!(row.bitrate <= config.bitrate.max_bitrate);
        }
    }

    #[test]
    fn policy_change_mid_trace_tightens_the_cap() {
        let config = ReplayConfig::default();
        let mut samples = synthetic_trace(6);
        samples[3].policy_change = Some(PolicyChange {
            scenario: farview_core::ConnectionScenario::RemoteRelay,
            tier: farview_core::UserTier::Free,
            quota: farview_core::AiQuota::Exhausted,
        });

        let rows = replay(&config, &samples).unwrap();
        // From the change onward the projected bitrate obeys the free cap.
        for row in &rows[3..] {
            assert!(row.settings.bitrate <= 2_000_000, "{row:?}");
        }
    }
}
