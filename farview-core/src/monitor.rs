//! Periodic link-quality evaluation.
//!
//! Each tick the monitor drains the packet counters, derives a
//! [`NetworkQualityMetrics`] snapshot for the interval, pushes the
//! composite score into the smoothing history, and classifies the smoothed
//! result. A level transition is reported only when the *smoothed* level
//! differs from the previously published one — a single noisy sample can
//! never flip the published level.
//!
//! The monitor itself is clockless: [`tick`](NetworkQualityMonitor::tick)
//! takes the evaluation instant explicitly, and the periodic driver lives
//! in [`QualityService`](crate::service::QualityService). Tests and the
//! replay harness call `tick` with synthetic clocks.

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{NetworkQualityMetrics, QualityLevel, ScoreHistory};
use crate::rtt::{RttEstimate, RttProvider};
use crate::stats::PacketStatistics;

// ── TickReading ──────────────────────────────────────────────────

/// Outcome of a single monitor tick.
#[derive(Debug, Clone, Copy)]
pub struct TickReading {
    /// Raw snapshot for this interval.
    pub metrics: NetworkQualityMetrics,
    /// Mean of the smoothing window after this tick's score was pushed.
    pub smoothed_score: f64,
    /// Level derived from the smoothed score.
    pub level: QualityLevel,
    /// Set when `level` differs from the previously published level
    /// (including the very first publication of a session).
    pub level_changed: bool,
}

// ── NetworkQualityMonitor ────────────────────────────────────────

/// Derives smoothed quality readings from the shared packet counters.
///
/// Owned exclusively by the tick driver; only the counters inside
/// [`PacketStatistics`] are shared with other threads.
pub struct NetworkQualityMonitor {
    stats: Arc<PacketStatistics>,
    rtt: Arc<dyn RttProvider>,
    history: ScoreHistory,
    published_level: Option<QualityLevel>,
    last_update: Option<Instant>,
}

impl NetworkQualityMonitor {
    pub fn new(stats: Arc<PacketStatistics>, rtt: Arc<dyn RttProvider>) -> Self {
        Self {
            stats,
            rtt,
            history: ScoreHistory::new(),
            published_level: None,
            last_update: None,
        }
    }

    /// Counters shared with the transport.
    pub fn statistics(&self) -> &Arc<PacketStatistics> {
        &self.stats
    }

    /// The last level this monitor published, if any.
    pub fn published_level(&self) -> Option<QualityLevel> {
        self.published_level
    }

    /// Return to the session-start state: empty history, no published
    /// level, counters cleared.
    pub fn reset(&mut self) {
        self.stats.reset();
        self.history.clear();
        self.published_level = None;
        self.last_update = None;
    }

    /// Anchor the interval origin at session start, so the first tick
    /// measures a real interval instead of reporting "no data yet".
    pub fn prime(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    /// Evaluate the interval ending at `now`.
    pub fn tick(&mut self, now: Instant) -> TickReading {
        let counters = self.stats.drain();
        let elapsed = self
            .last_update
            .map(|prev| now.saturating_duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        self.last_update = Some(now);

        // elapsed == 0 means "no data yet", not an error.
        let bandwidth_bps = if elapsed > 0.0 {
            counters.total_bytes() as f64 / elapsed
        } else {
            0.0
        };
        let packet_loss = if counters.total_packets() > 0 {
            counters.packets_lost as f64 / counters.total_packets() as f64
        } else {
            0.0
        };
        let RttEstimate {
            latency_ms,
            jitter_ms,
        } = self.rtt.estimate().unwrap_or(RttEstimate::NEUTRAL);

        let metrics = NetworkQualityMetrics {
            bandwidth_bps,
            latency_ms,
            packet_loss,
            jitter_ms,
            timestamp: now,
        };

        self.history.push(metrics.quality_score());
        let smoothed_score = self.history.smoothed();
        let level = QualityLevel::from_score(smoothed_score);
        let level_changed = self.published_level != Some(level);
        self.published_level = Some(level);

        TickReading {
            metrics,
            smoothed_score,
            level,
            level_changed,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtt::NeutralRtt;
    use std::time::Duration;

    /// Fixed-estimate provider for deterministic scoring.
    struct FixedRtt(RttEstimate);

    impl RttProvider for FixedRtt {
        fn estimate(&self) -> Option<RttEstimate> {
            Some(self.0)
        }
    }

    fn monitor() -> NetworkQualityMonitor {
        NetworkQualityMonitor::new(Arc::new(PacketStatistics::new()), Arc::new(NeutralRtt))
    }

    #[test]
    fn first_tick_has_zero_bandwidth() {
        let mut mon = monitor();
        mon.statistics().record_sent(1_000_000);

        // No previous tick → elapsed 0 → bandwidth 0, no division by zero.
        let reading = mon.tick(Instant::now());
        assert_eq!(reading.metrics.bandwidth_bps, 0.0);
        assert!(reading.metrics.bandwidth_bps.is_finite());
    }

    #[test]
    fn bandwidth_derives_from_interval_bytes() {
        let mut mon = monitor();
        let t0 = Instant::now();
        mon.tick(t0);

        mon.statistics().record_sent(1_500_000);
        mon.statistics().record_received(500_000);
        let reading = mon.tick(t0 + Duration::from_secs(2));
        assert_eq!(reading.metrics.bandwidth_bps, 1_000_000.0);
    }

    #[test]
    fn primed_monitor_measures_the_first_interval() {
        let mut mon = monitor();
        let t0 = Instant::now();
        mon.prime(t0);

        mon.statistics().record_sent(2_000_000);
        let reading = mon.tick(t0 + Duration::from_secs(2));
        assert_eq!(reading.metrics.bandwidth_bps, 1_000_000.0);
        // Priming is not an evaluation: this was the first publication.
        assert!(reading.level_changed);
    }

    #[test]
    fn unmeasured_rtt_scores_neutral() {
        let mut mon = monitor();
        let reading = mon.tick(Instant::now());
        assert_eq!(reading.metrics.latency_ms, 50.0);
        assert_eq!(reading.metrics.jitter_ms, 10.0);
    }

    #[test]
    fn loss_ratio_over_interval_packets() {
        let mut mon = monitor();
        let t0 = Instant::now();
        mon.tick(t0);

        for _ in 0..9 {
            mon.statistics().record_sent(100);
        }
        mon.statistics().record_received(100);
        mon.statistics().record_lost();
        let reading = mon.tick(t0 + Duration::from_secs(2));
        assert_eq!(reading.metrics.packet_loss, 0.1);
    }

    #[test]
    fn no_packets_means_zero_loss() {
        let mut mon = monitor();
        let t0 = Instant::now();
        mon.tick(t0);
        let reading = mon.tick(t0 + Duration::from_secs(2));
        assert_eq!(reading.metrics.packet_loss, 0.0);
    }

    #[test]
    fn first_publication_counts_as_change() {
        let mut mon = monitor();
        let reading = mon.tick(Instant::now());
        assert!(reading.level_changed);
        assert_eq!(mon.published_level(), Some(reading.level));
    }

    #[test]
    fn single_bad_sample_does_not_flip_level() {
        // Perfect link on a fast RTT…
        let stats = Arc::new(PacketStatistics::new());
        let mut mon = NetworkQualityMonitor::new(
            Arc::clone(&stats),
            Arc::new(FixedRtt(RttEstimate {
                latency_ms: 20.0,
                jitter_ms: 5.0,
            })),
        );

        let t0 = Instant::now();
        mon.tick(t0);
        for i in 1..=9u64 {
            stats.record_sent(25_000_000); // 12.5 MB/s over 2 s
            let reading = mon.tick(t0 + Duration::from_secs(2 * i));
            assert_eq!(reading.level, QualityLevel::Excellent);
        }

        // …then one interval with nothing sent at all.
        let reading = mon.tick(t0 + Duration::from_secs(20));
        assert!(reading.smoothed_score < 1.0);
        assert_eq!(reading.level, QualityLevel::Excellent);
        assert!(!reading.level_changed);
    }

    #[test]
    fn sustained_degradation_transitions_once() {
        let stats = Arc::new(PacketStatistics::new());
        let mut mon = NetworkQualityMonitor::new(Arc::clone(&stats), Arc::new(NeutralRtt));

        let t0 = Instant::now();
        let mut transitions = 0;
        for i in 0..30u64 {
            // Half the traffic is lost from tick 10 onward.
            if i >= 10 {
                for _ in 0..10 {
                    stats.record_sent(100);
                    stats.record_lost();
                }
            } else {
                for _ in 0..10 {
                    stats.record_sent(100);
                }
            }
            let reading = mon.tick(t0 + Duration::from_secs(2 * i));
            if reading.level_changed {
                transitions += 1;
            }
        }

        // Initial publication plus exactly one downgrade.
        assert_eq!(transitions, 2);
    }

    #[test]
    fn reset_clears_session_state() {
        let mut mon = monitor();
        mon.statistics().record_sent(1000);
        mon.tick(Instant::now());
        assert!(mon.published_level().is_some());

        mon.reset();
        assert_eq!(mon.published_level(), None);
        assert_eq!(mon.statistics().drain().total_packets(), 0);
    }
}
