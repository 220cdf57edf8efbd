//! Session orchestration: the periodic tick driver and publication layer.
//!
//! [`QualityService`] wires the monitor, controller, governor, and
//! projector together. A single tokio task owns all mutable decision
//! state; the rest of the system interacts through the atomic counters
//! (transport side) and channels (host side):
//!
//! - latest [`EncoderSettings`] and a per-tick [`QualityReport`] are
//!   published on `watch` channels, so readers never block the tick;
//! - discrete changes arrive as ordered [`QualityEvent`]s on an mpsc
//!   channel, exactly one per actual change.
//!
//! `start`/`stop` are idempotent and safe from any thread. A restart
//! begins a fresh session: counters, history, and the controller all
//! return to their initial state.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::{AdaptiveBitrateController, BitrateConfig};
use crate::error::QualityError;
use crate::governor::{AiQuota, ConnectionScenario, QualityProfile, UserTier, decide};
use crate::metrics::QualityLevel;
use crate::monitor::NetworkQualityMonitor;
use crate::projector::{EncoderSettings, project};
use crate::rtt::{NeutralRtt, RttProvider};
use crate::stats::PacketStatistics;

// ── Configuration ────────────────────────────────────────────────

/// Default evaluation cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Session policy inputs, read afresh on every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPolicy {
    pub scenario: ConnectionScenario,
    pub tier: UserTier,
    pub quota: AiQuota,
}

impl StreamPolicy {
    /// Run the governor for these inputs.
    pub fn decide(&self) -> QualityProfile {
        decide(self.scenario, self.tier, self.quota)
    }
}

impl Default for StreamPolicy {
    /// The most conservative assumption until entitlements are known.
    fn default() -> Self {
        Self {
            scenario: ConnectionScenario::RemoteRelay,
            tier: UserTier::Free,
            quota: AiQuota::Exhausted,
        }
    }
}

/// Configuration for [`QualityService`].
#[derive(Debug, Clone)]
pub struct QualityServiceConfig {
    /// Evaluation interval; 2 s unless a host overrides it.
    pub tick_interval: Duration,
    pub bitrate: BitrateConfig,
    pub policy: StreamPolicy,
}

impl Default for QualityServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            bitrate: BitrateConfig::default(),
            policy: StreamPolicy::default(),
        }
    }
}

// ── Events and reports ───────────────────────────────────────────

/// Host-facing change notifications: one per actual change, in decision
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityEvent {
    /// The controller moved to a new clamped bitrate.
    BitrateChanged(u64),
    /// The smoothed quality level transitioned.
    QualityChanged(QualityLevel),
}

/// Per-tick diagnostic snapshot for dashboards.
#[derive(Debug, Clone, Copy)]
pub struct QualityReport {
    pub smoothed_score: f64,
    pub level: QualityLevel,
    /// The controller's live bitrate before merging with governor caps.
    pub bitrate: u64,
    pub settings: EncoderSettings,
    pub bandwidth_bps: f64,
    pub latency_ms: f64,
    pub packet_loss: f64,
    pub jitter_ms: f64,
}

// ── QualityService ───────────────────────────────────────────────

/// Per-session quality control driver.
///
/// Construct one per stream session; there is no shared global instance.
pub struct QualityService {
    config: QualityServiceConfig,
    stats: Arc<PacketStatistics>,
    rtt: Arc<dyn RttProvider>,
    /// Validated prototype cloned into each session's tick task.
    controller_proto: AdaptiveBitrateController,
    policy_tx: watch::Sender<StreamPolicy>,
    policy_rx: watch::Receiver<StreamPolicy>,
    settings_tx: watch::Sender<EncoderSettings>,
    settings_rx: watch::Receiver<EncoderSettings>,
    report_tx: watch::Sender<QualityReport>,
    report_rx: watch::Receiver<QualityReport>,
    events_tx: mpsc::UnboundedSender<QualityEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<QualityEvent>>>,
    last_bitrate: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl QualityService {
    /// Create a service with no RTT measurement path (neutral defaults).
    pub fn new(config: QualityServiceConfig) -> Result<Self, QualityError> {
        Self::with_rtt(config, Arc::new(NeutralRtt))
    }

    /// Create a service with an explicit RTT collaborator.
    ///
    /// Fails on an invalid [`BitrateConfig`] so a misconfigured host never
    /// starts streaming.
    pub fn with_rtt(
        config: QualityServiceConfig,
        rtt: Arc<dyn RttProvider>,
    ) -> Result<Self, QualityError> {
        let controller_proto = AdaptiveBitrateController::new(config.bitrate)?;

        let profile = config.policy.decide();
        let initial = project(&profile, config.bitrate.initial_bitrate);
        let (policy_tx, policy_rx) = watch::channel(config.policy);
        let (settings_tx, settings_rx) = watch::channel(initial);
        let (report_tx, report_rx) = watch::channel(QualityReport {
            smoothed_score: 0.0,
            level: QualityLevel::Poor,
            bitrate: config.bitrate.initial_bitrate,
            settings: initial,
            bandwidth_bps: 0.0,
            latency_ms: 0.0,
            packet_loss: 0.0,
            jitter_ms: 0.0,
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            last_bitrate: Arc::new(AtomicU64::new(config.bitrate.initial_bitrate)),
            config,
            stats: Arc::new(PacketStatistics::new()),
            rtt,
            controller_proto,
            policy_tx,
            policy_rx,
            settings_tx,
            settings_rx,
            report_tx,
            report_rx,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            running: Arc::new(AtomicBool::new(false)),
            ticker: Mutex::new(None),
        })
    }

    /// Counters to hand to the transport's send/receive/loss paths.
    pub fn statistics(&self) -> Arc<PacketStatistics> {
        Arc::clone(&self.stats)
    }

    /// Take the change-event stream.
    ///
    /// Yields each change exactly once, in decision order. The stream can
    /// be taken once; later calls return `None`.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<QualityEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Watch channel carrying the latest recommended settings.
    pub fn settings_receiver(&self) -> watch::Receiver<EncoderSettings> {
        self.settings_rx.clone()
    }

    /// Watch channel carrying the per-tick diagnostic report.
    pub fn report_receiver(&self) -> watch::Receiver<QualityReport> {
        self.report_rx.clone()
    }

    /// Latest recommended encoder parameters.
    pub fn recommended_settings(&self) -> EncoderSettings {
        *self.settings_rx.borrow()
    }

    /// Current policy inputs.
    pub fn policy(&self) -> StreamPolicy {
        *self.policy_rx.borrow()
    }

    /// Last controller bitrate; retained across `stop` for diagnostics.
    pub fn last_bitrate(&self) -> u64 {
        self.last_bitrate.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Apply an entitlement change.
    ///
    /// The governor is re-invoked immediately and the projection
    /// republished without waiting for the next tick.
    pub fn update_policy(&self, policy: StreamPolicy) {
        let _ = self.policy_tx.send(policy);
        let profile = policy.decide();
        let settings = project(&profile, self.last_bitrate.load(Ordering::Relaxed));
        self.settings_tx.send_if_modified(|current| {
            if *current != settings {
                *current = settings;
                true
            } else {
                false
            }
        });
        info!(?policy, "stream policy updated");
    }

    /// Begin a monitoring session. No-op while already running.
    ///
    /// Counters and history start from scratch and the controller is
    /// reseeded at `initial_bitrate`; nothing leaks from a previous
    /// session.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stats.reset();
        self.last_bitrate
            .store(self.config.bitrate.initial_bitrate, Ordering::Relaxed);

        let mut monitor = NetworkQualityMonitor::new(Arc::clone(&self.stats), Arc::clone(&self.rtt));
        let mut controller = self.controller_proto.clone();
        controller.reset();

        let running = Arc::clone(&self.running);
        let last_bitrate = Arc::clone(&self.last_bitrate);
        let policy_rx = self.policy_rx.clone();
        let settings_tx = self.settings_tx.clone();
        let report_tx = self.report_tx.clone();
        let events_tx = self.events_tx.clone();
        let tick_interval = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            monitor.prime(Instant::now());

            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The interval fires immediately; the first evaluation happens
            // one full period into the session.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let reading = monitor.tick(Instant::now());
                let bitrate_change = controller.observe(reading.smoothed_score);
                if let Some(new_bitrate) = bitrate_change {
                    last_bitrate.store(new_bitrate, Ordering::Relaxed);
                }

                let profile = policy_rx.borrow().decide();
                let settings = project(&profile, controller.current_bitrate());

                // Publish before notifying, so an event consumer that reads
                // the watch channel sees settings at least as new as the
                // event that woke it.
                settings_tx.send_if_modified(|current| {
                    if *current != settings {
                        *current = settings;
                        true
                    } else {
                        false
                    }
                });
                let _ = report_tx.send(QualityReport {
                    smoothed_score: reading.smoothed_score,
                    level: reading.level,
                    bitrate: controller.current_bitrate(),
                    settings,
                    bandwidth_bps: reading.metrics.bandwidth_bps,
                    latency_ms: reading.metrics.latency_ms,
                    packet_loss: reading.metrics.packet_loss,
                    jitter_ms: reading.metrics.jitter_ms,
                });

                if running.load(Ordering::SeqCst) {
                    if let Some(new_bitrate) = bitrate_change {
                        let _ = events_tx.send(QualityEvent::BitrateChanged(new_bitrate));
                    }
                    if reading.level_changed {
                        let _ = events_tx.send(QualityEvent::QualityChanged(reading.level));
                    }
                }

                debug!(
                    score = reading.smoothed_score,
                    level = %reading.level,
                    bitrate = controller.current_bitrate(),
                    "quality tick"
                );
            }
        });

        *self.ticker.lock().unwrap() = Some(handle);
        info!(interval = ?self.config.tick_interval, "quality session started");
    }

    /// End the session. No-op while already stopped.
    ///
    /// The ticker is cancelled before counters are cleared, so no event
    /// for a tick that begins after this call can be observed. Safe to
    /// call from any thread, including an event consumer.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.ticker.lock().unwrap().take() {
            handle.abort();
        }
        self.stats.reset();
        info!("quality session stopped");
    }
}

impl Drop for QualityService {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(20);

    fn fast_config() -> QualityServiceConfig {
        QualityServiceConfig {
            tick_interval: TICK,
            bitrate: BitrateConfig {
                min_bitrate: 2_000_000,
                max_bitrate: 50_000_000,
                initial_bitrate: 10_000_000,
                step_size: 2_000_000,
                quality_threshold: 0.6,
            },
            policy: StreamPolicy {
                scenario: ConnectionScenario::LocalNearField,
                tier: UserTier::Vip,
                quota: AiQuota::Sufficient,
            },
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<QualityEvent>) -> QualityEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[test]
    fn invalid_config_prevents_construction() {
        let mut cfg = fast_config();
        cfg.bitrate.step_size = 0;
        assert!(QualityService::new(cfg).is_err());
    }

    #[test]
    fn initial_settings_project_the_initial_bitrate() {
        let svc = QualityService::new(fast_config()).unwrap();
        let s = svc.recommended_settings();
        // 10 Mbit/s → 1080p60 row under the local profile.
        assert_eq!((s.width, s.height, s.fps), (1920, 1080, 60));
        assert_eq!(s.bitrate, 10_000_000);
    }

    #[tokio::test]
    async fn quality_level_published_once_per_transition() {
        let svc = QualityService::new(fast_config()).unwrap();
        let mut events = svc.events().unwrap();
        svc.start();

        // Idle link with neutral RTT scores 0.7 → Good, published once.
        assert_eq!(
            next_event(&mut events).await,
            QualityEvent::QualityChanged(QualityLevel::Good)
        );

        // A few more idle ticks must not re-publish Good.
        tokio::time::sleep(TICK * 4).await;
        svc.stop();
        while let Ok(ev) = events.try_recv() {
            assert!(
                !matches!(ev, QualityEvent::QualityChanged(QualityLevel::Good)),
                "duplicate level publication: {ev:?}"
            );
        }
    }

    #[tokio::test]
    async fn saturating_traffic_steps_bitrate_up() {
        let svc = QualityService::new(fast_config()).unwrap();
        let stats = svc.statistics();
        let mut events = svc.events().unwrap();
        svc.start();

        // Keep the pipe saturated well past 12.5 MB/s per interval.
        let feeder = tokio::spawn({
            let stats = Arc::clone(&stats);
            async move {
                loop {
                    stats.accumulate(&crate::stats::IntervalCounters {
                        bytes_sent: 2_000_000,
                        bytes_received: 0,
                        packets_sent: 100,
                        packets_received: 0,
                        packets_lost: 0,
                    });
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }
        });

        // The smoothed score crosses 0.8 within a few ticks and the
        // controller probes upward one step at a time.
        let mut first_bitrate = None;
        for _ in 0..8 {
            if let QualityEvent::BitrateChanged(b) = next_event(&mut events).await {
                first_bitrate = Some(b);
                break;
            }
        }
        assert_eq!(first_bitrate, Some(12_000_000));

        feeder.abort();
        svc.stop();
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let svc = QualityService::new(fast_config()).unwrap();
        svc.start();
        svc.start();
        assert!(svc.is_running());

        svc.stop();
        svc.stop();
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn restart_reseeds_the_session() {
        let svc = QualityService::new(fast_config()).unwrap();
        let stats = svc.statistics();
        let mut events = svc.events().unwrap();
        svc.start();

        // Saturate the link until the bitrate moves off its seed.
        let feeder = tokio::spawn({
            let stats = Arc::clone(&stats);
            async move {
                loop {
                    for _ in 0..10 {
                        stats.record_sent(200_000);
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }
        });
        let mut moved_event = None;
        for _ in 0..8 {
            if let QualityEvent::BitrateChanged(b) = next_event(&mut events).await {
                moved_event = Some(b);
                break;
            }
        }
        assert!(moved_event.is_some(), "bitrate never moved");
        feeder.abort();
        svc.stop();
        assert!(svc.last_bitrate() > 10_000_000);

        // Drain anything from the first session.
        while events.try_recv().is_ok() {}

        svc.start();
        assert_eq!(svc.last_bitrate(), 10_000_000);
        svc.stop();
    }

    #[tokio::test]
    async fn policy_update_applies_without_waiting_for_a_tick() {
        let svc = QualityService::new(fast_config()).unwrap();
        assert_eq!(svc.recommended_settings().width, 1920);

        svc.update_policy(StreamPolicy {
            scenario: ConnectionScenario::RemoteRelay,
            tier: UserTier::Free,
            quota: AiQuota::Sufficient,
        });

        let s = svc.recommended_settings();
        // Free tier: 2 Mbit/s cap → floor row, scaled to 0.5.
        assert_eq!(s.bitrate, 2_000_000);
        assert_eq!((s.width, s.height, s.fps), (640, 360, 30));
    }

    #[tokio::test]
    async fn stop_silences_the_event_stream() {
        let svc = QualityService::new(fast_config()).unwrap();
        let mut events = svc.events().unwrap();
        svc.start();
        let _ = next_event(&mut events).await; // initial level
        svc.stop();

        // Drain whatever was in flight, then confirm silence.
        while events.try_recv().is_ok() {}
        tokio::time::sleep(TICK * 5).await;
        assert!(events.try_recv().is_err());
    }
}
