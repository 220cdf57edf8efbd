//! Transport-facing packet accounting.
//!
//! The transport's send/receive/loss-detection paths call the `record_*`
//! methods once per wire chunk, so the recording path must stay cheap:
//! plain relaxed atomic increments, no locks, no allocation. The monitor
//! drains everything once per tick with a swap-to-zero, giving it the exact
//! interval totals without ever stalling the I/O tasks.

use std::sync::atomic::{AtomicU64, Ordering};

// ── PacketStatistics ─────────────────────────────────────────────

/// Thread-safe monotonic byte/packet counters shared with the transport.
#[derive(Debug, Default)]
pub struct PacketStatistics {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_lost: AtomicU64,
}

/// One tick's worth of drained counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
}

impl IntervalCounters {
    /// Bytes moved in either direction.
    pub fn total_bytes(&self) -> u64 {
        self.bytes_sent + self.bytes_received
    }

    /// Packets observed in either direction.
    pub fn total_packets(&self) -> u64 {
        self.packets_sent + self.packets_received
    }
}

impl PacketStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent packet of `bytes` payload bytes. O(1), never blocks.
    pub fn record_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received packet of `bytes` payload bytes. O(1), never blocks.
    pub fn record_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet the transport reported lost.
    pub fn record_lost(&self) {
        self.packets_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Merge a batch of counters in one call.
    ///
    /// Used by transports that report per-frame chunk totals instead of
    /// individual packets, and by the trace-replay tooling.
    pub fn accumulate(&self, delta: &IntervalCounters) {
        self.bytes_sent.fetch_add(delta.bytes_sent, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(delta.bytes_received, Ordering::Relaxed);
        self.packets_sent
            .fetch_add(delta.packets_sent, Ordering::Relaxed);
        self.packets_received
            .fetch_add(delta.packets_received, Ordering::Relaxed);
        self.packets_lost
            .fetch_add(delta.packets_lost, Ordering::Relaxed);
    }

    /// Drain all counters to zero, returning what accumulated since the
    /// previous drain.
    pub fn drain(&self) -> IntervalCounters {
        IntervalCounters {
            bytes_sent: self.bytes_sent.swap(0, Ordering::Relaxed),
            bytes_received: self.bytes_received.swap(0, Ordering::Relaxed),
            packets_sent: self.packets_sent.swap(0, Ordering::Relaxed),
            packets_received: self.packets_received.swap(0, Ordering::Relaxed),
            packets_lost: self.packets_lost.swap(0, Ordering::Relaxed),
        }
    }

    /// Zero all counters without reading them (session stop/start).
    pub fn reset(&self) {
        let _ = self.drain();
    }
}

// ── Tests ────────────────────────────────────────────────────────
