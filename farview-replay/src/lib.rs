//! # farview-replay — offline tuning harness
//!
//! Replays recorded (or synthesized) network traces through the full
//! quality-control pipeline with a synthetic clock and reports every
//! decision the pipeline makes. Because the pipeline is deterministic,
//! the same trace and config always produce the same decision rows —
//! which is what makes thresholds tunable offline.

pub mod config;
pub mod trace;
