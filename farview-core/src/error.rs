//! Error types for the quality-control subsystem.
//!
//! Normal operation never surfaces an error: missing measurements fall back
//! to neutral defaults and the tick loop absorbs anything unexpected rather
//! than interrupting an active stream. The only fallible surface is
//! configuration, which must be rejected before a session starts.

use thiserror::Error;

/// The canonical error type for the farview quality subsystem.
#[derive(Debug, Error)]
pub enum QualityError {
    /// A [`BitrateConfig`](crate::controller::BitrateConfig) violated its
    /// construction invariant. Detected before the session starts; never a
    /// runtime condition.
    #[error("invalid bitrate config: {0}")]
    InvalidBitrateConfig(&'static str),
}
