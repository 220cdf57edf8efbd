//! Replay harness configuration.

use std::path::Path;

use farview_core::{AiQuota, BitrateConfig, ConnectionScenario, StreamPolicy, UserTier};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the replay harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Session entitlements at replay start.
    pub policy: PolicyConfig,
    /// Controller bounds.
    pub bitrate: BitrateConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Session entitlements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub scenario: ConnectionScenario,
    pub tier: UserTier,
    pub quota: AiQuota,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            bitrate: BitrateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            scenario: ConnectionScenario::RemoteP2p,
            tier: UserTier::Pro,
            quota: AiQuota::Sufficient,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl From<&PolicyConfig> for StreamPolicy {
    fn from(cfg: &PolicyConfig) -> Self {
        StreamPolicy {
            scenario: cfg.scenario,
            tier: cfg.tier,
            quota: cfg.quota,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ReplayConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ReplayConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("scenario"));
        assert!(text.contains("min_bitrate"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ReplayConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ReplayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.policy.tier, UserTier::Pro);
        assert_eq!(parsed.bitrate.initial_bitrate, 10_000_000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: ReplayConfig = toml::from_str("[policy]\ntier = \"vip\"\n").unwrap();
        assert_eq!(parsed.policy.tier, UserTier::Vip);
        assert_eq!(parsed.policy.scenario, ConnectionScenario::RemoteP2p);
        assert_eq!(parsed.logging.level, "info");
    }
}
