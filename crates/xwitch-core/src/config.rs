//! Configuration system for xwitch units.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $XWITCH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/xwitch/config.toml
//!   3. ~/.config/xwitch/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{BAUD_RATE, BROADCAST_TIMEOUT_MS, END_CHAIN_TIMEOUT_MS};

/// Top-level unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub link: LinkConfig,
    pub timing: TimingConfig,
    pub queues: QueueConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device facing the host or the previous unit.
    pub upstream_device: String,
    /// Serial device facing the next unit.
    pub downstream_device: String,
    /// Link speed, both directions.
    pub baud: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Per-hop wait for a discovery ack or an addressed reply.
    pub end_chain_timeout_ms: u64,
    /// Whole-chain wait for the scan return at the root.
    pub broadcast_timeout_ms: u64,
    /// Dispatcher and deadline-poll cadence.
    pub poll_interval_ms: u64,
    /// Upper bound on bytes pulled from a serial port per poll.
    pub read_chunk: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity of each per-direction raw frame queue. Overflow drops
    /// the oldest entry.
    pub raw_capacity: usize,
    /// Capacity of the decoded-message queue serving foreground callers.
    pub decoded_capacity: usize,
    /// How many switch actuations the audit trail retains.
    pub audit_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// What a scan reports when no downstream peer ever acks.
    pub lone_root: LoneRootPolicy,
}

/// Historical firmware revisions disagreed on what a root with nothing
/// attached should report: some counted themselves (chain length 1),
/// some reported the undiscovered sentinel (-1). "Nothing attached" and
/// "broken link" are indistinguishable on the wire, so the choice stays
/// a deployment decision rather than being unified here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoneRootPolicy {
    /// The root counts itself: a silent downstream means chain length 1.
    SoleUnit,
    /// A silent downstream leaves the chain undiscovered: report -1.
    Undiscovered,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            timing: TimingConfig::default(),
            queues: QueueConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            upstream_device: "/dev/ttyACM0".to_string(),
            downstream_device: "/dev/ttyACM1".to_string(),
            baud: BAUD_RATE,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            end_chain_timeout_ms: END_CHAIN_TIMEOUT_MS,
            broadcast_timeout_ms: BROADCAST_TIMEOUT_MS,
            poll_interval_ms: 5,
            read_chunk: 32,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            raw_capacity: 16,
            decoded_capacity: 16,
            audit_capacity: 32,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lone_root: LoneRootPolicy::SoleUnit,
        }
    }
}

impl TimingConfig {
    pub fn end_chain_timeout(&self) -> Duration {
        Duration::from_millis(self.end_chain_timeout_ms)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("xwitch")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl UnitConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            UnitConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("XWITCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&UnitConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply XWITCH_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("XWITCH_LINK__UPSTREAM_DEVICE") {
            self.link.upstream_device = v;
        }
        if let Ok(v) = std::env::var("XWITCH_LINK__DOWNSTREAM_DEVICE") {
            self.link.downstream_device = v;
        }
        if let Ok(v) = std::env::var("XWITCH_LINK__BAUD") {
            if let Ok(b) = v.parse() {
                self.link.baud = b;
            }
        }
        if let Ok(v) = std::env::var("XWITCH_TIMING__END_CHAIN_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.timing.end_chain_timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("XWITCH_TIMING__BROADCAST_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.timing.broadcast_timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("XWITCH_DISCOVERY__LONE_ROOT") {
            match v.as_str() {
                "sole-unit" => self.discovery.lone_root = LoneRootPolicy::SoleUnit,
                "undiscovered" => self.discovery.lone_root = LoneRootPolicy::Undiscovered,
                _ => {}
            }
        }
    }
}
