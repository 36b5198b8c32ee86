//! Channel configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [sandbox]
//! allow_same_origin = false
//!
//! [handshake]
//! target_origin = "*"
//!
//! [recovery]
//! enabled = true
//! window_ms = 5000
//! max_attempts = 3
//!
//! [guest]
//! initial_retry_ms = 1000
//! max_retry_ms = 10000
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Host and guest settings loaded from one TOML document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub guest: RetryPolicy,
}

/// Sandbox options for the rendered iframe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Development only: add `allow-same-origin` and accept the host origin
    /// during the handshake.
    #[serde(default)]
    pub allow_same_origin: bool,
}

/// Port hand-off options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Target origin of the `communication-port` post.
    #[serde(default = "default_target_origin")]
    pub target_origin: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            target_origin: default_target_origin(),
        }
    }
}

/// Re-handshake after the guest document reloads in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum time after a transfer before a new `ready` counts as a reload.
    #[serde(default = "default_recovery_window_ms")]
    pub window_ms: u64,
    /// Recoveries allowed per mount.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: default_recovery_window_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Backoff for the guest's `ready` announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_initial_retry_ms")]
    pub initial_retry_ms: u64,
    #[serde(default = "default_max_retry_ms")]
    pub max_retry_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_retry_ms: default_initial_retry_ms(),
            max_retry_ms: default_max_retry_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero based): doubles each time,
    /// capped at `max_retry_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.initial_retry_ms
            .saturating_mul(factor)
            .min(self.max_retry_ms)
    }

    /// Parse a retry policy from the `[guest]` table of a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(HostConfig::from_toml(text)?.guest)
    }
}

impl HostConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.handshake.target_origin.trim().is_empty() {
            return Err(Error::Config("handshake.target_origin is empty".to_string()));
        }
        if self.guest.initial_retry_ms == 0 {
            return Err(Error::Config("guest.initial_retry_ms must be positive".to_string()));
        }
        if self.guest.max_retry_ms < self.guest.initial_retry_ms {
            return Err(Error::Config(format!(
                "guest.max_retry_ms ({}) is below guest.initial_retry_ms ({})",
                self.guest.max_retry_ms, self.guest.initial_retry_ms
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_target_origin() -> String {
    exercise_protocol::wire::ANY_TARGET_ORIGIN.to_string()
}

fn default_recovery_window_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_retry_ms() -> u64 {
    1000
}

fn default_max_retry_ms() -> u64 {
    10_000
}
