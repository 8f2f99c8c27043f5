use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// How a counter's time-to-live reacts to further increments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Every increment pushes expiry back to a full window, so a counter lives
    /// as long as reactions keep arriving less than one window apart.
    #[default]
    Sliding,
    /// Expiry is fixed when the counter is created.
    Fixed,
}

impl std::str::FromStr for ExpiryPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sliding" => Ok(Self::Sliding),
            "fixed" => Ok(Self::Fixed),
            other => Err(ConfigError::Validation(format!(
                "unsupported window policy `{other}` (expected sliding|fixed)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterWindow {
    pub ttl: Duration,
    pub policy: ExpiryPolicy,
}

impl CounterWindow {
    pub fn sliding(ttl: Duration) -> Self {
        Self { ttl, policy: ExpiryPolicy::Sliding }
    }

    pub fn fixed(ttl: Duration) -> Self {
        Self { ttl, policy: ExpiryPolicy::Fixed }
    }

    /// TTL rounded up to whole seconds, the granularity of the store.
    pub fn ttl_secs(&self) -> u64 {
        let secs = self.ttl.as_secs();
        if self.ttl.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

/// True only for the increment that lands exactly on the threshold.
///
/// Values past the threshold never re-trigger; a counter that expires and
/// starts again at 1 may trigger once more.
pub fn crosses_threshold(value: u64, threshold: u64) -> bool {
    value == threshold
}
