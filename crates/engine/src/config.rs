//! Store configuration.
//!
//! Both structs deserialize with defaults for every omitted field so they can
//! be embedded in a larger agent configuration file.

use std::time::Duration;

use imagemeta_core::ModelUuid;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounds on the optimistic save loop.
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::default()
///     .with_max_attempts(10)
///     .with_deadline_ms(Some(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total read-decide-submit passes allowed per save, including the first.
    pub max_attempts: u32,
    /// Wall-clock budget for one save, checked before each attempt.
    pub deadline_ms: Option<u64>,
    /// Sleep before the first retry; doubles on each further retry.
    pub base_delay_ms: u64,
    /// Upper bound for the doubled delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            deadline_ms: None,
            base_delay_ms: 0,
            max_delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// One attempt; any conflict becomes [`crate::EngineError::RetryExhausted`].
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: Option<u64>) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Never less than one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Delay before retry number `retry` (0-based).
    pub(crate) fn delay_for(&self, retry: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        // Cap the shift to prevent overflow
        let shift = retry.min(63);
        let delay = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Everything a [`crate::MetadataStore`] needs besides its collection handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub model_uuid: ModelUuid,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl StoreConfig {
    pub fn new(model_uuid: ModelUuid) -> Self {
        Self {
            model_uuid,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
