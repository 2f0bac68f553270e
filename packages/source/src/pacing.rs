//! Delay policy between page requests.
//!
//! The remote API throttles aggressive clients, so consecutive page
//! requests are spaced out. The spacing is described by a
//! [`PacingPolicy`] and carried out by a [`Pacer`], which lets tests swap
//! the real sleep for a recording double.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How long to wait before each page request after the first of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PacingPolicy {
    /// No delay at all.
    None,
    /// The same delay before every follow-up request.
    Fixed {
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// A delay that grows by `step_ms` with every page of the same day,
    /// capped at `max_ms`.
    Escalating {
        /// Delay before the second page, in milliseconds.
        initial_ms: u64,
        /// Added per additional page, in milliseconds.
        step_ms: u64,
        /// Upper bound, in milliseconds.
        max_ms: u64,
    },
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::Fixed { delay_ms: 1_000 }
    }
}

impl PacingPolicy {
    /// Returns the pause owed before the next request, given how many
    /// pages of the current day were already requested.
    ///
    /// The first request of a day never waits.
    #[must_use]
    pub fn delay_before(&self, pages_requested: u64) -> Option<Duration> {
        if pages_requested == 0 {
            return None;
        }

        let ms = match *self {
            Self::None => 0,
            Self::Fixed { delay_ms } => delay_ms,
            Self::Escalating {
                initial_ms,
                step_ms,
                max_ms,
            } => initial_ms
                .saturating_add(step_ms.saturating_mul(pages_requested - 1))
                .min(max_ms),
        };

        (ms > 0).then(|| Duration::from_millis(ms))
    }
}

/// Carries out a pause.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Waits for `delay`.
    async fn pause(&self, delay: Duration);
}

/// A [`Pacer`] backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        log::trace!("pacing: sleeping {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_never_waits() {
        assert_eq!(PacingPolicy::default().delay_before(0), None);
    }

    #[test]
    fn fixed_policy_waits_the_same_amount() {
        let policy = PacingPolicy::Fixed { delay_ms: 250 };
        assert_eq!(policy.delay_before(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_before(9), Some(Duration::from_millis(250)));
    }

    #[test]
    fn zero_delay_is_no_pause() {
        assert_eq!(PacingPolicy::None.delay_before(3), None);
        assert_eq!(PacingPolicy::Fixed { delay_ms: 0 }.delay_before(3), None);
    }

    #[test]
    fn escalating_policy_is_capped() {
        let policy = PacingPolicy::Escalating {
            initial_ms: 500,
            step_ms: 250,
            max_ms: 1_000,
        };
        assert_eq!(policy.delay_before(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(750)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_millis(1_000)));
        assert_eq!(policy.delay_before(40), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn deserializes_from_toml_style_tags() {
        let policy: PacingPolicy =
            serde_json::from_value(serde_json::json!({"type": "fixed", "delay_ms": 2000}))
                .unwrap();
        assert_eq!(policy, PacingPolicy::Fixed { delay_ms: 2_000 });
    }
}
