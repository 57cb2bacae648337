//! Wall-clock timing constants for page automation
//!
//! All values are fixed per call site; they can be overridden as a group by
//! loading a [`Timings`] from JSON (millisecond fields).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serde helper storing a [`Duration`] as whole milliseconds
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Timing policy shared by the sequencer, pipeline and transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timings {
    /// Settle time after a navigation-like change (e.g. selecting a job card)
    #[serde(rename = "pageLoadSettleMs", with = "millis")]
    pub page_load_settle: Duration,

    /// Delay between locate attempts
    #[serde(rename = "elementWaitMs", with = "millis")]
    pub element_wait: Duration,

    /// Settle time after a click before the next interaction
    #[serde(rename = "clickDelayMs", with = "millis")]
    pub click_delay: Duration,

    /// Locate attempts per step
    pub max_retries: u32,

    /// Lifetime of a single-shot mutation watcher
    #[serde(rename = "watcherFallbackMs", with = "millis")]
    pub watcher_fallback: Duration,

    /// Round-trip budget for ordinary messages
    #[serde(rename = "messageTimeoutMs", with = "millis")]
    pub message_timeout: Duration,

    /// Round-trip budget for a single-job apply
    #[serde(rename = "applyTimeoutMs", with = "millis")]
    pub apply_timeout: Duration,

    /// Round-trip budget for applying to every visible job
    #[serde(rename = "bulkApplyTimeoutMs", with = "millis")]
    pub bulk_apply_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            page_load_settle: Duration::from_millis(3000),
            element_wait: Duration::from_millis(2000),
            click_delay: Duration::from_millis(1500),
            max_retries: 3,
            watcher_fallback: Duration::from_millis(10_000),
            message_timeout: Duration::from_millis(10_000),
            apply_timeout: Duration::from_millis(60_000),
            bulk_apply_timeout: Duration::from_millis(120_000),
        }
    }
}
