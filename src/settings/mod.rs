//! Persisted user settings
//!
//! A flat camelCase JSON object shared with the extension's storage. Daily
//! counters reset when `lastApplied` falls on another calendar day; the
//! weekly counter resets when the ISO week changes.

pub mod store;

pub use store::{JsonFileStore, MemoryStore, SettingsStore};

use crate::error::{BrowserError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Credits granted per day
pub const DAILY_CREDITS: u32 = 10;

/// Upper bound for `numApplications`
pub const MAX_APPLICATIONS_PER_DAY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_apply: bool,
    /// Score (0-100) a posting needs before auto apply fires
    pub min_score: u8,
    pub resume_text: String,
    /// Score (0-100) a posting needs during bulk apply
    pub threshold: u8,
    /// Applications allowed per day (1-10)
    pub num_applications: u32,
    pub remaining_applications: u32,
    pub credits_left: u32,
    pub applications_this_week: u32,
    #[serde(with = "lenient_date", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub last_applied: Option<NaiveDate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_apply: false,
            min_score: 75,
            resume_text: String::new(),
            threshold: 75,
            num_applications: 5,
            remaining_applications: 5,
            credits_left: DAILY_CREDITS,
            applications_this_week: 0,
            last_applied: None,
        }
    }
}

/// `YYYY-MM-DD`, also accepting full RFC 3339 timestamps on read
mod lenient_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.date_naive()),
            Err(_) => {
                log::warn!("Ignoring unparseable lastApplied '{}'", raw);
                None
            }
        }
    }
}

impl Settings {
    /// Apply the daily and weekly resets for `today`. Returns whether anything changed.
    pub fn refresh(&mut self, today: NaiveDate) -> bool {
        let before = self.clone();

        if self.last_applied != Some(today) {
            self.remaining_applications = self.num_applications;
            self.credits_left = DAILY_CREDITS;
        }
        let same_week = self.last_applied.is_some_and(|last| last.iso_week() == today.iso_week());
        if !same_week {
            self.applications_this_week = 0;
        }

        let changed = *self != before;
        if changed {
            log::debug!("Settings reset for {}", today);
        }
        changed
    }

    /// How many applications may still go out today
    pub fn application_cap(&self) -> u32 {
        self.remaining_applications.min(self.credits_left)
    }

    /// Count one submitted application
    pub fn record_application(&mut self, today: NaiveDate) {
        self.remaining_applications = self.remaining_applications.saturating_sub(1);
        self.credits_left = self.credits_left.saturating_sub(1);
        self.applications_this_week += 1;
        self.last_applied = Some(today);
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_score > 100 {
            return Err(BrowserError::Config(format!("minScore must be 0-100, got {}", self.min_score)));
        }
        if self.threshold > 100 {
            return Err(BrowserError::Config(format!("threshold must be 0-100, got {}", self.threshold)));
        }
        if !(1..=MAX_APPLICATIONS_PER_DAY).contains(&self.num_applications) {
            return Err(BrowserError::Config(format!(
                "numApplications must be 1-{}, got {}",
                MAX_APPLICATIONS_PER_DAY, self.num_applications
            )));
        }
        Ok(())
    }
}
