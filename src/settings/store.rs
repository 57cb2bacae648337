use crate::error::{BrowserError, Result};
use crate::settings::Settings;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Flat key-value settings persistence
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings>;

    async fn save(&self, settings: &Settings) -> Result<()>;

    /// Load and apply the daily/weekly resets, persisting them if anything changed
    async fn load_for_today(&self, today: NaiveDate) -> Result<Settings> {
        let mut settings = self.load().await?;
        if settings.refresh(today) {
            self.save(&settings).await?;
        }
        Ok(settings)
    }

    /// Count one submitted application and persist the counters
    async fn record_application(&self, today: NaiveDate) -> Result<Settings> {
        let mut settings = self.load_for_today(today).await?;
        settings.record_application(today);
        self.save(&settings).await?;
        Ok(settings)
    }
}

/// Settings kept in a JSON file; a missing file reads as defaults
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", self.path.display());
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// In-process settings, for tests and embedders without storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self { settings: Mutex::new(settings) }
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Settings> {
        self.settings
            .lock()
            .map(|s| s.clone())
            .map_err(|e| BrowserError::Config(format!("Settings poisoned: {}", e)))
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.settings.lock().map_err(|e| BrowserError::Config(format!("Settings poisoned: {}", e)))?;
        *guard = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DAILY_CREDITS;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("job-autopilot-{}-{}", std::process::id(), name)).join("settings.json")
    }

    #[tokio::test]
    async fn test_load_for_today_persists_reset() {
        let store = MemoryStore::new(Settings {
            num_applications: 4,
            remaining_applications: 0,
            credits_left: 0,
            last_applied: Some(day(20)),
            ..Settings::default()
        });

        let settings = store.load_for_today(day(21)).await.unwrap();
        assert_eq!(settings.remaining_applications, 4);
        assert_eq!(settings.credits_left, DAILY_CREDITS);
        assert_eq!(store.snapshot(), settings);
    }

    #[tokio::test]
    async fn test_record_application() {
        let store = MemoryStore::default();
        let settings = store.record_application(day(21)).await.unwrap();

        assert_eq!(settings.remaining_applications, 4);
        assert_eq!(settings.credits_left, DAILY_CREDITS - 1);
        assert_eq!(store.snapshot().last_applied, Some(day(21)));
    }

    #[tokio::test]
    async fn test_invalid_settings_are_not_saved() {
        let store = MemoryStore::default();
        let bad = Settings { num_applications: 42, ..Settings::default() };
        assert!(store.save(&bad).await.is_err());
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[tokio::test]
    async fn test_json_file_round_trip() {
        let path = temp_path("round-trip");
        let store = JsonFileStore::new(&path);

        assert_eq!(store.load().await.unwrap(), Settings::default());

        let settings = Settings { auto_apply: true, min_score: 80, ..Settings::default() };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"autoApply\": true"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
