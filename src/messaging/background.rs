//! Background-side reactions to pushes
//!
//! When the content side reports a new posting and auto apply is switched
//! on, the posting is scored against the stored resume and `AUTO_APPLY` is
//! issued if the score clears `minScore` and today's budget allows it.
//! The content side pushes on every page change, so a posting that was
//! already applied to is not applied to again.

use crate::error::Result;
use crate::extract::JobRecord;
use crate::messaging::{ExtensionClient, Push};
use crate::scoring::{MatchScorer, passes};
use crate::settings::SettingsStore;
use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What the autopilot did with one push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutopilotAction {
    Ignored,
    Disabled,
    AlreadyApplied,
    OutOfBudget,
    BelowThreshold { score: u8, min_score: u8 },
    Applied { score: u8 },
    Failed(String),
}

pub struct Autopilot {
    client: ExtensionClient,
    settings: Arc<dyn SettingsStore>,
    scorer: Arc<dyn MatchScorer>,
    today: Box<dyn Fn() -> NaiveDate + Send + Sync>,
    last_applied_url: Mutex<Option<String>>,
}

impl Autopilot {
    pub fn new(client: ExtensionClient, settings: Arc<dyn SettingsStore>, scorer: Arc<dyn MatchScorer>) -> Self {
        Self {
            client,
            settings,
            scorer,
            today: Box::new(|| Local::now().date_naive()),
            last_applied_url: Mutex::new(None),
        }
    }

    /// Builder method: override the calendar used for settings resets
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    pub async fn on_push(&self, push: Push) -> Result<AutopilotAction> {
        match push {
            Push::ContentScriptReady => {
                log::debug!("Content side is ready");
                Ok(AutopilotAction::Ignored)
            }
            Push::JobContentUpdated(job) => self.consider(&job).await,
        }
    }

    async fn consider(&self, job: &JobRecord) -> Result<AutopilotAction> {
        let settings = self.settings.load_for_today((self.today)()).await?;
        if !settings.auto_apply {
            return Ok(AutopilotAction::Disabled);
        }
        if job.title().is_empty() {
            log::debug!("No posting on {}", job.url());
            return Ok(AutopilotAction::Ignored);
        }
        if self.already_applied(job.url()) {
            return Ok(AutopilotAction::AlreadyApplied);
        }
        if settings.application_cap() == 0 {
            log::info!("Daily application budget used up, not applying to '{}'", job.title());
            return Ok(AutopilotAction::OutOfBudget);
        }

        let score = self.scorer.score(job, &settings.resume_text).await?;
        if !passes(score, settings.min_score) {
            log::debug!("'{}' scored {} < {}", job.title(), score, settings.min_score);
            return Ok(AutopilotAction::BelowThreshold { score, min_score: settings.min_score });
        }

        log::info!("Auto applying to '{}' (score {})", job.title(), score);
        Ok(match self.client.auto_apply().await {
            Ok(()) => {
                if let Ok(mut last) = self.last_applied_url.lock() {
                    *last = Some(job.url().to_string());
                }
                AutopilotAction::Applied { score }
            }
            Err(e) => {
                log::warn!("Auto apply to '{}' failed: {}", job.title(), e);
                AutopilotAction::Failed(e.to_string())
            }
        })
    }

    fn already_applied(&self, url: &str) -> bool {
        self.last_applied_url.lock().is_ok_and(|last| last.as_deref() == Some(url))
    }

    /// Consume pushes until the sender side closes
    pub async fn run(&self, mut pushes: mpsc::UnboundedReceiver<Push>) {
        while let Some(push) = pushes.recv().await {
            if let Err(e) = self.on_push(push).await {
                log::warn!("Autopilot error: {}", e);
            }
        }
        log::debug!("Push channel closed, autopilot stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::dom::html::ClickReaction;
    use crate::messaging::{Dispatcher, LocalTransport};
    use crate::presets::SitePreset;
    use crate::scoring::ConstantScorer;
    use crate::settings::{MemoryStore, Settings};
    use crate::timing::Timings;
    use chrono::Utc;
    use indexmap::IndexMap;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()
    }

    fn job() -> JobRecord {
        JobRecord::new(IndexMap::from([("title".to_string(), "Staff Engineer".to_string())]), "https://x.test/1", Utc::now())
    }

    fn autopilot(settings: Settings, score: u8) -> (Autopilot, Arc<HtmlDocument>, Arc<MemoryStore>) {
        let doc = Arc::new(HtmlDocument::new(
            r#"<html><body><button class="jobs-apply-button">Easy Apply</button></body></html>"#,
        ));
        doc.on_click(
            ".jobs-apply-button",
            ClickReaction::Append {
                parent: "body".into(),
                html: r#"<button aria-label="Submit application">Submit</button>"#.into(),
            },
        )
        .unwrap();

        let store = Arc::new(MemoryStore::new(settings));
        let dispatcher = Dispatcher::new(doc.clone(), SitePreset::linkedin(&Timings::default()).unwrap())
            .with_settings(store.clone())
            .with_clock(day);
        let client = ExtensionClient::local(Arc::new(LocalTransport::connected(dispatcher)));
        let pilot = Autopilot::new(client, store.clone(), Arc::new(ConstantScorer::new(score))).with_clock(day);
        (pilot, doc, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_does_nothing() {
        let (pilot, doc, _) = autopilot(Settings::default(), 100);
        let action = pilot.on_push(Push::JobContentUpdated(job())).await.unwrap();
        assert_eq!(action, AutopilotAction::Disabled);
        assert!(doc.click_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_threshold() {
        let (pilot, doc, _) = autopilot(Settings { auto_apply: true, min_score: 80, ..Settings::default() }, 79);
        let action = pilot.on_push(Push::JobContentUpdated(job())).await.unwrap();
        assert_eq!(action, AutopilotAction::BelowThreshold { score: 79, min_score: 80 });
        assert!(doc.click_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_applies_when_score_clears() {
        let (pilot, doc, store) = autopilot(Settings { auto_apply: true, ..Settings::default() }, 75);
        let action = pilot.on_push(Push::JobContentUpdated(job())).await.unwrap();

        assert_eq!(action, AutopilotAction::Applied { score: 75 });
        assert_eq!(doc.click_log().len(), 2);
        assert_eq!(store.snapshot().applications_this_week, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_pushes_apply_once() {
        let (pilot, doc, store) = autopilot(Settings { auto_apply: true, ..Settings::default() }, 90);

        let first = pilot.on_push(Push::JobContentUpdated(job())).await.unwrap();
        let second = pilot.on_push(Push::JobContentUpdated(job())).await.unwrap();

        assert_eq!(first, AutopilotAction::Applied { score: 90 });
        assert_eq!(second, AutopilotAction::AlreadyApplied);
        assert_eq!(doc.click_log().len(), 2);
        assert_eq!(store.snapshot().applications_this_week, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_page_is_ignored() {
        let (pilot, doc, _) = autopilot(Settings { auto_apply: true, ..Settings::default() }, 100);
        let blank = JobRecord::new(IndexMap::from([("title".to_string(), String::new())]), "https://x.test/2", Utc::now());

        assert_eq!(pilot.on_push(Push::JobContentUpdated(blank)).await.unwrap(), AutopilotAction::Ignored);
        assert!(doc.click_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_budget() {
        let settings = Settings {
            auto_apply: true,
            remaining_applications: 0,
            last_applied: Some(day()),
            ..Settings::default()
        };
        let (pilot, _, _) = autopilot(settings, 100);
        let action = pilot.on_push(Push::JobContentUpdated(job())).await.unwrap();
        assert_eq!(action, AutopilotAction::OutOfBudget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_push_is_ignored() {
        let (pilot, _, _) = autopilot(Settings::default(), 0);
        assert_eq!(pilot.on_push(Push::ContentScriptReady).await.unwrap(), AutopilotAction::Ignored);
    }
}
