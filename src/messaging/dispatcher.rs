//! Content-side request handling
//!
//! The [`Dispatcher`] owns everything that touches the page for one execution
//! context: it answers [`Request`]s, announces readiness and runs the
//! persistent watcher that pushes fresh job records as the page changes.

use crate::automation::{SequenceOutcome, Sequencer, WatchControl, WatchMode, WatcherHandle, observe};
use crate::context::ExecutionContext;
use crate::dom::{Document, locator::locate_all};
use crate::error::{BrowserError, Result};
use crate::extract::{ExtractionPipeline, JobRecord};
use crate::messaging::{Push, Request, Response};
use crate::presets::SitePreset;
use crate::resume::{PdftotextExtractor, ResumeTextExtractor};
use crate::scoring::{ConstantScorer, MatchScorer, passes};
use crate::settings::{MemoryStore, SettingsStore};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::mpsc;

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct Dispatcher {
    doc: Arc<dyn Document>,
    ctx: Arc<ExecutionContext>,
    preset: Arc<SitePreset>,
    pipeline: Arc<ExtractionPipeline>,
    settings: Arc<dyn SettingsStore>,
    resume: Arc<dyn ResumeTextExtractor>,
    scorer: Arc<dyn MatchScorer>,
    pushes: Option<mpsc::UnboundedSender<Push>>,
    today: Clock,
}

impl Dispatcher {
    /// Dispatcher with in-memory settings, `pdftotext` resume extraction and
    /// a zero scorer (bulk apply skips everything until a scorer is set)
    pub fn new(doc: Arc<dyn Document>, preset: SitePreset) -> Self {
        let pipeline = Arc::new(preset.pipeline());
        Self {
            doc,
            ctx: Arc::new(ExecutionContext::default()),
            preset: Arc::new(preset),
            pipeline,
            settings: Arc::new(MemoryStore::default()),
            resume: Arc::new(PdftotextExtractor::new()),
            scorer: Arc::new(ConstantScorer::default()),
            pushes: None,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Builder method: share an existing execution context
    pub fn with_context(mut self, ctx: Arc<ExecutionContext>) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_resume_extractor(mut self, resume: Arc<dyn ResumeTextExtractor>) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn MatchScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Builder method: where pushes go
    pub fn with_pushes(mut self, pushes: mpsc::UnboundedSender<Push>) -> Self {
        self.pushes = Some(pushes);
        self
    }

    /// Builder method: override the calendar used for settings resets
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    pub fn preset(&self) -> &SitePreset {
        &self.preset
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        &self.doc
    }

    fn today(&self) -> NaiveDate {
        (self.today)()
    }

    fn sequencer(&self) -> Sequencer {
        Sequencer::new(Arc::clone(&self.doc), Arc::clone(&self.ctx))
    }

    /// Answer one request. Never fails: errors become `{error}` replies.
    pub async fn handle(&self, request: Request) -> Response {
        let kind = request.kind();
        log::debug!("Handling {}", kind);

        let result = match request {
            Request::ScrapeJobDetails => self.scrape().await.map(Response::Job),
            Request::AutoApply => self.auto_apply().await.map(|()| Response::Applied { success: true }),
            Request::ApplyToAllVisibleJobs { resume_text, threshold } => self
                .apply_to_all(&resume_text, threshold)
                .await
                .map(|applied_count| Response::AppliedCount { applied_count }),
            Request::ExtractResumeText { pdf_base64 } => {
                self.extract_resume(&pdf_base64).await.map(|text| Response::ResumeText { text })
            }
            Request::GetSettings => self.settings.load_for_today(self.today()).await.map(Response::Settings),
        };

        result.unwrap_or_else(|e| {
            log::warn!("{} failed: {}", kind, e);
            Response::from(e)
        })
    }

    /// Extract the current posting. While another operation holds the page,
    /// the read still happens but the "see more" click is skipped.
    pub async fn scrape(&self) -> Result<JobRecord> {
        let guard = self.ctx.try_begin("scrape");
        if guard.is_none() {
            log::debug!("Operation in progress, scraping without expansion");
        }
        self.pipeline.extract(self.doc.as_ref(), &self.ctx, guard.is_some()).await
    }

    /// Run the apply sequence on the current posting
    pub async fn auto_apply(&self) -> Result<()> {
        let _guard = self.ctx.try_begin("auto-apply").ok_or(BrowserError::Busy)?;
        let outcome = self.sequencer().run(&self.preset.apply).await?;
        self.settle_outcome(outcome).await
    }

    async fn settle_outcome(&self, outcome: SequenceOutcome) -> Result<()> {
        match outcome.message() {
            None => {
                self.count_application().await;
                Ok(())
            }
            Some(message) => Err(BrowserError::Rejected(message)),
        }
    }

    async fn count_application(&self) {
        match self.settings.record_application(self.today()).await {
            Ok(settings) => log::info!(
                "Application recorded ({} remaining today, {} this week)",
                settings.remaining_applications,
                settings.applications_this_week
            ),
            Err(e) => log::warn!("Failed to record application: {}", e),
        }
    }

    /// Walk the visible job cards, applying to each posting that scores at
    /// least `threshold`, up to today's remaining budget. Returns how many
    /// applications went through.
    pub async fn apply_to_all(&self, resume_text: &str, threshold: u8) -> Result<u32> {
        let _guard = self.ctx.try_begin("bulk-apply").ok_or(BrowserError::Busy)?;
        let settings = self.settings.load_for_today(self.today()).await?;
        let budget = settings.application_cap();
        if budget == 0 {
            log::info!("No applications left for today");
            return Ok(0);
        }
        let resume = if resume_text.trim().is_empty() { settings.resume_text.as_str() } else { resume_text };

        let cards = locate_all(self.doc.as_ref(), &self.preset.job_cards).await?;
        log::info!("Found {} job cards, budget {}", cards.len(), budget);

        let timings = self.ctx.timings();
        let sequencer = self.sequencer();
        let mut applied = 0;

        for (index, card) in cards.iter().enumerate() {
            if applied >= budget {
                break;
            }
            if let Err(e) = self.doc.click(card).await {
                log::warn!("Could not open job card {}: {}", index, e);
                continue;
            }
            if !self.ctx.pause(timings.page_load_settle).await {
                break;
            }

            let (job, score) = match self.score_open_card(resume).await {
                Ok(scored) => scored,
                Err(e) => {
                    log::warn!("Skipping job card {}: {}", index, e);
                    if !self.ctx.pause(timings.click_delay).await {
                        break;
                    }
                    continue;
                }
            };
            if passes(score, threshold) {
                match sequencer.run(&self.preset.apply).await? {
                    SequenceOutcome::Completed => {
                        applied += 1;
                        self.count_application().await;
                        log::info!("Applied to '{}' (score {})", job.title(), score);
                    }
                    failed => {
                        log::info!("Skipping '{}': {}", job.title(), failed.message().unwrap_or_default());
                    }
                }
            } else {
                log::debug!("'{}' scored {} < {}", job.title(), score, threshold);
            }

            if !self.ctx.pause(timings.click_delay).await {
                break;
            }
        }

        Ok(applied)
    }

    async fn score_open_card(&self, resume: &str) -> Result<(JobRecord, u8)> {
        let job = self.pipeline.extract(self.doc.as_ref(), &self.ctx, true).await?;
        let score = self.scorer.score(&job, resume).await?;
        Ok((job, score))
    }

    /// Decode a base64 PDF (bare or as a `data:` URL) and extract its text
    pub async fn extract_resume(&self, pdf_base64: &str) -> Result<String> {
        let payload = pdf_base64.trim();
        let payload = match payload.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => payload,
        };
        let pdf = STANDARD
            .decode(payload)
            .map_err(|e| BrowserError::ExtractionUnavailable(format!("invalid base64 payload: {}", e)))?;
        self.resume.extract_text(&pdf).await
    }

    /// Mark the context ready and tell the other side
    pub fn announce_ready(&self) {
        self.ctx.mark_ready();
        emit(&self.pushes, Push::ContentScriptReady);
    }

    /// Re-extract on every mutation batch under the preset's content root and
    /// push the fresh record. Firings while an operation holds the page are
    /// skipped.
    pub async fn watch_content(&self) -> Result<WatcherHandle> {
        let doc = Arc::clone(&self.doc);
        let ctx = Arc::clone(&self.ctx);
        let pipeline = Arc::clone(&self.pipeline);
        let pushes = self.pushes.clone();

        observe(self.doc.as_ref(), &self.preset.content_root, self.ctx.cancellation(), WatchMode::Persistent, move |batch| {
            let doc = Arc::clone(&doc);
            let ctx = Arc::clone(&ctx);
            let pipeline = Arc::clone(&pipeline);
            let pushes = pushes.clone();
            async move {
                if ctx.is_busy() {
                    log::debug!("Skipping refresh for batch #{} while an operation runs", batch.seq);
                    return WatchControl::Continue;
                }
                match pipeline.extract(doc.as_ref(), &ctx, false).await {
                    Ok(record) => emit(&pushes, Push::JobContentUpdated(record)),
                    Err(e) => log::warn!("Refresh after batch #{} failed: {}", batch.seq, e),
                }
                WatchControl::Continue
            }
        })
        .await
    }
}

fn emit(pushes: &Option<mpsc::UnboundedSender<Push>>, push: Push) {
    match pushes {
        Some(tx) => {
            if tx.send(push).is_err() {
                log::debug!("Push receiver is gone");
            }
        }
        None => log::debug!("No push sink configured, dropping {:?}", push),
    }
}
