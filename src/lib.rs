//! # job-autopilot
//!
//! Job-posting automation over Chrome DevTools Protocol (CDP): scrape posting
//! details out of the page, extract resume text from a PDF, and drive the
//! "apply" click sequence with bounded retries and DOM mutation watching.
//!
//! ## Features
//!
//! - **Element Locator**: priority-ordered selector candidates, first match wins
//! - **Interaction Sequencer**: data-driven click sequences with fixed-delay retry budgets
//! - **Mutation Watcher**: cancellable single-shot and persistent DOM subscriptions
//! - **Extraction Pipeline**: best-effort "see more" expansion, then one [`JobRecord`] per page
//! - **Messaging**: typed request/response contract, injection-retry transport and a
//!   Chrome native messaging host
//!
//! ## Running
//!
//! ```bash
//! # Scrape the posting open in a running Chrome
//! cargo run --bin job-autopilot -- --connect ws://127.0.0.1:9222/devtools/browser/<id> scrape
//!
//! # Apply to the current posting
//! cargo run --bin job-autopilot -- --url https://www.linkedin.com/jobs/view/123/ apply
//!
//! # Serve the extension over native messaging
//! cargo run --bin native-host -- --connect ws://127.0.0.1:9222/devtools/browser/<id>
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use job_autopilot::{BrowserSession, Dispatcher, LaunchOptions, Request, SitePreset, Timings};
//! use std::sync::Arc;
//!
//! # async fn run() -> job_autopilot::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::new().headless(false))?;
//! let doc = session.open_document(Some("https://www.linkedin.com/jobs/view/123/"))?;
//!
//! let dispatcher = Dispatcher::new(Arc::new(doc), SitePreset::linkedin(&Timings::default())?);
//! let response = dispatcher.handle(Request::ScrapeJobDetails).await;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! # Ok(())
//! # }
//! ```
//!
//! The same flows run against [`HtmlDocument`], an in-memory page whose clicks
//! can be scripted to mutate the DOM:
//!
//! ```rust
//! use job_autopilot::{ExecutionContext, HtmlDocument, SitePreset, Timings};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> job_autopilot::Result<()> {
//! let doc = HtmlDocument::new(
//!     r#"<h1 class="jobs-unified-top-card__job-title"> Staff   Engineer </h1>"#,
//! )
//! .with_url("https://www.linkedin.com/jobs/view/123/?refId=abc");
//! let preset = SitePreset::linkedin(&Timings::default())?;
//!
//! let record = preset.pipeline().extract(&doc, &ExecutionContext::default(), false).await?;
//! assert_eq!(record.title(), "Staff Engineer");
//! assert_eq!(record.url(), "https://www.linkedin.com/jobs/view/123/");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`dom`]: the [`Document`] abstraction, element snapshots, locator and text normalizer
//! - [`automation`]: mutation watcher, retry combinator and interaction sequencer
//! - [`extract`]: extraction pipeline and [`JobRecord`]
//! - [`messaging`]: message contract, dispatcher, transport, autopilot, native framing
//! - [`browser`]: Chrome session management and the CDP-backed [`TabDocument`]
//! - [`settings`], [`presets`], [`resume`], [`scoring`]: configuration and collaborators
//! - [`error`]: error types and result aliases

pub mod automation;
pub mod browser;
pub mod context;
pub mod dom;
pub mod error;
pub mod extract;
pub mod messaging;
pub mod presets;
pub mod resume;
pub mod scoring;
pub mod settings;
pub mod timing;

pub use automation::{InteractionStep, RetryPolicy, SequenceOutcome, Sequencer, StepSequence, WatcherHandle};
pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions, TabDocument};
pub use context::ExecutionContext;
pub use dom::{Document, ElementNode, FieldSchema, HtmlDocument, SelectorSet};
pub use error::{BrowserError, Result};
pub use extract::{ExtractionPipeline, JobRecord};
pub use messaging::{Dispatcher, ExtensionClient, Push, Request, Response};
pub use presets::SitePreset;
pub use settings::{Settings, SettingsStore};
pub use timing::Timings;
