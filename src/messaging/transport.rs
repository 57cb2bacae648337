//! Requesting side of the cross-context channel
//!
//! [`ExtensionClient`] sends a [`Request`] through a [`Transport`] under a
//! per-request timeout. When delivery fails because nothing is listening yet,
//! the content side is injected once and the request retried once; every
//! other failure is returned as is.

use crate::error::{BrowserError, Result};
use crate::extract::JobRecord;
use crate::messaging::{Dispatcher, Request, Response};
use crate::settings::Settings;
use crate::timing::Timings;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Delivers one request and waits for its reply
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fails with [`BrowserError::NoReceiver`] when no listener is registered
    async fn deliver(&self, request: &Request) -> Result<Response>;
}

/// Installs the content side into the target context on demand
#[async_trait]
pub trait Injector: Send + Sync {
    async fn inject(&self) -> Result<()>;
}

type Factory = Box<dyn Fn() -> Result<Dispatcher> + Send + Sync>;

/// In-process channel whose receiver is a [`Dispatcher`] created on injection
pub struct LocalTransport {
    receiver: RwLock<Option<Arc<Dispatcher>>>,
    factory: Factory,
    injections: AtomicUsize,
}

impl LocalTransport {
    /// Transport with no receiver yet; `factory` builds one on injection
    pub fn new(factory: impl Fn() -> Result<Dispatcher> + Send + Sync + 'static) -> Self {
        Self { receiver: RwLock::new(None), factory: Box::new(factory), injections: AtomicUsize::new(0) }
    }

    /// Transport whose receiver is already listening
    pub fn connected(dispatcher: Dispatcher) -> Self {
        let shared = dispatcher.clone();
        let transport = Self::new(move || Ok(shared.clone()));
        if let Ok(mut slot) = transport.receiver.write() {
            *slot = Some(Arc::new(dispatcher));
        }
        transport
    }

    /// How many times the content side was injected
    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    fn current(&self) -> Option<Arc<Dispatcher>> {
        self.receiver.read().ok().and_then(|slot| slot.clone())
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn deliver(&self, request: &Request) -> Result<Response> {
        let dispatcher = self.current().ok_or(BrowserError::NoReceiver)?;
        Ok(dispatcher.handle(request.clone()).await)
    }
}

#[async_trait]
impl Injector for LocalTransport {
    async fn inject(&self) -> Result<()> {
        let dispatcher = (self.factory)()?;
        dispatcher.announce_ready();
        let mut slot =
            self.receiver.write().map_err(|e| BrowserError::Transport(format!("Receiver slot poisoned: {}", e)))?;
        *slot = Some(Arc::new(dispatcher));
        self.injections.fetch_add(1, Ordering::SeqCst);
        log::debug!("Content side injected");
        Ok(())
    }
}

/// Typed client for the content side
#[derive(Clone)]
pub struct ExtensionClient {
    transport: Arc<dyn Transport>,
    injector: Arc<dyn Injector>,
    timings: Timings,
}

impl ExtensionClient {
    pub fn new(transport: Arc<dyn Transport>, injector: Arc<dyn Injector>) -> Self {
        Self { transport, injector, timings: Timings::default() }
    }

    /// Client over a [`LocalTransport`], which is also its injector
    pub fn local(transport: Arc<LocalTransport>) -> Self {
        Self::new(transport.clone(), transport)
    }

    /// Builder method: set timeouts
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Round-trip budget for `request`
    pub fn timeout_for(&self, request: &Request) -> Duration {
        match request {
            Request::AutoApply => self.timings.apply_timeout,
            Request::ApplyToAllVisibleJobs { .. } => self.timings.bulk_apply_timeout,
            _ => self.timings.message_timeout,
        }
    }

    /// Send `request`, injecting and retrying once if nobody is listening
    pub async fn request(&self, request: &Request) -> Result<Response> {
        match self.attempt(request).await {
            Err(BrowserError::NoReceiver) => {
                log::info!("No receiver for {}, injecting content side", request.kind());
                self.injector
                    .inject()
                    .await
                    .map_err(|e| BrowserError::Transport(format!("Injection failed: {}", e)))?;
                self.attempt(request).await.map_err(|e| match e {
                    BrowserError::NoReceiver => {
                        BrowserError::Transport(format!("No receiver for {} after injection", request.kind()))
                    }
                    other => other,
                })
            }
            other => other,
        }
    }

    async fn attempt(&self, request: &Request) -> Result<Response> {
        let timeout = self.timeout_for(request);
        tokio::time::timeout(timeout, self.transport.deliver(request))
            .await
            .map_err(|_| BrowserError::Timeout { what: request.kind().to_string(), after_ms: timeout.as_millis() as u64 })?
    }

    pub async fn scrape(&self) -> Result<JobRecord> {
        match self.request(&Request::ScrapeJobDetails).await?.into_result()? {
            Response::Job(job) => Ok(job),
            other => Err(unexpected(&Request::ScrapeJobDetails, &other)),
        }
    }

    pub async fn auto_apply(&self) -> Result<()> {
        match self.request(&Request::AutoApply).await?.into_result()? {
            Response::Applied { success: true } => Ok(()),
            other => Err(unexpected(&Request::AutoApply, &other)),
        }
    }

    pub async fn apply_to_all(&self, resume_text: &str, threshold: u8) -> Result<u32> {
        let request = Request::ApplyToAllVisibleJobs { resume_text: resume_text.to_string(), threshold };
        match self.request(&request).await?.into_result()? {
            Response::AppliedCount { applied_count } => Ok(applied_count),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn extract_resume(&self, pdf: &[u8]) -> Result<String> {
        let request = Request::ExtractResumeText { pdf_base64: STANDARD.encode(pdf) };
        match self.request(&request).await?.into_result()? {
            Response::ResumeText { text } => Ok(text),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn settings(&self) -> Result<Settings> {
        match self.request(&Request::GetSettings).await?.into_result()? {
            Response::Settings(settings) => Ok(settings),
            other => Err(unexpected(&Request::GetSettings, &other)),
        }
    }
}

fn unexpected(request: &Request, response: &Response) -> BrowserError {
    BrowserError::Transport(format!("Unexpected reply to {}: {:?}", request.kind(), response))
}
