//! Mutation watching
//!
//! A watcher is a cancellable subscription to child-list mutations under a
//! root element. Each batch invokes the callback, which answers whether to
//! keep watching. Callbacks for one watcher never overlap: batches that land
//! while a callback is still running are dropped rather than queued.
//!
//! Two modes exist:
//! - single-shot: bounded by a fallback deadline, ends on the first `Stop`
//! - persistent: lives until cancelled or the document goes away

use crate::context::ExecutionContext;
use crate::dom::{Document, ElementNode, MutationBatch, SelectorSet, locate};
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Self-cancel after `fallback` unless the callback stops first
    SingleShot { fallback: Duration },
    /// Fire on every batch for the lifetime of the page
    Persistent,
}

/// Callback verdict after a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchControl {
    Continue,
    Stop,
}

/// How a watcher ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEnd {
    /// The callback returned `Stop`
    Matched,
    /// Cancelled through the handle (or its parent token)
    Cancelled,
    /// The single-shot fallback deadline elapsed
    Expired,
    /// The document stopped publishing mutations
    Detached,
}

/// Live watcher subscription
#[derive(Debug)]
pub struct WatcherHandle {
    token: CancellationToken,
    deadline: Option<Instant>,
    task: JoinHandle<WatchEnd>,
}

impl WatcherHandle {
    /// Stop watching. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// When a single-shot watcher gives up on its own
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Wait for the watcher to end
    pub async fn finished(self) -> WatchEnd {
        match self.task.await {
            Ok(end) => end,
            Err(e) => {
                log::warn!("Mutation watcher task failed: {}", e);
                WatchEnd::Detached
            }
        }
    }
}

/// Start watching `root` for child-list mutations.
///
/// `parent` ties the watcher to an outer cancellation signal, typically the
/// execution context's.
pub async fn observe<F, Fut>(
    doc: &dyn Document,
    root: &str,
    parent: &CancellationToken,
    mode: WatchMode,
    mut on_change: F,
) -> Result<WatcherHandle>
where
    F: FnMut(MutationBatch) -> Fut + Send + 'static,
    Fut: Future<Output = WatchControl> + Send + 'static,
{
    let mut rx = doc.subscribe(root).await?;
    let token = parent.child_token();
    let deadline = match mode {
        WatchMode::SingleShot { fallback } => Some(Instant::now() + fallback),
        WatchMode::Persistent => None,
    };

    let loop_token = token.clone();
    let root = root.to_string();
    let task = tokio::spawn(async move {
        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                _ = loop_token.cancelled() => return WatchEnd::Cancelled,
                _ = &mut expiry => {
                    log::debug!("Watcher on '{}' expired", root);
                    loop_token.cancel();
                    return WatchEnd::Expired;
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        return WatchEnd::Detached;
                    }
                    let batch = *rx.borrow_and_update();
                    let control = on_change(batch).await;

                    // drop batches that arrived while the callback ran
                    if rx.has_changed().unwrap_or(false) {
                        let skipped = *rx.borrow_and_update();
                        log::trace!("Coalesced mutation batches up to #{} on '{}'", skipped.seq, root);
                    }

                    if control == WatchControl::Stop {
                        loop_token.cancel();
                        return WatchEnd::Matched;
                    }
                }
            }
        }
    });

    Ok(WatcherHandle { token, deadline, task })
}

/// Result of waiting for an element to appear
#[derive(Debug, Clone, PartialEq)]
pub enum WaitResult {
    Found(ElementNode),
    /// Never matched before the fallback elapsed
    Absent,
    /// Matched but never rendered before the fallback elapsed
    Hidden,
    Cancelled,
}

/// Wait until `selectors` resolve to a rendered element, re-checking after
/// each mutation batch under `root`, for at most `fallback`.
///
/// The subscription is in place before the first check, so an element that
/// appears right after it still produces a batch.
pub async fn wait_for_element(
    doc: Arc<dyn Document>,
    root: &str,
    selectors: &SelectorSet,
    fallback: Duration,
    ctx: &ExecutionContext,
) -> Result<WaitResult> {
    let watch_doc = Arc::clone(&doc);
    let watch_selectors = selectors.clone();
    let handle = observe(
        doc.as_ref(),
        root,
        ctx.cancellation(),
        WatchMode::SingleShot { fallback },
        move |_| {
            let doc = Arc::clone(&watch_doc);
            let selectors = watch_selectors.clone();
            async move {
                match locate(doc.as_ref(), &selectors).await {
                    Ok(Some(found)) if found.is_rendered() => WatchControl::Stop,
                    Ok(_) => WatchControl::Continue,
                    Err(e) => {
                        log::debug!("Locate failed inside watcher: {}", e);
                        WatchControl::Continue
                    }
                }
            }
        },
    )
    .await?;

    match locate(doc.as_ref(), selectors).await {
        Ok(Some(found)) if found.is_rendered() => {
            handle.cancel();
            return Ok(WaitResult::Found(found));
        }
        Ok(_) => {}
        Err(e) => {
            handle.cancel();
            return Err(e);
        }
    }

    let end = handle.finished().await;
    if end == WatchEnd::Cancelled {
        return Ok(WaitResult::Cancelled);
    }

    // settle on the final state of the page
    Ok(match locate(doc.as_ref(), selectors).await? {
        Some(found) if found.is_rendered() => WaitResult::Found(found),
        Some(_) => WaitResult::Hidden,
        None => WaitResult::Absent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const PAGE: &str = r#"<html><body><main id="jobs"></main></body></html>"#;

    #[tokio::test(start_paused = true)]
    async fn test_single_shot_expires() {
        let doc = HtmlDocument::new(PAGE);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = observe(
            &doc,
            "body",
            &CancellationToken::new(),
            WatchMode::SingleShot { fallback: Duration::from_secs(10) },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { WatchControl::Continue }
            },
        )
        .await
        .unwrap();

        assert!(handle.deadline().is_some());
        assert_eq!(handle.finished().await, WatchEnd::Expired);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_watch() {
        let doc = Arc::new(HtmlDocument::new(PAGE));
        let handle = observe(
            doc.as_ref(),
            "body",
            &CancellationToken::new(),
            WatchMode::SingleShot { fallback: Duration::from_secs(10) },
            |batch| async move { if batch.added > 0 { WatchControl::Stop } else { WatchControl::Continue } },
        )
        .await
        .unwrap();

        let writer = Arc::clone(&doc);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            writer.append_html("#jobs", "<article>new</article>").unwrap();
        });

        assert_eq!(handle.finished().await, WatchEnd::Matched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_cancel_is_safe() {
        let doc = Arc::new(HtmlDocument::new(PAGE));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = observe(
            doc.as_ref(),
            "body",
            &CancellationToken::new(),
            WatchMode::SingleShot { fallback: Duration::from_secs(10) },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { WatchControl::Continue }
            },
        )
        .await
        .unwrap();

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        doc.append_html("#jobs", "<article>late</article>").unwrap();

        assert_eq!(handle.finished().await, WatchEnd::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_fires_per_batch_and_survives_deadline() {
        let doc = Arc::new(HtmlDocument::new(PAGE));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = observe(
            doc.as_ref(),
            "body",
            &CancellationToken::new(),
            WatchMode::Persistent,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { WatchControl::Continue }
            },
        )
        .await
        .unwrap();
        assert!(handle.deadline().is_none());

        for i in 0..3 {
            doc.append_html("#jobs", &format!("<article>{}</article>", i)).unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        handle.cancel();
        assert_eq!(handle.finished().await, WatchEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_during_callback_are_dropped() {
        let doc = Arc::new(HtmlDocument::new(PAGE));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let writer = Arc::clone(&doc);

        let handle = observe(
            doc.as_ref(),
            "body",
            &CancellationToken::new(),
            WatchMode::Persistent,
            move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let writer = Arc::clone(&writer);
                async move {
                    if n == 0 {
                        // mutations during a slow callback
                        writer.append_html("#jobs", "<p>a</p>").unwrap();
                        writer.append_html("#jobs", "<p>b</p>").unwrap();
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    WatchControl::Continue
                }
            },
        )
        .await
        .unwrap();

        doc.append_html("#jobs", "<p>first</p>").unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_propagates() {
        let doc = HtmlDocument::new(PAGE);
        let parent = CancellationToken::new();
        let handle = observe(&doc, "body", &parent, WatchMode::Persistent, |_| async { WatchControl::Continue })
            .await
            .unwrap();

        parent.cancel();
        assert_eq!(handle.finished().await, WatchEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_appears_later() {
        let doc = Arc::new(HtmlDocument::new(PAGE));
        let ctx = ExecutionContext::default();
        let writer = Arc::clone(&doc);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            writer.append_html("#jobs", r#"<button class="submit">Submit</button>"#).unwrap();
        });

        let result = wait_for_element(
            doc.clone(),
            "body",
            &SelectorSet::new(["button.submit"]),
            Duration::from_secs(10),
            &ctx,
        )
        .await
        .unwrap();
        assert!(matches!(result, WaitResult::Found(el) if el.has_class("submit")));
    }

    /// Page whose target shows up right after the first lookup misses it
    struct LateArrival {
        inner: HtmlDocument,
        arrived: AtomicBool,
    }

    #[async_trait]
    impl Document for LateArrival {
        async fn query_first(&self, selector: &str) -> Result<Option<ElementNode>> {
            let found = self.inner.query_first(selector).await?;
            if !self.arrived.swap(true, Ordering::SeqCst) {
                self.inner.append_html("#jobs", r#"<button class="submit">Submit</button>"#)?;
            }
            Ok(found)
        }

        async fn query_all(&self, selector: &str) -> Result<Vec<ElementNode>> {
            self.inner.query_all(selector).await
        }

        async fn click(&self, element: &ElementNode) -> Result<()> {
            self.inner.click(element).await
        }

        async fn url(&self) -> Result<String> {
            self.inner.url().await
        }

        async fn subscribe(&self, root: &str) -> Result<tokio::sync::watch::Receiver<MutationBatch>> {
            self.inner.subscribe(root).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_sees_arrival_after_first_check() {
        let doc = Arc::new(LateArrival { inner: HtmlDocument::new(PAGE), arrived: AtomicBool::new(false) });
        let ctx = ExecutionContext::default();
        let start = Instant::now();

        let result =
            wait_for_element(doc, "body", &SelectorSet::new(["button.submit"]), Duration::from_secs(10), &ctx)
                .await
                .unwrap();

        assert!(matches!(result, WaitResult::Found(_)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_times_out() {
        let doc = Arc::new(HtmlDocument::new(PAGE));
        let ctx = ExecutionContext::default();
        let start = Instant::now();

        let result =
            wait_for_element(doc, "body", &SelectorSet::new(["button.submit"]), Duration::from_secs(10), &ctx)
                .await
                .unwrap();

        assert_eq!(result, WaitResult::Absent);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_hidden() {
        let doc = Arc::new(HtmlDocument::new(
            r#"<html><body><button class="submit" hidden>Submit</button></body></html>"#,
        ));
        let ctx = ExecutionContext::default();

        let result = wait_for_element(doc, "body", &SelectorSet::new(["button.submit"]), Duration::from_secs(1), &ctx)
            .await
            .unwrap();
        assert_eq!(result, WaitResult::Hidden);
    }
}
