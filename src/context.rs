//! Per-execution-context state
//!
//! One [`ExecutionContext`] is created for each page context and shared by
//! every component working on that page. It replaces ambient globals with
//! explicit state: readiness, the single "operation in progress" guard that
//! keeps DOM-mutating flows from interleaving, and the cancellation signal
//! threaded through every suspension point.

use crate::timing::Timings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ExecutionContext {
    ready: AtomicBool,
    busy: AtomicBool,
    cancel: CancellationToken,
    timings: Timings,
}

/// Held while a DOM-mutating operation runs; releases the context on drop
#[derive(Debug)]
pub struct OperationGuard<'a> {
    ctx: &'a ExecutionContext,
    name: &'static str,
}

impl ExecutionContext {
    pub fn new(timings: Timings) -> Self {
        Self {
            ready: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            timings,
        }
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Claim the context for a DOM-mutating operation.
    ///
    /// Returns `None` when another operation already holds it.
    pub fn try_begin(&self, name: &'static str) -> Option<OperationGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        log::debug!("Operation '{}' started", name);
        Some(OperationGuard { ctx: self, name })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Signal observed at every suspension point. Nothing in the message
    /// contract triggers it yet; embedders may cancel it to stop a run.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
    pub async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Timings::default())
    }
}

impl OperationGuard<'_> {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.ctx.busy.store(false, Ordering::Release);
        log::debug!("Operation '{}' finished", self.name);
    }
}
