//! Interaction sequencing
//!
//! A [`Sequencer`] drives a [`StepSequence`] through the state machine
//!
//! ```text
//! Idle -> Running(0) -> Running(1) -> ... -> Completed
//!              \             \
//!               +-> Failed(reason, i)
//! ```
//!
//! Steps run strictly in order and never run twice except through their own
//! retry budget. A failed step ends the sequence; later steps are not touched.

use crate::automation::step::{Attempted, InteractionStep, Sighting, StepSequence, retry_locate};
use crate::automation::watcher::{WaitResult, wait_for_element};
use crate::context::ExecutionContext;
use crate::dom::Document;
use crate::error::{BrowserError, Result};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    ElementNotFound,
    ElementNotVisible,
    RetriesExhausted,
    Cancelled,
}

/// Terminal result of running a StepSequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SequenceOutcome {
    Completed,
    #[serde(rename_all = "camelCase")]
    Failed {
        reason: FailureReason,
        step: usize,
        /// Label of the element that could not be used
        target: String,
        #[serde(skip)]
        sighting: Option<Sighting>,
    },
}

impl SequenceOutcome {
    /// User-facing description of a failure
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Completed => None,
            Self::Failed { reason, target, sighting, .. } => Some(match (reason, sighting) {
                (FailureReason::Cancelled, _) => format!("Cancelled while waiting for {}", target),
                (FailureReason::ElementNotVisible, _) | (_, Some(Sighting::Hidden)) => {
                    format!("The {} never became visible", target)
                }
                _ => format!("Failed to find {}", target),
            }),
        }
    }
}

/// Sequencer state; terminal states absorb every further transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    Running(usize),
    Completed,
    Failed { reason: FailureReason, step: usize },
}

impl SequenceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    /// Advance to step `next`; only `Idle -> Running(0)` and `Running(i) -> Running(i + 1)` are legal
    pub fn advance(&self, next: usize) -> Option<Self> {
        match self {
            Self::Idle if next == 0 => Some(Self::Running(0)),
            Self::Running(i) if next == i + 1 => Some(Self::Running(next)),
            _ => None,
        }
    }

    pub fn complete(&self, total: usize) -> Option<Self> {
        match self {
            Self::Idle if total == 0 => Some(Self::Completed),
            Self::Running(i) if i + 1 == total => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn fail(&self, reason: FailureReason) -> Option<Self> {
        match self {
            Self::Running(step) => Some(Self::Failed { reason, step: *step }),
            _ => None,
        }
    }
}

/// Runs step sequences against one document
#[derive(Clone)]
pub struct Sequencer {
    doc: Arc<dyn Document>,
    ctx: Arc<ExecutionContext>,
}

impl Sequencer {
    pub fn new(doc: Arc<dyn Document>, ctx: Arc<ExecutionContext>) -> Self {
        Self { doc, ctx }
    }

    /// Run every step in order until one fails or all complete.
    ///
    /// Errors are reserved for backend failures (e.g. a lost tab); element
    /// trouble is reported through the outcome.
    pub async fn run(&self, sequence: &StepSequence) -> Result<SequenceOutcome> {
        let total = sequence.len();
        let mut state = SequenceState::Idle;

        for (index, step) in sequence.steps().iter().enumerate() {
            state = state.advance(index).ok_or_else(|| illegal(&state, "advance"))?;
            log::debug!("Step {}/{}: {}", index + 1, total, step.label);

            if let Some(failure) = self.run_step(step).await? {
                let (reason, target, sighting) = failure;
                state = state.fail(reason).ok_or_else(|| illegal(&state, "fail"))?;
                log::info!("Sequence failed at step {} ({}): {:?}", index, target, reason);
                debug_assert!(state.is_terminal());
                return Ok(SequenceOutcome::Failed { reason, step: index, target, sighting });
            }
        }

        state = state.complete(total).ok_or_else(|| illegal(&state, "complete"))?;
        debug_assert_eq!(state, SequenceState::Completed);
        log::info!("Sequence completed ({} steps)", total);
        Ok(SequenceOutcome::Completed)
    }

    /// One step: bounded locate, click, optional single-shot await, settle.
    /// Returns the failure, if any.
    async fn run_step(&self, step: &InteractionStep) -> Result<Option<(FailureReason, String, Option<Sighting>)>> {
        let target = match retry_locate(self.doc.as_ref(), &step.target, step.require_visible, step.retry, &self.ctx)
            .await?
        {
            Attempted::Found(element) => element,
            Attempted::Exhausted { attempts, last } => {
                log::debug!("{} unusable after {} attempts ({:?})", step.label, attempts, last);
                return Ok(Some((FailureReason::RetriesExhausted, step.label.clone(), Some(last))));
            }
            Attempted::Cancelled { .. } => {
                return Ok(Some((FailureReason::Cancelled, step.label.clone(), None)));
            }
        };

        self.doc.click(&target).await?;
        log::debug!("Clicked {}", target.describe());

        if let Some(awaits) = &step.awaits {
            let waited =
                wait_for_element(Arc::clone(&self.doc), &awaits.root, &awaits.target, awaits.fallback, &self.ctx)
                    .await?;
            match waited {
                WaitResult::Found(_) => {}
                WaitResult::Absent => {
                    return Ok(Some((FailureReason::ElementNotFound, awaits.label.clone(), Some(Sighting::Absent))));
                }
                WaitResult::Hidden => {
                    return Ok(Some((FailureReason::ElementNotVisible, awaits.label.clone(), Some(Sighting::Hidden))));
                }
                WaitResult::Cancelled => {
                    return Ok(Some((FailureReason::Cancelled, awaits.label.clone(), None)));
                }
            }
        }

        if !self.ctx.pause(step.settle).await {
            return Ok(Some((FailureReason::Cancelled, step.label.clone(), None)));
        }
        Ok(None)
    }
}

fn illegal(state: &SequenceState, transition: &str) -> BrowserError {
    BrowserError::Config(format!("illegal sequencer transition '{}' from {:?}", transition, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::step::{AwaitSpec, RetryPolicy};
    use crate::dom::{HtmlDocument, SelectorSet};
    use crate::dom::html::ClickReaction;
    use std::time::Duration;

    fn apply_sequence() -> StepSequence {
        let retry = RetryPolicy::new(3, Duration::from_millis(2000));
        StepSequence::new(vec![
            InteractionStep::new("apply button", SelectorSet::new(["button.apply"]))
                .with_retry(retry)
                .awaiting(AwaitSpec::new("submit button", SelectorSet::new(["button.submit"]), Duration::from_secs(10))),
            InteractionStep::new("submit button", SelectorSet::new(["button.submit"])).with_retry(retry),
        ])
        .unwrap()
    }

    fn sequencer(doc: Arc<HtmlDocument>) -> Sequencer {
        Sequencer::new(doc, Arc::new(ExecutionContext::default()))
    }

    #[test]
    fn test_state_transitions() {
        let idle = SequenceState::Idle;
        assert_eq!(idle.advance(0), Some(SequenceState::Running(0)));
        assert_eq!(idle.advance(1), None);
        assert_eq!(idle.fail(FailureReason::RetriesExhausted), None);

        let running = SequenceState::Running(0);
        assert_eq!(running.advance(1), Some(SequenceState::Running(1)));
        assert_eq!(running.advance(0), None);
        assert_eq!(running.complete(1), Some(SequenceState::Completed));
        assert_eq!(running.complete(2), None);

        let failed = running.fail(FailureReason::ElementNotFound).unwrap();
        assert!(failed.is_terminal());
        assert_eq!(failed.advance(1), None);
        assert_eq!(SequenceState::Completed.fail(FailureReason::Cancelled), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_when_modal_appears() {
        let doc = Arc::new(HtmlDocument::new(r#"<html><body><button class="apply">Easy Apply</button></body></html>"#));
        doc.on_click(
            "button.apply",
            ClickReaction::Append { parent: "body".into(), html: r#"<button class="submit">Submit</button>"#.into() },
        )
        .unwrap();

        let outcome = sequencer(doc.clone()).run(&apply_sequence()).await.unwrap();
        assert_eq!(outcome, SequenceOutcome::Completed);
        assert_eq!(doc.click_log(), vec!["button.apply[0]".to_string(), "button.submit[0]".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_submit_fails_without_hanging() {
        let doc = Arc::new(HtmlDocument::new(r#"<html><body><button class="apply">Easy Apply</button></body></html>"#));

        let outcome = sequencer(doc.clone()).run(&apply_sequence()).await.unwrap();

        assert!(matches!(
            outcome,
            SequenceOutcome::Failed { reason: FailureReason::ElementNotFound, step: 0, .. }
        ));
        assert_eq!(outcome.message().as_deref(), Some("Failed to find submit button"));
        assert_eq!(doc.click_log(), vec!["button.apply[0]".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_step_failure_skips_rest() {
        let doc = Arc::new(HtmlDocument::new(r#"<html><body><button class="submit">Submit</button></body></html>"#));

        let outcome = sequencer(doc.clone()).run(&apply_sequence()).await.unwrap();

        assert!(matches!(
            outcome,
            SequenceOutcome::Failed { reason: FailureReason::RetriesExhausted, step: 0, .. }
        ));
        assert_eq!(outcome.message().as_deref(), Some("Failed to find apply button"));
        assert!(doc.query_log().iter().all(|q| q == "button.apply"));
        assert_eq!(doc.query_log().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_target_message() {
        let doc =
            Arc::new(HtmlDocument::new(r#"<html><body><button class="apply" hidden>Easy Apply</button></body></html>"#));

        let outcome = sequencer(doc).run(&apply_sequence()).await.unwrap();
        assert_eq!(outcome.message().as_deref(), Some("The apply button never became visible"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context() {
        let doc = Arc::new(HtmlDocument::new(r#"<html><body></body></html>"#));
        let ctx = Arc::new(ExecutionContext::default());
        ctx.cancellation().cancel();

        let outcome = Sequencer::new(doc, ctx).run(&apply_sequence()).await.unwrap();
        assert!(matches!(outcome, SequenceOutcome::Failed { reason: FailureReason::Cancelled, step: 0, .. }));
    }

    #[test]
    fn test_outcome_serialization() {
        let failed = SequenceOutcome::Failed {
            reason: FailureReason::RetriesExhausted,
            step: 0,
            target: "apply button".into(),
            sighting: None,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "retries-exhausted");
        assert_eq!(json["step"], 0);
    }
}
