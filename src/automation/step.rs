use crate::context::ExecutionContext;
use crate::dom::{Document, ElementNode, SelectorSet, locate};
use crate::error::{BrowserError, Result};
use crate::timing::{Timings, millis};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub attempts: u32,
    #[serde(rename = "delayMs", with = "millis")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// `max_retries` attempts spaced by the element-wait delay
    pub fn from_timings(timings: &Timings) -> Self {
        Self::new(timings.max_retries, timings.element_wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_timings(&Timings::default())
    }
}

/// What the last locate attempt saw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    Absent,
    Hidden,
}

/// Result of a bounded locate loop
#[derive(Debug, Clone, PartialEq)]
pub enum Attempted {
    Found(ElementNode),
    Exhausted { attempts: u32, last: Sighting },
    Cancelled { attempts: u32 },
}

/// Locate `selectors` until a usable element shows up or the policy runs out.
///
/// Exactly `policy.attempts` locates happen when nothing usable appears, with
/// `policy.delay` between consecutive attempts and none after the last.
/// With `require_visible`, present-but-unrendered counts as absent.
pub async fn retry_locate(
    doc: &dyn Document,
    selectors: &SelectorSet,
    require_visible: bool,
    policy: RetryPolicy,
    ctx: &ExecutionContext,
) -> Result<Attempted> {
    let mut last = Sighting::Absent;
    for attempt in 1..=policy.attempts {
        if ctx.is_cancelled() {
            return Ok(Attempted::Cancelled { attempts: attempt - 1 });
        }
        match locate(doc, selectors).await? {
            Some(found) if !require_visible || found.is_rendered() => return Ok(Attempted::Found(found)),
            Some(found) => {
                log::debug!("Attempt {}/{}: {} is not rendered", attempt, policy.attempts, found.describe());
                last = Sighting::Hidden;
            }
            None => {
                log::debug!("Attempt {}/{}: nothing matched", attempt, policy.attempts);
                last = Sighting::Absent;
            }
        }
        if attempt < policy.attempts && !ctx.pause(policy.delay).await {
            return Ok(Attempted::Cancelled { attempts: attempt });
        }
    }
    Ok(Attempted::Exhausted { attempts: policy.attempts, last })
}

/// A DOM consequence to wait for after a click (e.g. a modal appearing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitSpec {
    pub label: String,
    pub target: SelectorSet,
    /// Subtree to observe for the target's arrival
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(rename = "fallbackMs", with = "millis")]
    pub fallback: Duration,
}

fn default_root() -> String {
    "body".to_string()
}

impl AwaitSpec {
    pub fn new(label: impl Into<String>, target: SelectorSet, fallback: Duration) -> Self {
        Self { label: label.into(), target, root: default_root(), fallback }
    }

    /// Builder method: observe a narrower subtree
    pub fn within(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}

/// One click target in a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionStep {
    /// Human-readable name used in failure messages ("apply button")
    pub label: String,
    pub target: SelectorSet,
    #[serde(default = "default_true")]
    pub require_visible: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awaits: Option<AwaitSpec>,
    /// Pause after the click (and after any await) before the next step
    #[serde(default, rename = "settleMs", with = "millis")]
    pub settle: Duration,
}

fn default_true() -> bool {
    true
}

impl InteractionStep {
    pub fn new(label: impl Into<String>, target: SelectorSet) -> Self {
        Self {
            label: label.into(),
            target,
            require_visible: true,
            retry: RetryPolicy::default(),
            awaits: None,
            settle: Duration::ZERO,
        }
    }

    /// Builder method: set retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder method: wait for a consequence of the click before advancing
    pub fn awaiting(mut self, awaits: AwaitSpec) -> Self {
        self.awaits = Some(awaits);
        self
    }

    /// Builder method: set post-click settle time
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Builder method: accept present-but-unrendered targets
    pub fn allow_hidden(mut self) -> Self {
        self.require_visible = false;
        self
    }
}

/// Ordered, immutable list of steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<InteractionStep>", into = "Vec<InteractionStep>")]
pub struct StepSequence {
    steps: Vec<InteractionStep>,
}

impl StepSequence {
    pub fn new(steps: Vec<InteractionStep>) -> Result<Self> {
        if let Some(step) = steps.iter().find(|s| s.retry.attempts == 0) {
            return Err(BrowserError::Config(format!("step '{}' needs at least one attempt", step.label)));
        }
        if let Some(step) = steps.iter().find(|s| s.target.is_empty()) {
            return Err(BrowserError::Config(format!("step '{}' has no selectors", step.label)));
        }
        Ok(Self { steps })
    }

    /// Single-step sequence
    pub fn single(step: InteractionStep) -> Result<Self> {
        Self::new(vec![step])
    }

    pub fn steps(&self) -> &[InteractionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl TryFrom<Vec<InteractionStep>> for StepSequence {
    type Error = BrowserError;

    fn try_from(steps: Vec<InteractionStep>) -> Result<Self> {
        Self::new(steps)
    }
}

impl From<StepSequence> for Vec<InteractionStep> {
    fn from(sequence: StepSequence) -> Self {
        sequence.steps
    }
}
