//! Click sequencing and mutation watching
//!
//! - watcher: cancellable subscriptions to DOM mutations, single-shot or persistent
//! - step: bounded locate retries and the declarative step model
//! - sequencer: runs a [`StepSequence`] to a terminal [`SequenceOutcome`]

pub mod sequencer;
pub mod step;
pub mod watcher;

pub use sequencer::{FailureReason, SequenceOutcome, SequenceState, Sequencer};
pub use step::{AwaitSpec, Attempted, InteractionStep, RetryPolicy, Sighting, StepSequence, retry_locate};
pub use watcher::{WaitResult, WatchControl, WatchEnd, WatchMode, WatcherHandle, observe, wait_for_element};
