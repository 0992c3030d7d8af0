//! Progress reporting for merge invocations.
//!
//! The orchestrator only knows the [`ProgressSink`] trait. Closures and Tokio
//! channel senders implement it, so a front-end can either handle events inline or
//! forward them to the thread that owns its UI state.

use tokio::sync::mpsc::{Sender, UnboundedSender};

use crate::types::MergeProgress;

/// Receiver of [`MergeProgress`] events.
///
/// Events are delivered synchronously from the merge task, with a
/// non-decreasing `current` index within one merge.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: MergeProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(MergeProgress) + Send + Sync,
{
    fn report(&self, progress: MergeProgress) {
        self(progress)
    }
}

impl ProgressSink for UnboundedSender<MergeProgress> {
    fn report(&self, progress: MergeProgress) {
        if self.send(progress).is_err() {
            log::trace!("Progress receiver dropped, event discarded");
        }
    }
}

impl ProgressSink for Sender<MergeProgress> {
    /// Never waits: events that do not fit in the channel are dropped.
    fn report(&self, progress: MergeProgress) {
        if let Err(e) = self.try_send(progress) {
            log::trace!("Progress event discarded: {}", e);
        }
    }
}

/// A sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: MergeProgress) {}
}
