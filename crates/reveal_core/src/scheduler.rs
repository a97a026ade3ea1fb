use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::SessionId;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::{
    config::RevealSettings,
    orchestrator::Signal,
    stack::{SlotIndex, SlotPlacement},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleKind {
    /// Wait for the slot layout to stabilize before measuring it.
    StackPrepare,
    /// Let the last dealt card finish moving before the summary appears.
    Finish,
}

/// Timed visual operations the reveal flow asks the renderer to play.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationSequence {
    PackJitter { tap: usize },
    Flash,
    Settle(SettleKind),
    CollapseToStack { placements: Vec<SlotPlacement> },
    DealOut { slot: SlotIndex },
}

impl AnimationSequence {
    pub fn name(&self) -> &'static str {
        match self {
            AnimationSequence::PackJitter { .. } => "pack_jitter",
            AnimationSequence::Flash => "flash",
            AnimationSequence::Settle(SettleKind::StackPrepare) => "settle_stack_prepare",
            AnimationSequence::Settle(SettleKind::Finish) => "settle_finish",
            AnimationSequence::CollapseToStack { .. } => "collapse_to_stack",
            AnimationSequence::DealOut { .. } => "deal_out",
        }
    }

    pub fn nominal_duration(&self, settings: &RevealSettings) -> Duration {
        match self {
            AnimationSequence::PackJitter { .. } => settings.jitter_duration(),
            AnimationSequence::Flash => settings.flash_duration(),
            AnimationSequence::Settle(SettleKind::StackPrepare) => settings.stack_prepare_delay(),
            AnimationSequence::Settle(SettleKind::Finish) => settings.finish_settle_delay(),
            AnimationSequence::CollapseToStack { .. } => settings.collapse_duration(),
            AnimationSequence::DealOut { .. } => settings.deal_duration(),
        }
    }
}

/// One-shot completion for a started sequence. Consuming it is the only way
/// to report completion, so it can fire at most once.
#[derive(Debug)]
pub struct Completion {
    session: SessionId,
    id: SequenceId,
    signals: mpsc::UnboundedSender<Signal>,
}

impl Completion {
    pub(crate) fn new(
        session: SessionId,
        id: SequenceId,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self {
            session,
            id,
            signals,
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn complete(self) {
        let signal = Signal::SequenceDone {
            session: self.session,
            id: self.id,
        };
        if self.signals.send(signal).is_err() {
            debug!(id = self.id.0, "scheduler: orchestrator gone, dropping completion");
        }
    }
}

/// Plays visual sequences. Implementations complete sequences in the order
/// their durations elapse, call [`Completion::complete`] once per sequence
/// and drop pending completions on [`AnimationScheduler::revert_all`].
pub trait AnimationScheduler: Send + Sync {
    fn run(&self, sequence: AnimationSequence, duration: Duration, completion: Completion);
    /// Cancels every pending sequence and reverts its visual state.
    fn revert_all(&self);
}

/// Scheduler backed by tokio timers. Must be used from inside a runtime.
#[derive(Default)]
pub struct TimelineScheduler {
    running: Mutex<Vec<JoinHandle<()>>>,
}

impl TimelineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn running(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pending(&self) -> usize {
        self.running()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl AnimationScheduler for TimelineScheduler {
    fn run(&self, sequence: AnimationSequence, duration: Duration, completion: Completion) {
        debug!(
            sequence = sequence.name(),
            id = completion.id().0,
            duration_ms = duration.as_millis() as u64,
            "scheduler: starting sequence"
        );
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            completion.complete();
        });
        let mut running = self.running();
        running.retain(|handle| !handle.is_finished());
        running.push(handle);
    }

    fn revert_all(&self) {
        let handles: Vec<JoinHandle<()>> = self.running().drain(..).collect();
        if !handles.is_empty() {
            debug!(count = handles.len(), "scheduler: reverting pending sequences");
        }
        for handle in handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
