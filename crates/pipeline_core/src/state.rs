use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::view_model::PipelineView;
use crate::{CompletionWatch, PipelineVariant, Snapshot, StageId, COMPLETION_COOLDOWN};

/// Handle for one refresh cycle. Later tokens supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshToken(u64);

impl RefreshToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling delays the state machine hands to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub debounce: Duration,
    pub completion_refresh_delay: Duration,
    pub completion_cooldown: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            completion_refresh_delay: Duration::from_secs(2),
            completion_cooldown: COMPLETION_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Active,
    Deactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Refused locally; no request was sent.
    Refused,
    /// Sent to the backend, awaiting its answer.
    Dispatched,
    /// Accepted by the backend.
    Accepted,
    /// Rejected by the backend.
    Rejected,
}

/// Latest action feedback for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub stage: StageId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    variant: PipelineVariant,
    timing: Timing,
    lifecycle: Lifecycle,
    next_token: u64,
    in_flight: Option<RefreshToken>,
    debounce_generation: u64,
    armed_debounce: Option<u64>,
    snapshot: Snapshot,
    completion: CompletionWatch,
    notice: Option<Notice>,
    /// Stages whose action was sent and not yet answered.
    dispatching: BTreeSet<StageId>,
    dirty: bool,
}

impl SyncState {
    pub fn new(variant: PipelineVariant, timing: Timing) -> Self {
        Self {
            variant,
            timing,
            lifecycle: Lifecycle::Idle,
            next_token: 0,
            in_flight: None,
            debounce_generation: 0,
            armed_debounce: None,
            snapshot: Snapshot::unavailable(variant, None),
            completion: CompletionWatch::new(variant.watched_kinds(), timing.completion_cooldown),
            notice: None,
            dispatching: BTreeSet::new(),
            dirty: false,
        }
    }

    pub fn view(&self) -> PipelineView {
        PipelineView {
            variant: self.variant,
            status: self.snapshot.status.clone(),
            readiness: self.snapshot.readiness,
            stages: self
                .snapshot
                .stages
                .iter()
                .map(|stage| {
                    let mut stage = stage.clone();
                    stage.enabled &= !self.dispatching.contains(&stage.id);
                    stage
                })
                .collect(),
            notice: self.notice.clone(),
            refreshing: self.in_flight.is_some() || self.armed_debounce.is_some(),
            dirty: self.dirty,
        }
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn in_flight(&self) -> Option<RefreshToken> {
        self.in_flight
    }

    pub fn is_dispatching(&self, stage: StageId) -> bool {
        self.dispatching.contains(&stage)
    }

    pub fn completion_guard_raised(&self) -> bool {
        self.completion.is_raised()
    }

    /// Returns whether anything visible changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn activate(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Idle {
            return false;
        }
        self.lifecycle = Lifecycle::Active;
        true
    }

    pub(crate) fn deactivate(&mut self) {
        self.lifecycle = Lifecycle::Deactivated;
        self.in_flight = None;
        self.armed_debounce = None;
        self.dispatching.clear();
    }

    /// Supersedes the in-flight token and re-arms the debounce timer.
    /// Returns the token to abort, if any, and the new debounce generation.
    pub(crate) fn supersede(&mut self) -> (Option<RefreshToken>, u64) {
        let aborted = self.in_flight.take();
        self.debounce_generation += 1;
        self.armed_debounce = Some(self.debounce_generation);
        self.dirty = true;
        (aborted, self.debounce_generation)
    }

    /// Claims the debounce timer if `generation` is still the armed one.
    pub(crate) fn fire_debounce(&mut self, generation: u64) -> Option<RefreshToken> {
        if self.armed_debounce != Some(generation) {
            return None;
        }
        self.armed_debounce = None;
        self.next_token += 1;
        let token = RefreshToken(self.next_token);
        self.in_flight = Some(token);
        Some(token)
    }

    /// Accepts a completed refresh only for the current token.
    pub(crate) fn accept(&mut self, token: RefreshToken) -> bool {
        if self.in_flight != Some(token) {
            return false;
        }
        self.in_flight = None;
        true
    }

    pub(crate) fn replace_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.dirty = true;
    }

    pub(crate) fn completion_mut(&mut self) -> &mut CompletionWatch {
        &mut self.completion
    }

    /// Marks `stage` as awaiting the backend. Returns `false` if it already was.
    pub(crate) fn begin_dispatch(&mut self, stage: StageId) -> bool {
        self.dispatching.insert(stage)
    }

    pub(crate) fn finish_dispatch(&mut self, stage: StageId) {
        if self.dispatching.remove(&stage) {
            self.dirty = true;
        }
    }

    pub(crate) fn set_notice(&mut self, kind: NoticeKind, stage: StageId, message: String) {
        self.notice = Some(Notice {
            kind,
            stage,
            message,
        });
        self.dirty = true;
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(PipelineVariant::default(), Timing::default())
    }
}
