use std::time::Instant;

use serde_json::Value;

use crate::{ActionAck, Job, RefreshToken, StageId, TargetSelection};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Engine started; schedules the initial refresh.
    Activated,
    /// Something asked for fresh status.
    RefreshRequested(RefreshTrigger),
    /// The debounce timer armed with `generation` fired.
    DebounceElapsed { generation: u64 },
    /// A refresh cycle finished (or failed) for `token`.
    RefreshCompleted {
        token: RefreshToken,
        outcome: RefreshOutcome,
        observed_at: Instant,
    },
    /// The delayed refresh after a job completion is due.
    FollowUpDue,
    /// Run a stage's action.
    ActionRequested {
        stage: StageId,
        selection: TargetSelection,
    },
    /// The backend answered an action; `Err` carries its message verbatim.
    ActionCompleted {
        stage: StageId,
        result: Result<ActionAck, String>,
    },
    /// Engine torn down; nothing is applied after this.
    Deactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Activation,
    Interval,
    Manual,
    JobCompleted,
    ActionDispatched,
}

/// Result of fetching status and jobs under one token.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Fetched {
        /// `None` means the backend reported the feature as absent.
        status: Option<Value>,
        jobs: Vec<Job>,
    },
    Failed { error: String },
}
