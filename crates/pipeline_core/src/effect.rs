use std::time::Duration;

use crate::{RefreshToken, StageAction, StageId, TargetSelection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start the debounce timer, replacing any timer not yet fired.
    ArmDebounce { generation: u64, delay: Duration },
    /// Abort the in-flight refresh tied to `token`.
    AbortFetch { token: RefreshToken },
    /// Fetch status and jobs under `token`.
    StartFetch { token: RefreshToken },
    /// Deliver `Msg::FollowUpDue` after `delay`.
    ScheduleFollowUp { delay: Duration },
    /// Invoke a stage's remote action.
    Dispatch {
        stage: StageId,
        action: StageAction,
        selection: TargetSelection,
    },
    /// Cancel every timer, fetch and dispatch.
    CancelAll,
}
