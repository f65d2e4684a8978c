//! Pipeline core: status normalization, readiness and stage gating, and the
//! pure state machine that decides when to refresh.
mod action;
mod completion;
mod effect;
mod job;
mod msg;
mod readiness;
mod snapshot;
mod stage;
mod state;
mod status;
mod update;
mod variant;
mod view_model;

pub use action::{check_action, ActionAck, GuardRefusal, StageAction, TargetSelection};
pub use completion::{CompletionWatch, COMPLETION_COOLDOWN};
pub use effect::Effect;
pub use job::{latest_job, Job, JobId, JobKind, JobStatus, LatestJobs};
pub use msg::{Msg, RefreshOutcome, RefreshTrigger};
pub use readiness::Readiness;
pub use snapshot::Snapshot;
pub use stage::{derive_stages, StageId, StageState, StageStatus};
pub use state::{Lifecycle, Notice, NoticeKind, RefreshToken, SyncState, Timing};
pub use status::{normalize, Activity, NormalizedStatus};
pub use update::update;
pub use variant::PipelineVariant;
pub use view_model::PipelineView;
