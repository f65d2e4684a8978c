use serde_json::Value;

use crate::{
    derive_stages, normalize, Job, LatestJobs, NormalizedStatus, PipelineVariant, Readiness,
    StageId, StageState,
};

/// Everything derived from one accepted poll. Replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub status: NormalizedStatus,
    pub readiness: Readiness,
    pub jobs: LatestJobs,
    pub stages: Vec<StageState>,
}

impl Snapshot {
    pub fn from_status(variant: PipelineVariant, status: NormalizedStatus, jobs: &[Job]) -> Self {
        let readiness = Readiness::derive(&status);
        let jobs = LatestJobs::from_jobs(jobs);
        let stages = derive_stages(variant, &status, &readiness, &jobs);
        Self {
            status,
            readiness,
            jobs,
            stages,
        }
    }

    pub fn from_raw(variant: PipelineVariant, raw: Option<&Value>, jobs: &[Job]) -> Self {
        Self::from_status(variant, normalize(variant, raw), jobs)
    }

    /// Inactive default shown while the backend cannot be reached.
    pub fn unavailable(variant: PipelineVariant, reason: Option<String>) -> Self {
        Self::from_status(variant, NormalizedStatus::inactive(reason), &[])
    }

    pub fn stage(&self, id: StageId) -> Option<&StageState> {
        self.stages.iter().find(|stage| stage.id == id)
    }
}
