use crate::{Notice, NormalizedStatus, PipelineVariant, Readiness, StageState};

/// Everything the presentation layer renders. Built from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineView {
    pub variant: PipelineVariant,
    pub status: NormalizedStatus,
    pub readiness: Readiness,
    pub stages: Vec<StageState>,
    pub notice: Option<Notice>,
    /// A refresh is debouncing or in flight.
    pub refreshing: bool,
    pub dirty: bool,
}

impl PipelineView {
    pub fn stage(&self, id: crate::StageId) -> Option<&StageState> {
        self.stages.iter().find(|stage| stage.id == id)
    }
}
