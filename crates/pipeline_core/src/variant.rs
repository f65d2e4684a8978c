use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{JobKind, StageId};

/// Which outreach pipeline the engine is synchronizing.
///
/// Both variants share the same engine; they differ in status field spellings
/// and in the stages they expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    #[default]
    Website,
    Social,
}

const WEBSITE_STAGES: [StageId; 6] = [
    StageId::Discovery,
    StageId::Scraping,
    StageId::Verification,
    StageId::Drafting,
    StageId::Sending,
    StageId::FollowUp,
];

const SOCIAL_STAGES: [StageId; 5] = [
    StageId::Discovery,
    StageId::Qualification,
    StageId::Drafting,
    StageId::Sending,
    StageId::FollowUp,
];

impl PipelineVariant {
    pub fn name(self) -> &'static str {
        match self {
            PipelineVariant::Website => "website",
            PipelineVariant::Social => "social",
        }
    }

    /// Stages in fixed pipeline order.
    pub fn stages(self) -> &'static [StageId] {
        match self {
            PipelineVariant::Website => &WEBSITE_STAGES,
            PipelineVariant::Social => &SOCIAL_STAGES,
        }
    }

    pub fn has_stage(self, stage: StageId) -> bool {
        self.stages().contains(&stage)
    }

    /// Job kinds whose completion should pull a fresh status.
    pub fn watched_kinds(self) -> Vec<JobKind> {
        self.stages().iter().map(|stage| stage.job_kind()).collect()
    }

    /// Noun used for the units flowing through discovery.
    pub fn subject(self) -> &'static str {
        match self {
            PipelineVariant::Website => "websites",
            PipelineVariant::Social => "profiles",
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
