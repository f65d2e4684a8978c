use std::fmt;

use crate::action::check_action;
use crate::{
    JobKind, JobStatus, LatestJobs, NormalizedStatus, PipelineVariant, Readiness, StageAction,
    TargetSelection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    Discovery,
    Scraping,
    Verification,
    Qualification,
    Drafting,
    Sending,
    FollowUp,
}

impl StageId {
    pub fn name(self) -> &'static str {
        match self {
            StageId::Discovery => "Discovery",
            StageId::Scraping => "Scraping",
            StageId::Verification => "Verification",
            StageId::Qualification => "Qualification",
            StageId::Drafting => "Drafting",
            StageId::Sending => "Sending",
            StageId::FollowUp => "Follow-up",
        }
    }

    pub fn job_kind(self) -> JobKind {
        match self {
            StageId::Discovery => JobKind::Discover,
            StageId::Scraping => JobKind::Scrape,
            StageId::Verification => JobKind::Verify,
            StageId::Qualification => JobKind::Qualify,
            StageId::Drafting => JobKind::Draft,
            StageId::Sending => JobKind::Send,
            StageId::FollowUp => JobKind::Followup,
        }
    }

    pub fn action(self) -> StageAction {
        match self {
            StageId::Discovery => StageAction::Discover,
            StageId::Scraping => StageAction::Scrape,
            StageId::Verification => StageAction::Verify,
            StageId::Qualification => StageAction::Qualify,
            StageId::Drafting => StageAction::Draft,
            StageId::Sending => StageAction::Send,
            StageId::FollowUp => StageAction::FollowUp,
        }
    }

    fn in_progress_label(self) -> &'static str {
        match self {
            StageId::Discovery => "Discovering…",
            StageId::Scraping => "Scraping…",
            StageId::Verification => "Verifying…",
            StageId::Qualification => "Qualifying…",
            StageId::Drafting => "Drafting…",
            StageId::Sending => "Sending…",
            StageId::FollowUp => "Following up…",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            StageId::Discovery => "Discover",
            StageId::Scraping => "Scrape",
            StageId::Verification => "Verify",
            StageId::Qualification => "Qualify",
            StageId::Drafting => "Draft",
            StageId::Sending => "Send",
            StageId::FollowUp => "Follow up",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageStatus {
    Locked,
    Active,
    Completed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StageStatus::Locked => "locked",
            StageStatus::Active => "active",
            StageStatus::Completed => "completed",
        };
        f.write_str(text)
    }
}

/// Derived per-stage view, recomputed on every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageState {
    pub id: StageId,
    pub name: &'static str,
    pub status: StageStatus,
    /// Progress metric shown next to the stage.
    pub count: u64,
    pub cta_label: String,
    /// Operation the call-to-action runs.
    pub action: StageAction,
    /// Whether the dispatch guard currently accepts `action`.
    pub enabled: bool,
    pub job_status: Option<JobStatus>,
}

/// Builds one [`StageState`] per stage of `variant`, in pipeline order.
///
/// A stage's state depends only on its own and upstream counts, plus the
/// latest job of its kind.
pub fn derive_stages(
    variant: PipelineVariant,
    status: &NormalizedStatus,
    readiness: &Readiness,
    jobs: &LatestJobs,
) -> Vec<StageState> {
    variant
        .stages()
        .iter()
        .map(|&id| {
            let job_status = jobs.get(id.job_kind()).map(|job| job.status);
            let stage_status = resolve_status(id, status, readiness, jobs);
            let enabled =
                check_action(variant, id, &TargetSelection::AutoSelect, status, readiness).is_ok();
            StageState {
                id,
                name: id.name(),
                status: stage_status,
                count: progress_count(id, status),
                cta_label: cta_label(variant, id, stage_status, enabled, status, readiness, jobs),
                action: id.action(),
                enabled,
                job_status,
            }
        })
        .collect()
}

fn resolve_status(
    id: StageId,
    status: &NormalizedStatus,
    readiness: &Readiness,
    jobs: &LatestJobs,
) -> StageStatus {
    if jobs.is_in_progress(id.job_kind()) {
        return StageStatus::Active;
    }

    let (completed, active) = match id {
        StageId::Discovery => (status.discovered > 0, true),
        StageId::Scraping => (status.scraped > 0, readiness.scrape_ready > 0),
        StageId::Verification => (
            readiness.verify_ready == 0 && status.emails_verified > 0,
            readiness.verify_ready > 0,
        ),
        StageId::Qualification => (status.leads > 0, status.discovered > 0),
        StageId::Drafting => (status.drafted > 0, readiness.draft_ready > 0),
        StageId::Sending => (
            status.sent > 0,
            status.drafted > 0 || readiness.send_ready > 0,
        ),
        StageId::FollowUp => (false, readiness.followup_ready > 0),
    };

    if completed {
        StageStatus::Completed
    } else if active {
        StageStatus::Active
    } else {
        StageStatus::Locked
    }
}

fn progress_count(id: StageId, status: &NormalizedStatus) -> u64 {
    match id {
        StageId::Discovery => status.discovered,
        StageId::Scraping => status.scraped,
        StageId::Verification => status.emails_verified,
        StageId::Qualification => status.leads,
        StageId::Drafting => status.drafted,
        StageId::Sending => status.sent,
        StageId::FollowUp => status.followup_ready,
    }
}

/// Ready count used in the call-to-action, when the stage has one.
fn ready_count(id: StageId, readiness: &Readiness) -> Option<u64> {
    match id {
        StageId::Discovery | StageId::Qualification => None,
        StageId::Scraping => Some(readiness.scrape_ready),
        StageId::Verification => Some(readiness.verify_ready),
        StageId::Drafting => Some(readiness.draft_ready),
        StageId::Sending => Some(readiness.send_ready),
        StageId::FollowUp => Some(readiness.followup_ready),
    }
}

fn cta_label(
    variant: PipelineVariant,
    id: StageId,
    stage_status: StageStatus,
    enabled: bool,
    status: &NormalizedStatus,
    readiness: &Readiness,
    jobs: &LatestJobs,
) -> String {
    if !status.is_active() {
        return "Unavailable".to_string();
    }
    if jobs.is_in_progress(id.job_kind()) {
        return id.in_progress_label().to_string();
    }
    if enabled {
        return match (id, ready_count(id, readiness)) {
            (StageId::Discovery, _) => format!("Discover {}", variant.subject()),
            (_, Some(ready)) => format!("{} {ready}", id.verb()),
            (_, None) => id.verb().to_string(),
        };
    }
    if stage_status == StageStatus::Completed {
        return "Done".to_string();
    }
    match upstream(variant, id) {
        Some(previous) => format!("Waiting for {}", previous.name().to_lowercase()),
        None => "Nothing to do".to_string(),
    }
}

fn upstream(variant: PipelineVariant, id: StageId) -> Option<StageId> {
    let stages = variant.stages();
    let position = stages.iter().position(|stage| *stage == id)?;
    position.checked_sub(1).map(|previous| stages[previous])
}
