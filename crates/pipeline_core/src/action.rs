use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::{NormalizedStatus, PipelineVariant, Readiness, StageId};

/// Remote operation behind a stage's call-to-action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageAction {
    Discover,
    Scrape,
    Verify,
    Qualify,
    Draft,
    Send,
    FollowUp,
}

impl StageAction {
    /// Last path segment of the action endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            StageAction::Discover => "discover",
            StageAction::Scrape => "scrape",
            StageAction::Verify => "verify",
            StageAction::Qualify => "qualify",
            StageAction::Draft => "draft",
            StageAction::Send => "send",
            StageAction::FollowUp => "followup",
        }
    }
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Which records an action should target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetSelection {
    /// Let the backend pick every eligible record.
    #[default]
    AutoSelect,
    /// Explicit record IDs.
    Ids(Vec<String>),
}

impl Serialize for TargetSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            TargetSelection::AutoSelect => map.serialize_entry("auto_select", &true)?,
            TargetSelection::Ids(ids) => map.serialize_entry("ids", ids)?,
        }
        map.end()
    }
}

/// Backend acknowledgment of an accepted action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionAck {
    pub job_id: Option<String>,
    pub affected: Option<u64>,
    pub message: Option<String>,
}

impl ActionAck {
    /// Human-readable summary; prefers the backend's own message.
    pub fn describe(&self, stage: StageId) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        let mut text = format!("{stage} started");
        if let Some(affected) = self.affected {
            text.push_str(&format!(" for {affected} records"));
        }
        if let Some(job_id) = &self.job_id {
            text.push_str(&format!(" (job {job_id})"));
        }
        text
    }
}

/// Local refusal; the remote call was never issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage}: {message}")]
pub struct GuardRefusal {
    pub stage: StageId,
    pub message: String,
}

impl GuardRefusal {
    fn new(stage: StageId, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Re-checks a stage's readiness precondition before dispatch.
///
/// Mirrors the rendered enable state so a direct invocation cannot reach the
/// backend with an action it would reject.
pub fn check_action(
    variant: PipelineVariant,
    stage: StageId,
    selection: &TargetSelection,
    status: &NormalizedStatus,
    readiness: &Readiness,
) -> Result<StageAction, GuardRefusal> {
    if !variant.has_stage(stage) {
        return Err(GuardRefusal::new(
            stage,
            format!("not part of the {variant} pipeline"),
        ));
    }
    if !status.is_active() {
        let reason = status
            .reason
            .as_deref()
            .unwrap_or("the pipeline is not initialized");
        return Err(GuardRefusal::new(stage, format!("unavailable: {reason}")));
    }
    if matches!(selection, TargetSelection::Ids(ids) if ids.is_empty()) {
        return Err(GuardRefusal::new(stage, "no records selected"));
    }

    let missing = match stage {
        StageId::Discovery => None,
        StageId::Scraping if readiness.scrape_ready == 0 => {
            Some(format!("no {} are ready for scraping", variant.subject()))
        }
        StageId::Verification if readiness.verify_ready == 0 => {
            Some("no scraped emails are awaiting verification".to_string())
        }
        StageId::Qualification if status.discovered == 0 => {
            Some(format!("no discovered {} to qualify", variant.subject()))
        }
        StageId::Drafting if readiness.draft_ready == 0 => {
            Some("no leads are ready for drafting".to_string())
        }
        StageId::Sending if readiness.send_ready == 0 => {
            Some("no drafts are ready to send".to_string())
        }
        StageId::FollowUp if readiness.followup_ready == 0 => {
            Some("no contacts are due for a follow-up".to_string())
        }
        _ => None,
    };

    match missing {
        Some(message) => Err(GuardRefusal::new(stage, message)),
        None => Ok(stage.action()),
    }
}
