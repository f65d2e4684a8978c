use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub type JobId = String;

/// What a background job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "String")]
pub enum JobKind {
    Discover,
    Scrape,
    Verify,
    Qualify,
    Draft,
    Send,
    Followup,
    /// Any kind this engine has no stage for.
    Other,
}

impl From<String> for JobKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "discover" | "discovery" | "social_discover" | "social_discovery" => JobKind::Discover,
            "scrape" | "scraping" => JobKind::Scrape,
            "verify" | "verification" => JobKind::Verify,
            "qualify" | "qualification" | "review" => JobKind::Qualify,
            "draft" | "drafting" => JobKind::Draft,
            "send" | "sending" => JobKind::Send,
            "followup" | "follow_up" | "follow-up" => JobKind::Followup,
            _ => JobKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Other,
}

impl JobStatus {
    pub fn is_in_progress(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Pending,
            "running" | "in_progress" | "started" => JobStatus::Running,
            "completed" | "complete" | "done" | "succeeded" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Other,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other => "unknown",
        };
        f.write_str(text)
    }
}

/// A background operation owned by the backend. Read-only here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: JobId,
    #[serde(alias = "job_type", alias = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Latest job of `kind`, by `created_at`. Ties keep the first listed job.
pub fn latest_job(jobs: &[Job], kind: JobKind) -> Option<&Job> {
    jobs.iter()
        .filter(|job| job.kind == kind)
        .fold(None, |latest: Option<&Job>, job| match latest {
            Some(current) if current.created_at >= job.created_at => Some(current),
            _ => Some(job),
        })
}

/// Most recent job per kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LatestJobs {
    by_kind: BTreeMap<JobKind, Job>,
}

impl LatestJobs {
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut by_kind = BTreeMap::new();
        for job in jobs {
            if job.kind == JobKind::Other || by_kind.contains_key(&job.kind) {
                continue;
            }
            if let Some(latest) = latest_job(jobs, job.kind) {
                by_kind.insert(job.kind, latest.clone());
            }
        }
        Self { by_kind }
    }

    pub fn get(&self, kind: JobKind) -> Option<&Job> {
        self.by_kind.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn is_in_progress(&self, kind: JobKind) -> bool {
        self.get(kind)
            .is_some_and(|job| job.status.is_in_progress())
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<JobId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "job id must be a string or number, got {other}"
        ))),
    }
}

/// Accepts RFC 3339 and naive ISO-8601 timestamps; naive ones are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp {raw:?}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
