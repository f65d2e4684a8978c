use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{Job, JobId, JobKind, JobStatus};

/// Rearm fallback when a scheduled follow-up refresh is never issued.
pub const COMPLETION_COOLDOWN: Duration = Duration::from_secs(2);

/// One-shot detector for jobs that finish between polls.
///
/// A job counts as finished only when it was last observed pending or running
/// and is now observed completed. Jobs first seen already completed never
/// fire, and a completed job that keeps appearing in later polls fires once.
///
/// The guard is raised by [`CompletionWatch::observe`] before the caller
/// schedules the follow-up refresh, and lowered by
/// [`CompletionWatch::refresh_issued`] once that refresh has been requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionWatch {
    watched: Vec<JobKind>,
    last_seen: HashMap<JobId, JobStatus>,
    raised_at: Option<Instant>,
    cooldown: Duration,
}

impl CompletionWatch {
    pub fn new(watched: Vec<JobKind>, cooldown: Duration) -> Self {
        Self {
            watched,
            last_seen: HashMap::new(),
            raised_at: None,
            cooldown,
        }
    }

    /// Records one poll's job list. Returns `true` when a follow-up refresh
    /// should be scheduled.
    pub fn observe(&mut self, jobs: &[Job], now: Instant) -> bool {
        let mut finished = false;
        let mut seen = HashMap::with_capacity(jobs.len());
        for job in jobs.iter().filter(|job| self.watched.contains(&job.kind)) {
            let was_in_progress = self
                .last_seen
                .get(&job.id)
                .is_some_and(|status| status.is_in_progress());
            if was_in_progress && job.status == JobStatus::Completed {
                finished = true;
            }
            seen.insert(job.id.clone(), job.status);
        }
        self.last_seen = seen;

        if !finished {
            return false;
        }
        if let Some(raised_at) = self.raised_at {
            if now.saturating_duration_since(raised_at) < self.cooldown {
                return false;
            }
        }
        self.raised_at = Some(now);
        true
    }

    /// Lowers the guard after the follow-up refresh was requested.
    pub fn refresh_issued(&mut self) {
        self.raised_at = None;
    }

    pub fn is_raised(&self) -> bool {
        self.raised_at.is_some()
    }
}

impl Default for CompletionWatch {
    fn default() -> Self {
        Self::new(Vec::new(), COMPLETION_COOLDOWN)
    }
}
