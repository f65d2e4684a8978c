use crate::NormalizedStatus;

/// Per-stage ready counts.
///
/// Counts that only depend on fields the engine can see are derived here.
/// Counts that depend on predicates only the backend can evaluate (draft
/// status, send status, follow-up schedule) are copied verbatim and must
/// never be recomputed from other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub scrape_ready: u64,
    pub verify_ready: u64,
    pub draft_ready: u64,
    pub send_ready: u64,
    pub followup_ready: u64,
}

impl Readiness {
    pub fn derive(status: &NormalizedStatus) -> Self {
        let verify_ready = if status.scraped > 0 {
            status.emails_found.saturating_sub(status.emails_verified)
        } else {
            0
        };

        Self {
            scrape_ready: status.scrape_ready_count,
            verify_ready,
            draft_ready: status.drafting_ready_count,
            send_ready: status.send_ready_count,
            followup_ready: status.followup_ready,
        }
    }
}
