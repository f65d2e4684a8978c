//! Normalization boundary for the remote status payload.
//!
//! Everything that reads the loosely-shaped status JSON lives here. Callers
//! only ever see [`NormalizedStatus`], which is fully populated.

use serde_json::{Map, Value};

use crate::PipelineVariant;

/// Whether the backend reports the pipeline as usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Inactive,
    Active,
}

/// Canonical status snapshot. Every count is zero when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedStatus {
    pub discovered: u64,
    pub scrape_ready_count: u64,
    pub scraped: u64,
    pub emails_found: u64,
    pub emails_verified: u64,
    pub leads: u64,
    pub drafting_ready_count: u64,
    pub drafted: u64,
    pub send_ready_count: u64,
    pub sent: u64,
    pub followup_ready: u64,
    pub activity: Activity,
    /// Human-readable explanation, only carried when inactive.
    pub reason: Option<String>,
}

impl NormalizedStatus {
    /// The all-zero inactive snapshot.
    pub fn inactive(reason: Option<String>) -> Self {
        Self {
            reason,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.activity == Activity::Active
    }

    fn slot_mut(&mut self, field: Field) -> &mut u64 {
        match field {
            Field::Discovered => &mut self.discovered,
            Field::ScrapeReady => &mut self.scrape_ready_count,
            Field::Scraped => &mut self.scraped,
            Field::EmailsFound => &mut self.emails_found,
            Field::EmailsVerified => &mut self.emails_verified,
            Field::Leads => &mut self.leads,
            Field::DraftingReady => &mut self.drafting_ready_count,
            Field::Drafted => &mut self.drafted,
            Field::SendReady => &mut self.send_ready_count,
            Field::Sent => &mut self.sent,
            Field::FollowupReady => &mut self.followup_ready,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Discovered,
    ScrapeReady,
    Scraped,
    EmailsFound,
    EmailsVerified,
    Leads,
    DraftingReady,
    Drafted,
    SendReady,
    Sent,
    FollowupReady,
}

const FIELDS: [Field; 11] = [
    Field::Discovered,
    Field::ScrapeReady,
    Field::Scraped,
    Field::EmailsFound,
    Field::EmailsVerified,
    Field::Leads,
    Field::DraftingReady,
    Field::Drafted,
    Field::SendReady,
    Field::Sent,
    Field::FollowupReady,
];

/// Envelope keys the counts may be nested under.
const ENVELOPES: [&str; 3] = ["data", "counts", "status"];

const INACTIVE_STATES: [&str; 4] = ["inactive", "not_initialized", "uninitialized", "disabled"];
const INACTIVE_FLAGS: [&str; 3] = ["initialized", "active", "enabled"];
const REASON_KEYS: [&str; 3] = ["reason", "message", "detail"];

/// Accepted spellings per canonical field, in priority order.
fn aliases(variant: PipelineVariant, field: Field) -> &'static [&'static str] {
    match (variant, field) {
        (PipelineVariant::Website, Field::Discovered) => {
            &["discovered", "discoveredCount", "discovered_count", "websites_discovered"]
        }
        (PipelineVariant::Social, Field::Discovered) => &[
            "discovered",
            "profiles_discovered",
            "profilesDiscovered",
            "discovered_count",
        ],
        (_, Field::ScrapeReady) => &["scrape_ready_count", "scrapeReadyCount", "scrape_ready"],
        (_, Field::Scraped) => &["scraped", "scrapedCount", "scraped_count"],
        (_, Field::EmailsFound) => &["emails_found", "emailsFound", "email_found"],
        (_, Field::EmailsVerified) => &["emails_verified", "emailsVerified", "verified"],
        (PipelineVariant::Website, Field::Leads) => &["leads", "leadsCount", "leads_count"],
        (PipelineVariant::Social, Field::Leads) => {
            &["leads", "qualified", "qualified_count", "qualifiedCount"]
        }
        (PipelineVariant::Website, Field::DraftingReady) => &[
            "drafting_ready_count",
            "draftingReadyCount",
            "drafting_ready",
            "draft_ready",
        ],
        (PipelineVariant::Social, Field::DraftingReady) => &[
            "drafting_ready_count",
            "draftingReadyCount",
            "drafting_ready",
            "drafts_ready",
        ],
        (_, Field::Drafted) => &["drafted", "draftedCount", "drafted_count"],
        (_, Field::SendReady) => &["send_ready_count", "sendReadyCount", "send_ready"],
        (_, Field::Sent) => &["sent", "sentCount", "sent_count"],
        (_, Field::FollowupReady) => &[
            "followup_ready",
            "followupReady",
            "followup_ready_count",
            "follow_up_ready",
        ],
    }
}

/// Converts a raw status payload into a canonical snapshot.
///
/// `None` signals an unavailable backend. Never fails: anything that cannot be
/// interpreted degrades to the all-zero inactive snapshot.
pub fn normalize(variant: PipelineVariant, raw: Option<&Value>) -> NormalizedStatus {
    let Some(object) = raw.and_then(Value::as_object) else {
        return NormalizedStatus::inactive(None);
    };

    let scopes = scopes(object);
    if let Some(reason) = scopes.iter().find_map(|scope| inactive_reason(scope)) {
        return NormalizedStatus::inactive(reason);
    }

    let mut status = NormalizedStatus {
        activity: Activity::Active,
        ..NormalizedStatus::default()
    };
    for field in FIELDS {
        *status.slot_mut(field) = lookup(&scopes, aliases(variant, field));
    }
    status
}

fn scopes(object: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    let mut scopes = vec![object];
    for key in ENVELOPES {
        if let Some(inner) = object.get(key).and_then(Value::as_object) {
            scopes.push(inner);
        }
    }
    scopes
}

/// `Some(reason)` when the scope marks the feature as not initialized.
fn inactive_reason(scope: &Map<String, Value>) -> Option<Option<String>> {
    let state_marked = ["status", "state"]
        .iter()
        .filter_map(|key| scope.get(*key).and_then(Value::as_str))
        .any(|state| {
            INACTIVE_STATES
                .iter()
                .any(|inactive| state.trim().eq_ignore_ascii_case(inactive))
        });
    let flag_marked = INACTIVE_FLAGS
        .iter()
        .any(|key| scope.get(*key) == Some(&Value::Bool(false)));

    if !(state_marked || flag_marked) {
        return None;
    }

    let reason = REASON_KEYS
        .iter()
        .find_map(|key| scope.get(*key).and_then(Value::as_str))
        .map(ToOwned::to_owned);
    Some(reason)
}

fn lookup(scopes: &[&Map<String, Value>], names: &[&str]) -> u64 {
    names
        .iter()
        .find_map(|name| {
            scopes
                .iter()
                .find_map(|scope| scope.get(*name).filter(|value| !value.is_null()))
        })
        .map_or(0, coerce_count)
}

/// Coerces a JSON value into a non-negative count.
pub(crate) fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                unsigned
            } else {
                number.as_f64().map_or(0, float_count)
            }
        }
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(float_count))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn float_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        // `as` saturates at u64::MAX and truncates the fraction.
        value as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coerce_handles_odd_shapes() {
        assert_eq!(coerce_count(&json!(7)), 7);
        assert_eq!(coerce_count(&json!(-3)), 0);
        assert_eq!(coerce_count(&json!(4.9)), 4);
        assert_eq!(coerce_count(&json!(" 12 ")), 12);
        assert_eq!(coerce_count(&json!("NaN")), 0);
        assert_eq!(coerce_count(&json!("-1")), 0);
        assert_eq!(coerce_count(&json!(true)), 0);
        assert_eq!(coerce_count(&json!([1])), 0);
    }

    #[test]
    fn first_present_alias_wins() {
        let raw = json!({ "totalScraped": 1, "scraped_count": 9, "scrapedCount": 4 });
        let status = normalize(PipelineVariant::Website, Some(&raw));
        assert_eq!(status.scraped, 4);
    }

    #[test]
    fn null_alias_falls_through_to_next_spelling() {
        let raw = json!({ "emails_found": null, "emailsFound": 6 });
        let status = normalize(PipelineVariant::Website, Some(&raw));
        assert_eq!(status.emails_found, 6);
    }

    #[test]
    fn top_level_beats_envelope() {
        let raw = json!({ "sent": 2, "data": { "sent": 5, "drafted": 3 } });
        let status = normalize(PipelineVariant::Website, Some(&raw));
        assert_eq!(status.sent, 2);
        assert_eq!(status.drafted, 3);
    }

    #[test]
    fn social_spellings_map_onto_canonical_fields() {
        let raw = json!({ "profiles_discovered": 11, "qualified": 4, "drafts_ready": 2 });
        let status = normalize(PipelineVariant::Social, Some(&raw));
        assert_eq!(status.discovered, 11);
        assert_eq!(status.leads, 4);
        assert_eq!(status.drafting_ready_count, 2);

        let website = normalize(PipelineVariant::Website, Some(&raw));
        assert_eq!(website.discovered, 0);
        assert_eq!(website.leads, 0);
    }
}
