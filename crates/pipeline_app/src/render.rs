use chrono::{DateTime, TimeZone};
use pipeline_core::{NoticeKind, PipelineVariant, PipelineView, StageState};

const NAME_WIDTH: usize = 14;
const STATUS_WIDTH: usize = 10;

/// Renders the view as terminal lines, newest state only.
pub fn render<Tz>(view: &PipelineView, at: &DateTime<Tz>) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut lines = Vec::with_capacity(view.stages.len() + 3);
    lines.push(header(view, &at.format("%H:%M:%S").to_string()));
    lines.extend(view.stages.iter().map(stage_line));
    if let Some(notice) = &view.notice {
        let tag = match notice.kind {
            NoticeKind::Refused => "refused",
            NoticeKind::Dispatched => "sent",
            NoticeKind::Accepted => "ok",
            NoticeKind::Rejected => "error",
        };
        lines.push(format!("  [{tag}] {}: {}", notice.stage, notice.message));
    }
    lines
}

fn header(view: &PipelineView, time: &str) -> String {
    let name = match view.variant {
        PipelineVariant::Website => "Website pipeline",
        PipelineVariant::Social => "Social pipeline",
    };
    let state = if view.status.is_active() {
        "active".to_string()
    } else {
        match &view.status.reason {
            Some(reason) => format!("unavailable ({reason})"),
            None => "unavailable".to_string(),
        }
    };
    let refreshing = if view.refreshing { " ⟳" } else { "" };
    format!("[{time}] {name}: {state}{refreshing}")
}

fn stage_line(stage: &StageState) -> String {
    let marker = if stage.enabled { '>' } else { ' ' };
    let job = stage
        .job_status
        .map(|status| format!("  (last job {status})"))
        .unwrap_or_default();
    format!(
        "  {marker} {name:<name_width$}{status:<status_width$}{count:>6}  {cta}{job}",
        name = stage.name,
        name_width = NAME_WIDTH,
        status_width = STATUS_WIDTH,
        status = stage.status.to_string(),
        count = stage.count,
        cta = stage.cta_label,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pipeline_core::{Snapshot, StageId, SyncState, Timing};
    use serde_json::json;

    use super::*;

    fn view_of(raw: serde_json::Value) -> PipelineView {
        let snapshot = Snapshot::from_raw(PipelineVariant::Website, Some(&raw), &[]);
        PipelineView {
            variant: PipelineVariant::Website,
            status: snapshot.status,
            readiness: snapshot.readiness,
            stages: snapshot.stages,
            ..PipelineView::default()
        }
    }

    #[test]
    fn one_line_per_stage_after_header() {
        let view = view_of(json!({ "discovered": 12, "scrape_ready_count": 4 }));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        let lines = render(&view, &at);

        assert_eq!(lines[0], "[09:30:05] Website pipeline: active");
        assert_eq!(lines.len(), 1 + view.stages.len());
        let scraping = view.stage(StageId::Scraping).unwrap();
        assert!(scraping.enabled);
        assert!(lines[2].starts_with("  > Scraping"));
        assert!(lines[2].ends_with("Scrape 4"));
    }

    #[test]
    fn unavailable_pipeline_shows_reason() {
        let view = SyncState::new(PipelineVariant::Social, Timing::default()).view();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        let lines = render(&view, &at);
        assert_eq!(lines[0], "[09:30:05] Social pipeline: unavailable");
        assert!(lines[1..].iter().all(|line| line.starts_with("    ")));
    }
}
