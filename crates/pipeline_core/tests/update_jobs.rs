use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use pipeline_core::{
    latest_job, update, CompletionWatch, Effect, Job, JobKind, JobStatus, LatestJobs, Msg,
    PipelineVariant, RefreshOutcome, RefreshToken, RefreshTrigger, StageId, StageStatus,
    SyncState, Timing,
};
use serde_json::json;

fn job(id: &str, kind: JobKind, status: JobStatus, minute: u32) -> Job {
    Job {
        id: id.to_string(),
        kind,
        status,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
        error_message: None,
        result: None,
    }
}

fn watch() -> CompletionWatch {
    CompletionWatch::new(
        PipelineVariant::Website.watched_kinds(),
        Duration::from_secs(2),
    )
}

#[test]
fn latest_job_picks_newest_of_kind() {
    let jobs = vec![
        job("old", JobKind::Scrape, JobStatus::Completed, 1),
        job("draft", JobKind::Draft, JobStatus::Running, 9),
        job("new", JobKind::Scrape, JobStatus::Failed, 5),
        job("mid", JobKind::Scrape, JobStatus::Completed, 3),
    ];

    assert_eq!(latest_job(&jobs, JobKind::Scrape).unwrap().id, "new");
    assert_eq!(latest_job(&jobs, JobKind::Draft).unwrap().id, "draft");
    assert!(latest_job(&jobs, JobKind::Send).is_none());
}

#[test]
fn latest_job_tie_keeps_first_listed() {
    let jobs = vec![
        job("first", JobKind::Verify, JobStatus::Running, 4),
        job("second", JobKind::Verify, JobStatus::Completed, 4),
    ];
    assert_eq!(latest_job(&jobs, JobKind::Verify).unwrap().id, "first");
}

#[test]
fn latest_jobs_ignores_unknown_kinds() {
    let jobs = vec![job("x", JobKind::Other, JobStatus::Running, 1)];
    let latest = LatestJobs::from_jobs(&jobs);
    assert!(latest.is_empty());
}

#[test]
fn completion_fires_once_per_transition() {
    let mut watch = watch();
    let start = Instant::now();

    assert!(!watch.observe(&[job("s1", JobKind::Scrape, JobStatus::Pending, 1)], start));
    assert!(!watch.observe(&[job("s1", JobKind::Scrape, JobStatus::Running, 1)], start));
    assert!(watch.observe(
        &[job("s1", JobKind::Scrape, JobStatus::Completed, 1)],
        start + Duration::from_secs(10),
    ));
    assert!(watch.is_raised());
    watch.refresh_issued();

    // Later polls still see the completed job; nothing fires.
    for poll in 1..5 {
        assert!(!watch.observe(
            &[job("s1", JobKind::Scrape, JobStatus::Completed, 1)],
            start + Duration::from_secs(10 + poll * 10),
        ));
    }
}

#[test]
fn jobs_first_seen_completed_never_fire() {
    let mut watch = watch();
    assert!(!watch.observe(
        &[job("done", JobKind::Draft, JobStatus::Completed, 1)],
        Instant::now(),
    ));
}

#[test]
fn failed_jobs_and_unwatched_kinds_never_fire() {
    let mut watch = watch();
    let now = Instant::now();
    watch.observe(
        &[
            job("a", JobKind::Send, JobStatus::Running, 1),
            job("b", JobKind::Other, JobStatus::Running, 1),
        ],
        now,
    );
    assert!(!watch.observe(
        &[
            job("a", JobKind::Send, JobStatus::Failed, 1),
            job("b", JobKind::Other, JobStatus::Completed, 1),
        ],
        now,
    ));
}

#[test]
fn raised_guard_suppresses_until_issued_or_cooldown() {
    let mut watch = watch();
    let start = Instant::now();
    let running = |id: &str| job(id, JobKind::Verify, JobStatus::Running, 1);
    let completed = |id: &str| job(id, JobKind::Verify, JobStatus::Completed, 1);

    watch.observe(&[running("a"), running("b"), running("c")], start);
    assert!(watch.observe(&[completed("a"), running("b"), running("c")], start));

    // Guard still raised: a second completion inside the cooldown is absorbed.
    assert!(!watch.observe(
        &[completed("a"), completed("b"), running("c")],
        start + Duration::from_millis(500),
    ));

    // Follow-up never issued; the cooldown rearms the guard.
    assert!(watch.observe(
        &[completed("a"), completed("b"), completed("c")],
        start + Duration::from_secs(3),
    ));
}

fn refreshed(state: SyncState, jobs: Vec<Job>, observed_at: Instant) -> (SyncState, Vec<Effect>) {
    let (state, effects) = update(state, Msg::RefreshRequested(RefreshTrigger::Interval));
    let generation = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::ArmDebounce { generation, .. } => Some(*generation),
            _ => None,
        })
        .unwrap();
    let (state, effects) = update(state, Msg::DebounceElapsed { generation });
    let token: RefreshToken = match effects.as_slice() {
        [Effect::StartFetch { token }] => *token,
        other => panic!("unexpected effects {other:?}"),
    };
    update(
        state,
        Msg::RefreshCompleted {
            token,
            outcome: RefreshOutcome::Fetched {
                status: Some(json!({ "discovered": 4, "scrape_ready_count": 4 })),
                jobs,
            },
            observed_at,
        },
    )
}

fn follow_ups(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, Effect::ScheduleFollowUp { .. }))
        .count()
}

#[test]
fn job_completion_schedules_exactly_one_follow_up_refresh() {
    let timing = Timing::default();
    let (state, _) = update(
        SyncState::new(PipelineVariant::Website, timing),
        Msg::Activated,
    );
    let start = Instant::now();

    let (state, effects) = refreshed(
        state,
        vec![job("s1", JobKind::Scrape, JobStatus::Pending, 1)],
        start,
    );
    assert_eq!(follow_ups(&effects), 0);
    let scraping = state.snapshot().stage(StageId::Scraping).unwrap().clone();
    assert_eq!(scraping.status, StageStatus::Active);
    assert_eq!(scraping.cta_label, "Scraping…");

    let (state, effects) = refreshed(
        state,
        vec![job("s1", JobKind::Scrape, JobStatus::Running, 1)],
        start + Duration::from_secs(10),
    );
    assert_eq!(follow_ups(&effects), 0);

    let (state, effects) = refreshed(
        state,
        vec![job("s1", JobKind::Scrape, JobStatus::Completed, 1)],
        start + Duration::from_secs(20),
    );
    assert_eq!(
        effects,
        vec![Effect::ScheduleFollowUp {
            delay: timing.completion_refresh_delay,
        }]
    );
    assert!(state.completion_guard_raised());

    // The follow-up goes through the regular debounce path and lowers the guard.
    let (state, effects) = update(state, Msg::FollowUpDue);
    assert!(matches!(effects.as_slice(), [Effect::ArmDebounce { .. }]));
    assert!(!state.completion_guard_raised());

    let mut state = state;
    for poll in 3..8 {
        let (next, effects) = refreshed(
            state,
            vec![job("s1", JobKind::Scrape, JobStatus::Completed, 1)],
            start + Duration::from_secs(poll * 10),
        );
        assert_eq!(follow_ups(&effects), 0);
        state = next;
    }
}
