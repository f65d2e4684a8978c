use std::time::Instant;

use pipeline_core::{
    update, ActionAck, Effect, Msg, NoticeKind, PipelineVariant, RefreshOutcome, RefreshTrigger,
    StageAction, StageId, SyncState, TargetSelection, Timing,
};
use serde_json::{json, Value};

/// Active state holding the snapshot built from `status`.
fn with_status(status: Value) -> SyncState {
    let (state, effects) = update(
        SyncState::new(PipelineVariant::Website, Timing::default()),
        Msg::Activated,
    );
    let generation = match effects.as_slice() {
        [Effect::ArmDebounce { generation, .. }] => *generation,
        other => panic!("unexpected effects {other:?}"),
    };
    let (state, effects) = update(state, Msg::DebounceElapsed { generation });
    let token = match effects.as_slice() {
        [Effect::StartFetch { token }] => *token,
        other => panic!("unexpected effects {other:?}"),
    };
    let (mut state, _) = update(
        state,
        Msg::RefreshCompleted {
            token,
            outcome: RefreshOutcome::Fetched {
                status: Some(status),
                jobs: Vec::new(),
            },
            observed_at: Instant::now(),
        },
    );
    state.consume_dirty();
    state
}

fn request(state: SyncState, stage: StageId) -> (SyncState, Vec<Effect>) {
    update(
        state,
        Msg::ActionRequested {
            stage,
            selection: TargetSelection::AutoSelect,
        },
    )
}

#[test]
fn zero_readiness_is_refused_without_a_dispatch() {
    let state = with_status(json!({ "drafted": 4, "send_ready_count": 0 }));
    let before = state.snapshot().clone();

    let (mut state, effects) = request(state, StageId::Sending);

    assert!(effects.is_empty());
    let notice = state.view().notice.expect("refusal surfaced");
    assert_eq!(notice.kind, NoticeKind::Refused);
    assert_eq!(notice.stage, StageId::Sending);
    assert_eq!(notice.message, "no drafts are ready to send");
    assert_eq!(state.snapshot(), &before);
    assert!(state.consume_dirty());
}

#[test]
fn ready_stage_dispatches_its_action() {
    let state = with_status(json!({ "drafting_ready_count": 3 }));
    let selection = TargetSelection::Ids(vec!["p-1".into(), "p-2".into()]);

    let (state, effects) = update(
        state,
        Msg::ActionRequested {
            stage: StageId::Drafting,
            selection: selection.clone(),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::Dispatch {
            stage: StageId::Drafting,
            action: StageAction::Draft,
            selection,
        }]
    );
    assert_eq!(state.view().notice.unwrap().kind, NoticeKind::Dispatched);
}

#[test]
fn accepted_action_refreshes_without_touching_counts() {
    let state = with_status(json!({ "drafting_ready_count": 3, "drafted": 0 }));
    let (state, _) = request(state, StageId::Drafting);
    let before = state.snapshot().clone();

    let (state, effects) = update(
        state,
        Msg::ActionCompleted {
            stage: StageId::Drafting,
            result: Ok(ActionAck {
                job_id: Some("job-7".into()),
                affected: Some(3),
                message: None,
            }),
        },
    );

    assert!(matches!(effects.as_slice(), [Effect::ArmDebounce { .. }]));
    assert_eq!(state.snapshot(), &before);
    let notice = state.view().notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Accepted);
    assert_eq!(notice.message, "Drafting started for 3 records (job job-7)");
}

#[test]
fn backend_rejection_is_surfaced_verbatim() {
    let state = with_status(json!({ "send_ready_count": 2 }));
    let (state, _) = request(state, StageId::Sending);
    let before = state.snapshot().clone();
    let message = "Gmail is not connected. Authorize a sender account before sending.";

    let (state, effects) = update(
        state,
        Msg::ActionCompleted {
            stage: StageId::Sending,
            result: Err(message.to_string()),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.snapshot(), &before);
    let notice = state.view().notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Rejected);
    assert_eq!(notice.message, message);
}

#[test]
fn unavailable_backend_refuses_discovery() {
    let (state, _) = update(
        SyncState::new(PipelineVariant::Social, Timing::default()),
        Msg::Activated,
    );
    let (state, effects) = request(state, StageId::Discovery);

    assert!(effects.is_empty());
    assert_eq!(
        state.view().notice.unwrap().message,
        "unavailable: the pipeline is not initialized"
    );
}

#[test]
fn actions_after_deactivation_are_dropped() {
    let state = with_status(json!({ "scrape_ready_count": 1 }));
    let (state, _) = update(state, Msg::Deactivated);
    let (state, effects) = request(state, StageId::Scraping);
    assert!(effects.is_empty());
    assert!(state.view().notice.is_none());

    let (_state, effects) = update(state, Msg::RefreshRequested(RefreshTrigger::ActionDispatched));
    assert!(effects.is_empty());
}

#[test]
fn stage_is_held_while_its_dispatch_is_pending() {
    let state = with_status(json!({ "drafting_ready_count": 3 }));
    let (state, effects) = request(state, StageId::Drafting);
    assert_eq!(effects.len(), 1);
    assert!(state.is_dispatching(StageId::Drafting));
    assert!(!state.view().stage(StageId::Drafting).unwrap().enabled);
    // Other stages keep their own gate.
    assert!(state.view().stage(StageId::Discovery).unwrap().enabled);

    let (state, effects) = request(state, StageId::Drafting);
    assert!(effects.is_empty());
    let notice = state.view().notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Refused);
    assert_eq!(notice.message, "Drafting is already waiting for the backend");

    let (state, _) = update(
        state,
        Msg::ActionCompleted {
            stage: StageId::Drafting,
            result: Err("quota exceeded".to_string()),
        },
    );
    assert!(!state.is_dispatching(StageId::Drafting));
    assert!(state.view().stage(StageId::Drafting).unwrap().enabled);

    let (_state, effects) = request(state, StageId::Drafting);
    assert!(matches!(effects.as_slice(), [Effect::Dispatch { .. }]));
}
