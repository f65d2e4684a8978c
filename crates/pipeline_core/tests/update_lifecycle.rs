use pipeline_core::{
    update, Effect, Lifecycle, Msg, PipelineVariant, RefreshTrigger, StageId, SyncState,
    TargetSelection, Timing,
};

#[test]
fn messages_before_activation_are_ignored() {
    let state = SyncState::default();
    for msg in [
        Msg::RefreshRequested(RefreshTrigger::Manual),
        Msg::DebounceElapsed { generation: 1 },
        Msg::FollowUpDue,
        Msg::ActionRequested {
            stage: StageId::Discovery,
            selection: TargetSelection::AutoSelect,
        },
    ] {
        let (next, effects) = update(state.clone(), msg);
        assert_eq!(state, next);
        assert!(effects.is_empty());
    }
}

#[test]
fn deactivated_state_stays_inert() {
    let state = SyncState::new(PipelineVariant::Social, Timing::default());
    let (state, _) = update(state, Msg::Activated);
    let (mut state, effects) = update(state, Msg::Deactivated);
    assert_eq!(effects, vec![Effect::CancelAll]);
    assert_eq!(state.lifecycle(), Lifecycle::Deactivated);
    state.consume_dirty();

    let (next, effects) = update(state.clone(), Msg::Activated);
    assert_eq!(next, state);
    assert!(effects.is_empty());

    let (next, effects) = update(state.clone(), Msg::Deactivated);
    assert_eq!(next, state);
    assert!(effects.is_empty());
}
