use crate::{check_action, Effect, Lifecycle, Msg, NoticeKind, RefreshOutcome, Snapshot, SyncState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Nothing is applied once the state is deactivated.
pub fn update(mut state: SyncState, msg: Msg) -> (SyncState, Vec<Effect>) {
    let effects = match msg {
        Msg::Activated => {
            if state.activate() {
                request_refresh(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::RefreshRequested(_trigger) => {
            if state.is_active() {
                request_refresh(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::DebounceElapsed { generation } => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            match state.fire_debounce(generation) {
                Some(token) => vec![Effect::StartFetch { token }],
                None => Vec::new(),
            }
        }
        Msg::RefreshCompleted {
            token,
            outcome,
            observed_at,
        } => {
            // Responses apply in token order: anything but the current token is stale.
            if !state.is_active() || !state.accept(token) {
                return (state, Vec::new());
            }
            let variant = state.variant();
            match outcome {
                RefreshOutcome::Fetched { status, jobs } => {
                    state.replace_snapshot(Snapshot::from_raw(variant, status.as_ref(), &jobs));
                    if state.completion_mut().observe(&jobs, observed_at) {
                        vec![Effect::ScheduleFollowUp {
                            delay: state.timing().completion_refresh_delay,
                        }]
                    } else {
                        Vec::new()
                    }
                }
                RefreshOutcome::Failed { error } => {
                    state.replace_snapshot(Snapshot::unavailable(variant, Some(error)));
                    Vec::new()
                }
            }
        }
        Msg::FollowUpDue => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            let effects = request_refresh(&mut state);
            state.completion_mut().refresh_issued();
            effects
        }
        Msg::ActionRequested { stage, selection } => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            if state.is_dispatching(stage) {
                state.set_notice(
                    NoticeKind::Refused,
                    stage,
                    format!("{stage} is already waiting for the backend"),
                );
                return (state, Vec::new());
            }
            let snapshot = state.snapshot();
            match check_action(
                state.variant(),
                stage,
                &selection,
                &snapshot.status,
                &snapshot.readiness,
            ) {
                Ok(action) => {
                    state.begin_dispatch(stage);
                    state.set_notice(
                        NoticeKind::Dispatched,
                        stage,
                        format!("{stage} requested"),
                    );
                    vec![Effect::Dispatch {
                        stage,
                        action,
                        selection,
                    }]
                }
                Err(refusal) => {
                    state.set_notice(NoticeKind::Refused, stage, refusal.message);
                    Vec::new()
                }
            }
        }
        Msg::ActionCompleted { stage, result } => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            state.finish_dispatch(stage);
            match result {
                Ok(ack) => {
                    state.set_notice(NoticeKind::Accepted, stage, ack.describe(stage));
                    // No optimistic counts: converge on the backend's own numbers.
                    request_refresh(&mut state)
                }
                Err(message) => {
                    state.set_notice(NoticeKind::Rejected, stage, message);
                    Vec::new()
                }
            }
        }
        Msg::Deactivated => {
            if state.lifecycle() == Lifecycle::Deactivated {
                return (state, Vec::new());
            }
            state.deactivate();
            vec![Effect::CancelAll]
        }
    };

    (state, effects)
}

fn request_refresh(state: &mut SyncState) -> Vec<Effect> {
    let (aborted, generation) = state.supersede();
    let mut effects = Vec::with_capacity(2);
    if let Some(token) = aborted {
        effects.push(Effect::AbortFetch { token });
    }
    effects.push(Effect::ArmDebounce {
        generation,
        delay: state.timing().debounce,
    });
    effects
}
