use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{
    update, Effect, Msg, PipelineView, RefreshOutcome, RefreshToken, RefreshTrigger, StageAction,
    StageId, SyncState, TargetSelection,
};
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;

use crate::{Backend, EngineSettings, SettingsError};

/// Cloneable handle for out-of-band refresh requests.
///
/// Goes through the same debounce and cancellation path as the poll timer.
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl RefreshSignal {
    /// Returns `false` once the engine has shut down.
    pub fn notify(&self) -> bool {
        self.msg_tx
            .send(Msg::RefreshRequested(RefreshTrigger::Manual))
            .is_ok()
    }
}

/// Owns the refresh loop. Every timer, fetch and dispatch it starts is
/// cancelled by [`EngineHandle::shutdown`] or when the handle is dropped.
pub struct EngineHandle {
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_rx: watch::Receiver<PipelineView>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Starts the loop on the current tokio runtime and schedules the initial
    /// refresh. Settings are validated first; nothing is spawned if they fail.
    pub fn spawn(
        backend: Arc<dyn Backend>,
        settings: &EngineSettings,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let state = SyncState::new(settings.variant, settings.timing());
        let (view_tx, view_rx) = watch::channel(state.view());
        let shutdown = CancellationToken::new();

        let runner = Runner {
            backend,
            state,
            msg_tx: msg_tx.clone(),
            view_tx,
            shutdown: shutdown.clone(),
            jobs_page_limit: settings.jobs_page_limit,
            debounce: None,
            in_flight: None,
        };
        let task = tokio::spawn(runner.run(msg_rx, settings.poll_interval));

        Ok(Self {
            msg_tx,
            view_rx,
            shutdown,
            task: Some(task),
        })
    }

    pub fn request_refresh(&self) {
        let _ = self
            .msg_tx
            .send(Msg::RefreshRequested(RefreshTrigger::Manual));
    }

    pub fn refresh_signal(&self) -> RefreshSignal {
        RefreshSignal {
            msg_tx: self.msg_tx.clone(),
        }
    }

    /// Asks the stage gate to run `stage`'s action. Refusals and backend
    /// answers show up in the view's notice.
    pub fn run_action(&self, stage: StageId, selection: TargetSelection) {
        let _ = self
            .msg_tx
            .send(Msg::ActionRequested { stage, selection });
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineView> {
        self.view_rx.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> PipelineView {
        self.view_rx.borrow().clone()
    }

    /// Cancels every timer and in-flight call and waits for the loop to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Debounce {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

struct Runner {
    backend: Arc<dyn Backend>,
    state: SyncState,
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_tx: watch::Sender<PipelineView>,
    shutdown: CancellationToken,
    jobs_page_limit: u32,
    debounce: Option<Debounce>,
    in_flight: Option<(RefreshToken, CancellationToken)>,
}

impl Runner {
    async fn run(mut self, mut msg_rx: mpsc::UnboundedReceiver<Msg>, poll_interval: Duration) {
        let mut interval = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut running = self.apply(Msg::Activated);
        while running {
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Msg::Deactivated,
                received = msg_rx.recv() => received.unwrap_or(Msg::Deactivated),
                generation = debounce_elapsed(&mut self.debounce) => Msg::DebounceElapsed { generation },
                _ = interval.tick() => Msg::RefreshRequested(RefreshTrigger::Interval),
            };
            let teardown = matches!(msg, Msg::Deactivated);
            running = self.apply(msg) && !teardown;
        }
        pipeline_info!("Pipeline sync loop stopped");
    }

    /// Runs one message through the state machine. Returns `false` once torn down.
    fn apply(&mut self, msg: Msg) -> bool {
        if let Msg::RefreshRequested(trigger) = &msg {
            pipeline_debug!("Refresh requested by {:?}", trigger);
        }

        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            self.view_tx.send_replace(state.view());
        }
        self.state = state;

        let mut running = true;
        for effect in effects {
            running &= self.execute(effect);
        }
        running
    }

    fn execute(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::ArmDebounce { generation, delay } => {
                // Replacing the slot drops the previous timer.
                self.debounce = Some(Debounce {
                    generation,
                    sleep: Box::pin(tokio::time::sleep(delay)),
                });
            }
            Effect::AbortFetch { token } => {
                if let Some((current, cancel)) = self.in_flight.take() {
                    if current == token {
                        pipeline_debug!("Aborting superseded refresh {}", token);
                        cancel.cancel();
                    } else {
                        self.in_flight = Some((current, cancel));
                    }
                }
            }
            Effect::StartFetch { token } => self.start_fetch(token),
            Effect::ScheduleFollowUp { delay } => {
                pipeline_info!("Job finished; refreshing again in {:?}", delay);
                let msg_tx = self.msg_tx.clone();
                let cancel = self.shutdown.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = msg_tx.send(Msg::FollowUpDue);
                        }
                    }
                });
            }
            Effect::Dispatch {
                stage,
                action,
                selection,
            } => self.start_dispatch(stage, action, selection),
            Effect::CancelAll => {
                self.shutdown.cancel();
                if let Some((_, cancel)) = self.in_flight.take() {
                    cancel.cancel();
                }
                self.debounce = None;
                return false;
            }
        }
        true
    }

    fn start_fetch(&mut self, token: RefreshToken) {
        pipeline_debug!("Issuing refresh {}", token);
        if let Some((previous, cancel)) = self.in_flight.take() {
            pipeline_debug!("Dropping refresh {} in favor of {}", previous, token);
            cancel.cancel();
        }

        let cancel = self.shutdown.child_token();
        self.in_flight = Some((token, cancel.clone()));

        let backend = self.backend.clone();
        let msg_tx = self.msg_tx.clone();
        let limit = self.jobs_page_limit;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    pipeline_debug!("Refresh {} cancelled", token);
                }
                outcome = refresh_cycle(backend.as_ref(), limit) => {
                    let _ = msg_tx.send(Msg::RefreshCompleted {
                        token,
                        outcome,
                        observed_at: Instant::now().into_std(),
                    });
                }
            }
        });
    }

    fn start_dispatch(&self, stage: StageId, action: StageAction, selection: TargetSelection) {
        pipeline_info!("Dispatching {} for {}", action, stage);
        let backend = self.backend.clone();
        let msg_tx = self.msg_tx.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = backend.dispatch(action, &selection) => {
                    let result = match result {
                        Ok(ack) => {
                            pipeline_info!("{} accepted: {:?}", stage, ack);
                            Ok(ack)
                        }
                        Err(err) => {
                            pipeline_warn!("{} rejected: {}", stage, err);
                            Err(err.user_message())
                        }
                    };
                    let _ = msg_tx.send(Msg::ActionCompleted { stage, result });
                }
            }
        });
    }
}

/// Status and the first jobs page, fetched together under one token.
async fn refresh_cycle(backend: &dyn Backend, limit: u32) -> RefreshOutcome {
    let (status, jobs) = tokio::join!(backend.fetch_status(), backend.list_jobs(0, limit));
    match (status, jobs) {
        (Ok(status), Ok(jobs)) => RefreshOutcome::Fetched { status, jobs },
        (Err(err), _) | (_, Err(err)) => {
            pipeline_warn!("Pipeline refresh failed: {}", err);
            RefreshOutcome::Failed {
                error: err.to_string(),
            }
        }
    }
}

async fn debounce_elapsed(slot: &mut Option<Debounce>) -> u64 {
    match slot {
        Some(debounce) => {
            debounce.sleep.as_mut().await;
            let generation = debounce.generation;
            *slot = None;
            generation
        }
        None => std::future::pending().await,
    }
}
