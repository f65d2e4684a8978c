use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::LevelFilter;
use pipeline_core::{NoticeKind, PipelineView, StageId, TargetSelection};
use pipeline_engine::{EngineHandle, EngineSettings, ReqwestBackend};
use pipeline_logging::{pipeline_debug, pipeline_info};
use tokio::sync::watch;

use crate::cli::{self, Cli, Command};
use crate::render::render;
use crate::settings::AppSettings;

pub fn run(cli: Cli) -> Result<()> {
    let settings = AppSettings::load(&cli.config)?.resolve(&cli)?;

    let level = if settings.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    pipeline_logging::initialize(settings.log.into(), level);
    pipeline_info!(
        "Following the {} pipeline at {}",
        settings.engine.variant,
        settings.engine.base_url
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    runtime.block_on(drive(cli.command(), settings.engine))
}

async fn drive(command: Command, engine: EngineSettings) -> Result<()> {
    let backend = ReqwestBackend::new(&engine).context("building the HTTP client")?;
    let handle =
        EngineHandle::spawn(Arc::new(backend), &engine).context("starting the pipeline engine")?;
    // Enough for one debounce window plus both calls of a refresh.
    let patience = engine.debounce + engine.request_timeout * 2;

    let outcome = match command {
        Command::Watch => watch_until_interrupted(&handle).await,
        Command::Once => first_snapshot(&handle, patience).await.map(|view| print(&view)),
        Command::Run { stage, ids } => {
            run_stage(&handle, stage.into(), cli::selection(&ids), patience).await
        }
    };

    handle.shutdown().await;
    outcome
}

async fn watch_until_interrupted(handle: &EngineHandle) -> Result<()> {
    let mut views = handle.subscribe();
    let mut last_printed: Option<PipelineView> = None;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                pipeline_info!("Interrupted; stopping");
                return Ok(());
            }
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let view = views.borrow_and_update().clone();
                let content = settled(&view);
                if last_printed.as_ref() != Some(&content) {
                    print(&view);
                    last_printed = Some(content);
                } else {
                    pipeline_debug!("View changed only in refresh state");
                }
            }
        }
    }
}

/// Waits for the first refresh after activation to land.
async fn first_snapshot(handle: &EngineHandle, patience: Duration) -> Result<PipelineView> {
    let mut views = handle.subscribe();
    tokio::time::timeout(patience, wait_settled(&mut views))
        .await
        .map_err(|_| anyhow!("no response from the backend within {patience:?}"))?
}

async fn wait_settled(views: &mut watch::Receiver<PipelineView>) -> Result<PipelineView> {
    let mut started = false;
    loop {
        views
            .changed()
            .await
            .map_err(|_| anyhow!("engine stopped before the first refresh"))?;
        let view = views.borrow_and_update().clone();
        if view.refreshing {
            started = true;
        } else if started {
            return Ok(view);
        }
    }
}

async fn run_stage(
    handle: &EngineHandle,
    stage: StageId,
    selection: TargetSelection,
    patience: Duration,
) -> Result<()> {
    let view = first_snapshot(handle, patience).await?;
    print(&view);

    let mut views = handle.subscribe();
    views.borrow_and_update();
    handle.run_action(stage, selection);

    let (kind, message) = tokio::time::timeout(patience, wait_for_answer(&mut views, stage))
        .await
        .map_err(|_| anyhow!("{stage}: no answer from the backend within {patience:?}"))??;

    match kind {
        NoticeKind::Accepted => {
            println!("{stage}: {message}");
            Ok(())
        }
        _ => bail!("{stage}: {message}"),
    }
}

async fn wait_for_answer(
    views: &mut watch::Receiver<PipelineView>,
    stage: StageId,
) -> Result<(NoticeKind, String)> {
    loop {
        views
            .changed()
            .await
            .map_err(|_| anyhow!("engine stopped before {stage} was answered"))?;
        let view = views.borrow_and_update();
        if let Some(notice) = &view.notice {
            if notice.stage == stage && notice.kind != NoticeKind::Dispatched {
                return Ok((notice.kind, notice.message.clone()));
            }
        }
    }
}

/// The view without its transient refresh flags.
fn settled(view: &PipelineView) -> PipelineView {
    PipelineView {
        refreshing: false,
        dirty: false,
        ..view.clone()
    }
}

fn print(view: &PipelineView) {
    for line in render(view, &chrono::Local::now()) {
        println!("{line}");
    }
}
