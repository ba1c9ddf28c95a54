//! Long-running mode: both sweep timers plus the optional interactive ingress.

use std::sync::Arc;

use anyhow::{Context, Result};
use reaper_queue::PurgeQueueStore;
use reaper_slack::WorkspaceApi;
use tokio::sync::watch;

use crate::interactive_ingress::{serve_interactive_ingress, InteractiveIngressState};
use crate::notify_sweep::NotifySweep;
use crate::opt_out::OptOutHandler;
use crate::purge_sweep::PurgeSweep;
use crate::sweep_scheduler::{run_sweep_scheduler, ScheduledSweep};
use crate::ReaperRuntimeConfig;

/// Builds the scheduled notify and purge sweeps for `config`.
pub fn build_scheduled_sweeps(
    config: &ReaperRuntimeConfig,
    workspace: Arc<dyn WorkspaceApi>,
    store: Arc<dyn PurgeQueueStore>,
) -> Vec<ScheduledSweep> {
    let notify = NotifySweep::new(workspace.clone(), store.clone(), config.notify.clone());
    let purge = PurgeSweep::new(workspace, store, config.notify.concurrency);
    vec![
        ScheduledSweep {
            schedule: config.notify_schedule.clone(),
            job: Arc::new(notify),
        },
        ScheduledSweep {
            schedule: config.purge_schedule.clone(),
            job: Arc::new(purge),
        },
    ]
}

/// Runs until ctrl-c, then waits for in-flight sweeps before returning.
pub async fn run_reaper_daemon(
    config: ReaperRuntimeConfig,
    workspace: Arc<dyn WorkspaceApi>,
    store: Arc<dyn PurgeQueueStore>,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
        }
        let _ = signal_tx.send(true);
    });
    run_reaper_daemon_until(config, workspace, store, shutdown_tx, shutdown_rx).await
}

/// Same as [`run_reaper_daemon`] with an external shutdown channel.
pub async fn run_reaper_daemon_until(
    config: ReaperRuntimeConfig,
    workspace: Arc<dyn WorkspaceApi>,
    store: Arc<dyn PurgeQueueStore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let sweeps = build_scheduled_sweeps(&config, workspace.clone(), store.clone());
    let scheduler = tokio::spawn(run_sweep_scheduler(sweeps, shutdown_rx.clone()));

    let ingress_result = match config.interactive.clone() {
        Some(interactive) => {
            let state = Arc::new(InteractiveIngressState::new(
                interactive,
                OptOutHandler::new(store, workspace),
            ));
            let result = serve_interactive_ingress(state, shutdown_rx).await;
            if result.is_err() {
                let _ = shutdown_tx.send(true);
            }
            result
        }
        None => Ok(()),
    };

    scheduler
        .await
        .context("sweep scheduler task panicked")??;
    ingress_result
}
