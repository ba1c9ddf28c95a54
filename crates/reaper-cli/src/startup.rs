//! Mode dispatch: turns parsed flags into a validated runtime configuration
//! and runs the selected mode.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reaper_queue::{PurgeQueueStore, SqlitePurgeQueueStore};
use reaper_runtime::{
    run_reaper_daemon, InteractiveIngressConfig, NotifySweep, NotifySweepConfig, PurgeSweep,
    ReaperRuntimeConfig, SweepSchedule,
};
use reaper_slack::{SlackApiClient, WorkspaceApi};
use serde::Serialize;

use crate::cli_args::Cli;

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let config = build_runtime_config(&cli)?;
    let store: Arc<dyn PurgeQueueStore> = Arc::new(
        SqlitePurgeQueueStore::new(&cli.state_db)
            .with_context(|| format!("failed to open purge queue {}", cli.state_db.display()))?,
    );

    if cli.queue_inspect {
        let records = store
            .list_all()
            .await
            .context("failed to read purge queue")?;
        return print_json(&records);
    }

    let workspace = build_workspace_client(&cli)?;
    if cli.notify_once {
        let sweep = NotifySweep::new(workspace, store, config.notify.clone());
        let report = sweep.run_at(Utc::now()).await?;
        return print_json(&report);
    }
    if cli.purge_once {
        let sweep = PurgeSweep::new(workspace, store, config.notify.concurrency);
        let report = sweep.run().await?;
        return print_json(&report);
    }

    tracing::info!(
        notify_cron = config.notify_schedule.expression(),
        purge_cron = config.purge_schedule.expression(),
        timezone = %config.notify_schedule.timezone(),
        threshold = %config.notify.threshold,
        state_db = %cli.state_db.display(),
        "channel reaper starting"
    );
    run_reaper_daemon(config, workspace, store).await
}

pub(crate) fn build_runtime_config(cli: &Cli) -> Result<ReaperRuntimeConfig> {
    let notify_schedule = SweepSchedule::parse(&cli.notify_cron, &cli.timezone)
        .context("invalid --notify-cron")?;
    let purge_schedule =
        SweepSchedule::parse(&cli.purge_cron, &cli.timezone).context("invalid --purge-cron")?;

    let excluded_channels = cli
        .excluded_channels
        .iter()
        .map(|channel| channel.trim().trim_start_matches('#').to_string())
        .filter(|channel| !channel.is_empty())
        .collect();

    let interactive = cli.interactive_bind.map(|bind_addr| InteractiveIngressConfig {
        bind_addr,
        signing_secret: cli
            .slack_signing_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
            .map(str::to_string),
        max_skew_seconds: cli.signature_max_skew_seconds,
    });

    Ok(ReaperRuntimeConfig {
        notify_schedule,
        purge_schedule,
        notify: NotifySweepConfig {
            threshold: cli.inactivity_threshold,
            excluded_channels,
            concurrency: cli.sweep_concurrency,
            opt_out_exemption_days: cli.opt_out_exemption_days,
            dry_run: cli.dry_run,
        },
        interactive,
    })
}

fn build_workspace_client(cli: &Cli) -> Result<Arc<dyn WorkspaceApi>> {
    let token = cli
        .slack_bot_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            anyhow!("missing Slack bot token: pass --slack-bot-token or set SLACK_OAUTH_TOKEN")
        })?;
    let client = SlackApiClient::new(
        cli.slack_api_base.clone(),
        token.to_string(),
        cli.request_timeout_ms,
    )
    .context("failed to build Slack API client")?;
    Ok(Arc::new(client))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render report")?;
    println!("{rendered}");
    Ok(())
}
