//! Notify sweep: find inactive channels, warn them and queue them for purge.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures_util::{stream, StreamExt};
use reaper_core::{Channel, InactivityThreshold, NoticeRef, QueueRecord};
use reaper_queue::PurgeQueueStore;
use reaper_slack::WorkspaceApi;
use serde::Serialize;

use crate::activity_evaluator::is_candidate;
use crate::notice_dispatcher::NoticeDispatcher;
use crate::sweep_scheduler::SweepJob;

pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;
pub const DEFAULT_OPT_OUT_EXEMPTION_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifySweepConfig {
    pub threshold: InactivityThreshold,
    /// Channel ids or names that are never notified.
    pub excluded_channels: BTreeSet<String>,
    pub concurrency: usize,
    /// Age after which opt-out tombstones are pruned; `0` keeps them forever.
    pub opt_out_exemption_days: u32,
    /// Evaluate and report candidates without posting or writing anything.
    pub dry_run: bool,
}

impl Default for NotifySweepConfig {
    fn default() -> Self {
        Self {
            threshold: InactivityThreshold::default(),
            excluded_channels: BTreeSet::new(),
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
            opt_out_exemption_days: DEFAULT_OPT_OUT_EXEMPTION_DAYS,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifySweepReport {
    pub pruned: usize,
    pub discovered: usize,
    pub skipped: usize,
    pub already_queued: usize,
    pub candidates: usize,
    pub notified: usize,
    pub pin_failed: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub candidate_channels: Vec<String>,
    pub failed_channels: Vec<String>,
}

enum ChannelNotifyOutcome {
    Notified { pinned: bool },
    Failed,
}

pub struct NotifySweep {
    workspace: Arc<dyn WorkspaceApi>,
    store: Arc<dyn PurgeQueueStore>,
    dispatcher: NoticeDispatcher,
    config: NotifySweepConfig,
}

impl NotifySweep {
    pub fn new(
        workspace: Arc<dyn WorkspaceApi>,
        store: Arc<dyn PurgeQueueStore>,
        config: NotifySweepConfig,
    ) -> Self {
        let dispatcher = NoticeDispatcher::new(workspace.clone(), config.threshold);
        Self {
            workspace,
            store,
            dispatcher,
            config,
        }
    }

    /// Runs one sweep evaluated at `now`. Only a failed channel listing aborts
    /// the sweep; every per-channel failure is logged and counted.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<NotifySweepReport> {
        let mut report = NotifySweepReport {
            dry_run: self.config.dry_run,
            ..NotifySweepReport::default()
        };

        if !self.config.dry_run {
            report.pruned = self.prune_expired_opt_outs(now).await;
        }

        let channels = self
            .workspace
            .list_active_channels()
            .await
            .context("failed to list workspace channels")?;
        report.discovered = channels.len();

        let mut unqueued = Vec::new();
        for channel in channels {
            if self.is_exempt(&channel) {
                tracing::debug!(
                    channel_id = %channel.id,
                    channel = %channel.name,
                    "channel exempt from archival"
                );
                report.skipped += 1;
                continue;
            }
            match self.store.get(&channel.id).await {
                Ok(Some(_)) => report.already_queued += 1,
                Ok(None) => unqueued.push(channel),
                Err(error) => {
                    tracing::error!(
                        channel_id = %channel.id,
                        error = %error,
                        "failed to read purge queue record"
                    );
                    report.failed += 1;
                    report.failed_channels.push(channel.id);
                }
            }
        }

        let concurrency = self.config.concurrency.max(1);
        let evaluated = stream::iter(unqueued)
            .map(|mut channel| async move {
                match self.workspace.latest_activity(&channel.id).await {
                    Ok(last_activity) => {
                        channel.last_activity = last_activity;
                        Ok(channel)
                    }
                    Err(error) => Err((channel.id, error)),
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut candidates = Vec::new();
        for result in evaluated {
            match result {
                Ok(channel) => {
                    if is_candidate(channel.last_activity, now, &self.config.threshold) {
                        candidates.push(channel);
                    }
                }
                Err((channel_id, error)) => {
                    tracing::warn!(
                        channel_id = %channel_id,
                        rate_limited = error.is_rate_limited(),
                        error = %error,
                        "failed to read channel history"
                    );
                    report.failed += 1;
                    report.failed_channels.push(channel_id);
                }
            }
        }
        candidates.sort_by(|left, right| left.id.cmp(&right.id));
        report.candidates = candidates.len();
        report.candidate_channels = candidates
            .iter()
            .map(|channel| channel.id.clone())
            .collect();

        if candidates.is_empty() {
            tracing::info!(discovered = report.discovered, "no archive candidates found");
            report.failed_channels.sort();
            return Ok(report);
        }
        if self.config.dry_run {
            for channel in &candidates {
                tracing::info!(
                    channel_id = %channel.id,
                    channel = %channel.name,
                    "dry run: channel would be notified"
                );
            }
            report.failed_channels.sort();
            return Ok(report);
        }

        let outcomes = stream::iter(candidates)
            .map(|channel| async move {
                let outcome = self.notify_and_enqueue(&channel, now).await;
                (channel.id, outcome)
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;
        for (channel_id, outcome) in outcomes {
            match outcome {
                ChannelNotifyOutcome::Notified { pinned } => {
                    report.notified += 1;
                    if !pinned {
                        report.pin_failed += 1;
                    }
                }
                ChannelNotifyOutcome::Failed => {
                    report.failed += 1;
                    report.failed_channels.push(channel_id);
                }
            }
        }
        report.failed_channels.sort();
        Ok(report)
    }

    fn is_exempt(&self, channel: &Channel) -> bool {
        channel.is_archived
            || channel.is_general
            || self.config.excluded_channels.contains(&channel.id)
            || self.config.excluded_channels.contains(&channel.name)
    }

    async fn prune_expired_opt_outs(&self, now: DateTime<Utc>) -> usize {
        if self.config.opt_out_exemption_days == 0 {
            return 0;
        }
        let Some(cancelled_before) =
            TimeDelta::try_days(i64::from(self.config.opt_out_exemption_days))
                .and_then(|window| now.checked_sub_signed(window))
        else {
            return 0;
        };
        match self.store.prune_cancelled(cancelled_before).await {
            Ok(pruned) => {
                if !pruned.is_empty() {
                    tracing::info!(
                        count = pruned.len(),
                        channels = ?pruned,
                        "pruned expired opt-out records"
                    );
                }
                pruned.len()
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to prune expired opt-out records");
                0
            }
        }
    }

    async fn notify_and_enqueue(
        &self,
        channel: &Channel,
        now: DateTime<Utc>,
    ) -> ChannelNotifyOutcome {
        let outcome = match self.dispatcher.notify(&channel.id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(
                    channel_id = %channel.id,
                    error = %error,
                    "failed to notify channel"
                );
                return ChannelNotifyOutcome::Failed;
            }
        };
        let record = QueueRecord::pending(
            NoticeRef::new(channel.id.clone(), outcome.notice.message_ts),
            now,
        );
        match self.store.insert(record).await {
            Ok(()) => {
                tracing::info!(
                    channel_id = %channel.id,
                    channel = %channel.name,
                    pinned = outcome.pinned,
                    "channel queued for archival"
                );
                ChannelNotifyOutcome::Notified {
                    pinned: outcome.pinned,
                }
            }
            Err(error) => {
                tracing::error!(
                    channel_id = %channel.id,
                    error = %error,
                    "notice posted but purge record was not persisted"
                );
                ChannelNotifyOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl SweepJob for NotifySweep {
    fn name(&self) -> &'static str {
        "notify"
    }

    async fn run_sweep(&self) -> Result<()> {
        let report = self.run_at(Utc::now()).await?;
        tracing::info!(
            discovered = report.discovered,
            skipped = report.skipped,
            already_queued = report.already_queued,
            candidates = report.candidates,
            notified = report.notified,
            pin_failed = report.pin_failed,
            failed = report.failed,
            pruned = report.pruned,
            "notify sweep finished"
        );
        Ok(())
    }
}
