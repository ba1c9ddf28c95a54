//! Cron-driven timers for the notify and purge sweeps.
//!
//! Each timer owns one [`SweepJob`]. A firing that arrives while the previous
//! run of the same job is still in flight is skipped, never queued.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const MAX_TIMER_SLEEP: Duration = Duration::from_secs(60);

/// One sweep the scheduler can fire.
#[async_trait]
pub trait SweepJob: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run_sweep(&self) -> Result<()>;
}

/// A parsed cron expression bound to an IANA timezone.
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
}

impl SweepSchedule {
    pub fn parse(expression: &str, timezone: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression.trim())
            .with_context(|| format!("invalid cron expression '{}'", expression))?;
        let timezone: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid timezone '{}'", timezone))?;
        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`, evaluated in the schedule timezone.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

/// Overlap guard for a single job.
#[derive(Debug, Clone, Default)]
pub struct SweepSlot {
    running: Arc<AtomicBool>,
}

impl SweepSlot {
    /// Claims the slot; `None` when a run is already in flight.
    pub fn try_start(&self) -> Option<SweepSlotGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepSlotGuard {
                running: self.running.clone(),
            })
    }

}

/// Releases the slot when dropped.
#[derive(Debug)]
pub struct SweepSlotGuard {
    running: Arc<AtomicBool>,
}

impl Drop for SweepSlotGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum FireOutcome {
    Started(JoinHandle<()>),
    SkippedOverlap,
}

/// Starts `job` on a new task unless its previous run is still in flight.
pub fn fire(job: &Arc<dyn SweepJob>, slot: &SweepSlot) -> FireOutcome {
    let Some(guard) = slot.try_start() else {
        tracing::warn!(sweep = job.name(), "previous sweep still running; skipping this firing");
        return FireOutcome::SkippedOverlap;
    };
    let job = job.clone();
    FireOutcome::Started(tokio::spawn(async move {
        let _guard = guard;
        tracing::info!(sweep = job.name(), "sweep started");
        if let Err(error) = job.run_sweep().await {
            tracing::error!(sweep = job.name(), error = %format!("{error:#}"), "sweep failed");
        }
    }))
}

/// A job and the schedule it fires on.
#[derive(Clone)]
pub struct ScheduledSweep {
    pub schedule: SweepSchedule,
    pub job: Arc<dyn SweepJob>,
}

/// Runs every timer until `shutdown` flips to true (or its sender is dropped),
/// then waits for in-flight sweeps to finish.
pub async fn run_sweep_scheduler(
    sweeps: Vec<ScheduledSweep>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if sweeps.is_empty() {
        return Err(anyhow!("no sweeps configured"));
    }
    let timers = sweeps
        .into_iter()
        .map(|sweep| tokio::spawn(run_timer(sweep, shutdown.clone())))
        .collect::<Vec<_>>();
    for timer in timers {
        timer.await.context("sweep timer task panicked")?;
    }
    tracing::info!("sweep scheduler stopped");
    Ok(())
}

async fn run_timer(sweep: ScheduledSweep, mut shutdown: watch::Receiver<bool>) {
    let slot = SweepSlot::default();
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    let name = sweep.job.name();

    loop {
        let Some(next_fire) = sweep.schedule.next_fire_after(Utc::now()) else {
            tracing::warn!(
                sweep = name,
                cron = sweep.schedule.expression(),
                "cron expression has no future occurrence; timer stopped"
            );
            break;
        };
        tracing::info!(
            sweep = name,
            next_fire = %next_fire.with_timezone(&sweep.schedule.timezone()),
            "next sweep scheduled"
        );
        if !sleep_until(next_fire, &mut shutdown).await {
            break;
        }
        match fire(&sweep.job, &slot) {
            FireOutcome::Started(handle) => in_flight.push(handle),
            FireOutcome::SkippedOverlap => {}
        }
        in_flight.retain(|handle| !handle.is_finished());
    }

    if !in_flight.is_empty() {
        tracing::info!(sweep = name, "waiting for in-flight sweep to finish");
    }
    for handle in in_flight {
        if let Err(error) = handle.await {
            tracing::error!(sweep = name, error = %error, "sweep task panicked");
        }
    }
}

/// Sleeps in bounded steps until the wall clock reaches `deadline`, so clock
/// adjustments during long waits are honoured. Returns false on shutdown.
async fn sleep_until(deadline: DateTime<Utc>, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow() {
            return false;
        }
        let remaining = match (deadline - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => return true,
        };
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            _ = tokio::time::sleep(remaining.min(MAX_TIMER_SLEEP)) => {}
        }
    }
}
