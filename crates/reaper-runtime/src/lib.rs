//! Sweep orchestration for the channel reaper.
//!
//! Wires the Slack collaborator and the purge queue store into the notify and
//! purge sweeps, the cron scheduler that drives them, and the interactive
//! ingress that applies opt-outs.

pub mod activity_evaluator;
pub mod interactive_ingress;
pub mod notice_dispatcher;
pub mod notify_sweep;
pub mod opt_out;
pub mod purge_sweep;
pub mod reaper_daemon;
pub mod sweep_scheduler;

#[cfg(test)]
mod test_support;

pub use activity_evaluator::is_candidate;
pub use interactive_ingress::{
    build_interactive_router, serve_interactive_ingress, InteractiveIngressConfig,
    InteractiveIngressState, DEFAULT_SIGNATURE_MAX_SKEW_SECONDS, HEALTH_ENDPOINT,
    INTERACTIVE_ENDPOINT,
};
pub use notice_dispatcher::{
    is_opt_out_action, render_purge_notice, DispatchError, NoticeDispatcher, NoticeOutcome,
    DO_NOT_ARCHIVE_ACTION, I_HATE_ROBOTS_ACTION, NOTICE_CALLBACK_ID,
};
pub use notify_sweep::{
    NotifySweep, NotifySweepConfig, NotifySweepReport, DEFAULT_OPT_OUT_EXEMPTION_DAYS,
    DEFAULT_SWEEP_CONCURRENCY,
};
pub use opt_out::{OptOutHandler, OptOutOutcome};
pub use purge_sweep::{PurgeSweep, PurgeSweepReport};
pub use reaper_daemon::{build_scheduled_sweeps, run_reaper_daemon, run_reaper_daemon_until};
pub use sweep_scheduler::{
    fire, run_sweep_scheduler, FireOutcome, ScheduledSweep, SweepJob, SweepSchedule, SweepSlot,
    SweepSlotGuard,
};

/// Cron defaults: notify on the 1st at 09:00, purge on the 1st of the
/// following month at 08:00, so every channel gets a full month's warning.
pub const DEFAULT_NOTIFY_CRON: &str = "0 0 9 1 * *";
pub const DEFAULT_PURGE_CRON: &str = "0 0 8 1 * *";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Validated process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ReaperRuntimeConfig {
    pub notify_schedule: SweepSchedule,
    pub purge_schedule: SweepSchedule,
    pub notify: NotifySweepConfig,
    pub interactive: Option<InteractiveIngressConfig>,
}
