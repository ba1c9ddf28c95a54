use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use reaper_core::InactivityThreshold;
use reaper_runtime::{
    DEFAULT_NOTIFY_CRON, DEFAULT_OPT_OUT_EXEMPTION_DAYS, DEFAULT_PURGE_CRON,
    DEFAULT_SIGNATURE_MAX_SKEW_SECONDS, DEFAULT_SWEEP_CONCURRENCY, DEFAULT_TIMEZONE,
};
use reaper_slack::DEFAULT_SLACK_API_BASE;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "reaper",
    about = "Warns inactive Slack channels and archives the ones nobody keeps",
    version
)]
pub struct Cli {
    #[arg(
        long = "slack-bot-token",
        env = "SLACK_OAUTH_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API calls (xoxb-...)"
    )]
    pub slack_bot_token: Option<String>,

    #[arg(
        long = "slack-api-base",
        env = "REAPER_SLACK_API_BASE",
        default_value = DEFAULT_SLACK_API_BASE,
        help = "Base URL for the Slack Web API"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "request-timeout-ms",
        env = "REAPER_REQUEST_TIMEOUT_MS",
        default_value_t = 15_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each Slack Web API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "state-db",
        env = "REAPER_STATE_DB",
        default_value = ".reaper/purge-queue.sqlite",
        help = "SQLite file holding the purge queue"
    )]
    pub state_db: PathBuf,

    #[arg(
        long = "notify-cron",
        env = "REAPER_NOTIFY_CRON",
        default_value = DEFAULT_NOTIFY_CRON,
        help = "Cron expression (sec min hour dom month dow) for the notify sweep"
    )]
    pub notify_cron: String,

    #[arg(
        long = "purge-cron",
        env = "REAPER_PURGE_CRON",
        default_value = DEFAULT_PURGE_CRON,
        help = "Cron expression (sec min hour dom month dow) for the purge sweep"
    )]
    pub purge_cron: String,

    #[arg(
        long = "timezone",
        env = "REAPER_TIMEZONE",
        default_value = DEFAULT_TIMEZONE,
        help = "IANA timezone both cron expressions are evaluated in"
    )]
    pub timezone: String,

    #[arg(
        long = "inactivity-threshold",
        env = "REAPER_INACTIVITY_THRESHOLD",
        default_value = "1mo",
        help = "How long a channel must be quiet before it is warned: <n>mo, <n>w, <n>d or <n>h"
    )]
    pub inactivity_threshold: InactivityThreshold,

    #[arg(
        long = "excluded-channel",
        env = "REAPER_EXCLUDED_CHANNELS",
        value_delimiter = ',',
        help = "Channel id or name that is never archived (repeatable, comma separated)"
    )]
    pub excluded_channels: Vec<String>,

    #[arg(
        long = "sweep-concurrency",
        env = "REAPER_SWEEP_CONCURRENCY",
        default_value_t = DEFAULT_SWEEP_CONCURRENCY,
        value_parser = parse_positive_usize,
        help = "Maximum channels processed concurrently within a sweep"
    )]
    pub sweep_concurrency: usize,

    #[arg(
        long = "opt-out-exemption-days",
        env = "REAPER_OPT_OUT_EXEMPTION_DAYS",
        default_value_t = DEFAULT_OPT_OUT_EXEMPTION_DAYS,
        help = "Days an opted-out channel is shielded from new notices; 0 shields forever"
    )]
    pub opt_out_exemption_days: u32,

    #[arg(
        long = "interactive-bind",
        env = "REAPER_INTERACTIVE_BIND",
        help = "Address for the Slack interactive callback endpoint, e.g. 0.0.0.0:3000"
    )]
    pub interactive_bind: Option<SocketAddr>,

    #[arg(
        long = "slack-signing-secret",
        env = "SLACK_SIGNING_SECRET",
        hide_env_values = true,
        help = "Signing secret used to verify interactive callbacks"
    )]
    pub slack_signing_secret: Option<String>,

    #[arg(
        long = "signature-max-skew-seconds",
        env = "REAPER_SIGNATURE_MAX_SKEW_SECONDS",
        default_value_t = DEFAULT_SIGNATURE_MAX_SKEW_SECONDS,
        help = "Maximum request timestamp skew accepted on interactive callbacks; 0 disables the check"
    )]
    pub signature_max_skew_seconds: u64,

    #[arg(
        long = "notify-once",
        conflicts_with_all = ["purge_once", "queue_inspect"],
        help = "Run one notify sweep, print its report as JSON and exit"
    )]
    pub notify_once: bool,

    #[arg(
        long = "purge-once",
        conflicts_with = "queue_inspect",
        help = "Run one purge sweep, print its report as JSON and exit"
    )]
    pub purge_once: bool,

    #[arg(
        long = "queue-inspect",
        help = "Print every purge queue record as JSON and exit"
    )]
    pub queue_inspect: bool,

    #[arg(
        long = "dry-run",
        requires = "notify_once",
        help = "With --notify-once: report candidates without posting or queueing"
    )]
    pub dry_run: bool,
}
