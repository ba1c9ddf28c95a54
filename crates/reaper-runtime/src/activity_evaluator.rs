use chrono::{DateTime, Utc};
use reaper_core::InactivityThreshold;

/// Returns true when a channel qualifies for archival.
///
/// A channel with no recorded activity always qualifies. Otherwise its last
/// activity must be strictly older than `now - threshold`; activity exactly at
/// the cutoff keeps the channel.
pub fn is_candidate(
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: &InactivityThreshold,
) -> bool {
    let Some(last_activity) = last_activity else {
        return true;
    };
    match threshold.cutoff(now) {
        Some(cutoff) => last_activity < cutoff,
        None => false,
    }
}
