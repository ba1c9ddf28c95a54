use chrono::{DateTime, Utc};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Parses a Slack message timestamp (`"1512085950.000216"`) into a UTC instant.
///
/// The fractional part is a per-channel sequence suffix in microsecond
/// resolution; missing or short suffixes are right-padded.
pub fn parse_slack_ts(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (seconds_raw, fraction_raw) = match trimmed.split_once('.') {
        Some((seconds, fraction)) => (seconds, fraction),
        None => (trimmed, ""),
    };
    let seconds = seconds_raw.parse::<i64>().ok()?;
    if fraction_raw.len() > 9 || !fraction_raw.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let nanos = if fraction_raw.is_empty() {
        0
    } else {
        let padded = format!("{fraction_raw:0<9}");
        padded.parse::<u32>().ok()?
    };
    DateTime::from_timestamp(seconds, nanos)
}

/// Formats an instant the way Slack renders message timestamps.
pub fn format_slack_ts(instant: DateTime<Utc>) -> String {
    format!(
        "{}.{:06}",
        instant.timestamp(),
        instant.timestamp_subsec_micros()
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{current_unix_timestamp_ms, format_slack_ts, parse_slack_ts};

    #[test]
    fn unit_parse_slack_ts_reads_seconds_and_micros() {
        let parsed = parse_slack_ts("1512085950.000216").expect("parse");
        assert_eq!(parsed.timestamp(), 1_512_085_950);
        assert_eq!(parsed.timestamp_subsec_micros(), 216);
    }

    #[test]
    fn unit_parse_slack_ts_accepts_whole_seconds() {
        let parsed = parse_slack_ts("1700000000").expect("parse");
        assert_eq!(parsed, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn regression_parse_slack_ts_rejects_garbage() {
        assert!(parse_slack_ts("").is_none());
        assert!(parse_slack_ts("abc.123").is_none());
        assert!(parse_slack_ts("12.3x").is_none());
        assert!(parse_slack_ts("12.1234567890").is_none());
    }

    #[test]
    fn unit_format_slack_ts_matches_parse() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let rendered = format_slack_ts(instant);
        assert_eq!(rendered, "1705320000.000000");
        assert_eq!(parse_slack_ts(&rendered), Some(instant));
    }

    #[test]
    fn unit_current_unix_timestamp_ms_is_after_2020() {
        assert!(current_unix_timestamp_ms() > 1_577_836_800_000);
    }
}
