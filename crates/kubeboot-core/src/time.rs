//! Time and duration utilities.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Format a duration in human-readable form.
pub fn pretty_duration(duration: Duration) -> String {
    let millis = duration.num_milliseconds();
    let secs = duration.num_seconds();

    if secs < 1 {
        format!("{}ms", millis.max(0))
    } else if secs < 60 {
        format!("{}.{}s", secs, (millis % 1000) / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}

/// Convert a Unix timestamp (seconds) into a UTC date.
pub fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Whole days from now until `secs`; negative once it has passed.
pub fn days_until(secs: i64) -> i64 {
    (secs - Utc::now().timestamp()).div_euclid(86_400)
}

/// Describe an expiry timestamp, e.g. `2035-10-16 (in 3652 days)`.
pub fn describe_expiry(secs: i64) -> String {
    let date = from_timestamp(secs)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| secs.to_string());
    let days = days_until(secs);

    if days < 0 {
        format!("{} (expired {} days ago)", date, -days)
    } else {
        format!("{} (in {} days)", date, days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_duration() {
        assert_eq!(pretty_duration(Duration::milliseconds(250)), "250ms");
        assert_eq!(pretty_duration(Duration::milliseconds(2500)), "2.5s");
        assert_eq!(pretty_duration(Duration::seconds(125)), "2m 5s");
        assert_eq!(pretty_duration(Duration::seconds(7260)), "2h 1m");
    }

    #[test]
    fn test_days_until() {
        let in_ten_days = Utc::now().timestamp() + 10 * 86_400 + 60;
        assert_eq!(days_until(in_ten_days), 10);

        let yesterday = Utc::now().timestamp() - 86_400 + 60;
        assert_eq!(days_until(yesterday), -1);
    }

    #[test]
    fn test_describe_expiry() {
        assert!(describe_expiry(0).starts_with("1970-01-01 (expired"));

        let future = Utc::now().timestamp() + 3 * 86_400 + 60;
        assert!(describe_expiry(future).ends_with("(in 3 days)"));
    }
}
