use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// This is the standard way of converting a date to a string in pacering. Used as the key of the
/// daily goal map.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar day a moment falls on, in the local timezone.
pub fn local_date(moment: DateTime<Utc>) -> NaiveDate {
    moment.with_timezone(&Local).date_naive()
}

/// Converts a local wall-clock time into UTC. Ambiguous times (DST fold) resolve to the earlier
/// instant, nonexistent ones (DST gap) fall back to reading the time as UTC.
pub fn local_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&local)
        .earliest()
        .map(|v| v.to_utc())
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Formats seconds as `1h 5m`. Seconds are dropped.
pub fn format_hours_minutes(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    format!("{}h {}m", total_seconds / 3600, (total_seconds % 3600) / 60)
}

/// Formats seconds as `65min 3sec`, the way a single record's span is shown.
pub fn format_minutes_seconds(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    format!("{}min {}sec", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_key, format_hours_minutes, format_minutes_seconds};

    #[test]
    fn date_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(date_key(date), "2024-03-07");
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_hours_minutes(0), "0h 0m");
        assert_eq!(format_hours_minutes(3 * 3600 + 25 * 60 + 59), "3h 25m");
        assert_eq!(format_minutes_seconds(3723), "62min 3sec");
        assert_eq!(format_minutes_seconds(-5), "0min 0sec");
    }
}
