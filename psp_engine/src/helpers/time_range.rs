use chrono::{DateTime, NaiveTime, TimeZone, Utc};

/// Midnight (UTC) at the start of the day containing `t`.
pub fn day_start(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&t.date_naive().and_time(NaiveTime::MIN))
}

/// The last second of the day containing `t`.
pub fn day_end(t: DateTime<Utc>) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&t.date_naive().and_time(end))
}
