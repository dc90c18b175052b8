use chrono::{DateTime, Duration, NaiveTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Start of the current UTC day. Visibility cutoffs compare against this so
/// a listing stays live for the whole of its final day.
pub fn today_start() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

pub fn days_from_now(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}
