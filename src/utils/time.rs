use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// This is the standard way of converting a date to a string in coldsheet. Both the cursor file
/// and the spreadsheet rows use it.
pub fn date_to_day_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Converts a (possibly fractional) epoch timestamp into an instant in `tz`.
pub fn instant_from_epoch<Tz: TimeZone>(timestamp: f64, tz: &Tz) -> Option<DateTime<Tz>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    // Anything outside i64 can't be represented by chrono either.
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    let nanos = (((timestamp - secs) * 1e9) as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos).map(|v| v.with_timezone(tz))
}

/// Calendar day a timestamp falls on, as seen on a wall clock in `tz`.
pub fn local_day_of<Tz: TimeZone>(timestamp: f64, tz: &Tz) -> Option<NaiveDate> {
    instant_from_epoch(timestamp, tz).map(|v| v.date_naive())
}

/// Returns the first instant of `date` in `tz`.
///
/// Midnight doesn't always exist. When it is repeated the earliest instant is used, when it is
/// skipped by a DST gap the first local minute that exists on that day is used.
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    let midnight = NaiveDateTime::new(date, NaiveTime::MIN);
    let mut candidate = midnight;
    while candidate.date() == date {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(v) => return Some(v),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => candidate += Duration::minutes(1),
        }
    }
    None
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    start_of_day(date.succ_opt()?, tz)
}
