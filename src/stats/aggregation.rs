use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};
use tracing::{debug, warn};

use crate::{
    domain::normalize_domain,
    sheets::SheetRow,
    utils::time::{local_day_of, next_day_start},
};

use super::entities::{AggregationKey, RawSample};

/// Total seconds per (local day, domain). A [BTreeMap] keeps the keys sorted by date, then domain.
pub type Aggregated = BTreeMap<AggregationKey, f64>;

/// Buckets raw samples into local calendar days of `tz` and normalized domains.
///
/// Samples whose domain normalizes to nothing are skipped, as are samples that can't be placed on
/// a calendar or carry a negative or non-finite amount of seconds.
pub fn aggregate<Tz: TimeZone>(rows: impl IntoIterator<Item = RawSample>, tz: &Tz) -> Aggregated {
    let mut aggregated = Aggregated::new();
    for RawSample {
        timestamp,
        domain,
        seconds,
    } in rows
    {
        let normalized = normalize_domain(&domain);
        if normalized.is_empty() {
            debug!("Skipping sample without a usable domain {domain:?}");
            continue;
        }
        if !seconds.is_finite() || seconds < 0. {
            warn!("Skipping sample for {normalized} with invalid duration {seconds}");
            continue;
        }
        let Some(date) = local_day_of(timestamp, tz) else {
            warn!("Skipping sample for {normalized} with invalid timestamp {timestamp}");
            continue;
        };
        *aggregated
            .entry(AggregationKey::new(date, normalized))
            .or_insert(0.) += seconds;
    }
    aggregated
}

/// Epoch seconds of the local midnight that begins the day after `date`, i.e. the earliest
/// timestamp a watermark at `date` doesn't cover yet.
pub fn start_of_day_after<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<i64> {
    next_day_start(date, tz).map(|v| v.timestamp())
}

/// Rows that are safe to publish, plus the watermark that covers them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRows {
    pub rows: Vec<SheetRow>,
    /// Latest day covered once the rows are appended. Never earlier than the previous cursor.
    pub through: Option<NaiveDate>,
}

/// Drops every day that isn't over yet and converts the rest into spreadsheet rows.
///
/// `today` and anything after it are still accumulating samples. Only the days before it are
/// complete.
pub fn completed_rows(
    aggregated: &Aggregated,
    today: NaiveDate,
    previous_cursor: Option<NaiveDate>,
) -> CompletedRows {
    let mut rows = vec![];
    let mut through = previous_cursor;
    for (key, seconds) in aggregated {
        if key.date >= today {
            if key.date > today {
                warn!(
                    "Holding back {} for {} which is after today {today}",
                    key.domain, key.date
                );
            }
            continue;
        }
        rows.push(SheetRow::new(&key.domain, key.date, seconds_to_minutes(*seconds)));
        if through.is_none_or(|v| key.date > v) {
            through = Some(key.date);
        }
    }
    CompletedRows { rows, through }
}

/// Minutes rounded to 2 decimal places, exact halves going to the even neighbour.
pub fn seconds_to_minutes(seconds: f64) -> f64 {
    (seconds / 60. * 100.).round_ties_even() / 100.
}
