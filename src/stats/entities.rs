use chrono::NaiveDate;

/// One row of Cold Turkey's `stats` table: some seconds spent on a domain, recorded at a moment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Epoch seconds.
    pub timestamp: f64,
    /// Domain exactly as Cold Turkey stored it.
    pub domain: String,
    pub seconds: f64,
}

impl RawSample {
    pub fn new(timestamp: f64, domain: impl Into<String>, seconds: f64) -> Self {
        Self {
            timestamp,
            domain: domain.into(),
            seconds,
        }
    }
}

/// Bucket of the aggregation. Ordering is by date first, then domain, which is also the order
/// rows get appended in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AggregationKey {
    pub date: NaiveDate,
    pub domain: String,
}

impl AggregationKey {
    pub fn new(date: NaiveDate, domain: impl Into<String>) -> Self {
        Self {
            date,
            domain: domain.into(),
        }
    }
}
