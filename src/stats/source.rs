use std::{ops::Deref, path::PathBuf, time::Duration};

use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::StoreError;

use super::entities::RawSample;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Interface for abstracting where raw samples come from.
pub trait StatsSource {
    /// Returns every sample with `timestamp >= since`, or all of them when there is no bound.
    fn fetch(&self, since: Option<i64>) -> Result<Vec<RawSample>, StoreError>;
}

impl<T: Deref> StatsSource for T
where
    T::Target: StatsSource,
{
    fn fetch(&self, since: Option<i64>) -> Result<Vec<RawSample>, StoreError> {
        self.deref().fetch(since)
    }
}

/// Reads the `stats` table of a Cold Turkey database.
pub struct SqliteStatsSource {
    db_path: PathBuf,
}

impl SqliteStatsSource {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn fetch_inner(&self, since: Option<i64>) -> rusqlite::Result<Vec<RawSample>> {
        // Cold Turkey keeps writing to the database, so it is only ever opened read only.
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let sql = match since {
            Some(_) => "SELECT date, domain, seconds FROM stats WHERE date >= ?1",
            None => "SELECT date, domain, seconds FROM stats",
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(since), |row| {
            Ok(RawSample {
                timestamp: row.get(0)?,
                domain: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                seconds: row.get::<_, Option<f64>>(2)?.unwrap_or_default(),
            })
        })?;
        rows.collect()
    }
}

impl StatsSource for SqliteStatsSource {
    fn fetch(&self, since: Option<i64>) -> Result<Vec<RawSample>, StoreError> {
        debug!("Fetching stats from {:?} since {since:?}", self.db_path);
        let rows = self.fetch_inner(since).map_err(|source| StoreError {
            path: self.db_path.clone(),
            source,
        })?;
        info!("Fetched {} raw samples", rows.len());
        Ok(rows)
    }
}
