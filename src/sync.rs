use std::fmt::Display;

use chrono::{Local, NaiveDate, TimeZone};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::SyncConfig,
    cursor::CursorStore,
    error::SyncError,
    sheets::{client::GoogleSheetsClient, SheetDestination, SheetsApi},
    stats::{
        aggregation::{aggregate, completed_rows, start_of_day_after, CompletedRows},
        source::{SqliteStatsSource, StatsSource},
    },
    utils::clock::{Clock, DefaultClock},
};

/// How a run ended. Displays as the status line printed for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing usable was recorded since the watermark.
    NoNewData,
    /// Everything new belongs to days that aren't over yet.
    NoCompletedDays,
    Synced { rows: usize, through: NaiveDate },
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOutcome::NoNewData => write!(f, "No new data to sync."),
            SyncOutcome::NoCompletedDays => write!(f, "No completed days to sync yet."),
            SyncOutcome::Synced { rows, through } => {
                write!(f, "Synced {rows} rows through {}.", through.format("%Y-%m-%d"))
            }
        }
    }
}

/// Moves completed days from the stats source into the spreadsheet, one pass per run.
///
/// The cursor is only written after the rows were appended. A failed run leaves it where it was,
/// so the next run sends the same days again rather than skipping them.
pub struct SyncDriver<S, A, Tz> {
    source: S,
    destination: SheetDestination<A>,
    cursor: CursorStore,
    clock: Box<dyn Clock>,
    tz: Tz,
}

pub type DefaultSyncDriver = SyncDriver<SqliteStatsSource, GoogleSheetsClient, Local>;

impl DefaultSyncDriver {
    /// Wires up the Cold Turkey database, Google Sheets and the cursor file from `config`, using
    /// the system timezone.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let client =
            GoogleSheetsClient::new(config.sheet_id.clone(), config.credentials_path.clone())?;
        Ok(SyncDriver::new(
            SqliteStatsSource::new(config.db_path.clone()),
            SheetDestination::new(client, config.worksheet.clone()),
            CursorStore::new(config.cursor_path.clone()),
            Box::new(DefaultClock),
            Local,
        ))
    }
}

impl<S: StatsSource, A: SheetsApi, Tz: TimeZone> SyncDriver<S, A, Tz> {
    pub fn new(
        source: S,
        destination: SheetDestination<A>,
        cursor: CursorStore,
        clock: Box<dyn Clock>,
        tz: Tz,
    ) -> Self {
        Self {
            source,
            destination,
            cursor,
            clock,
            tz,
        }
    }

    #[instrument(name = "sync", skip(self))]
    pub async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let previous = self.cursor.read().await;
        let since = previous.and_then(|date| {
            let since = start_of_day_after(date, &self.tz);
            if since.is_none() {
                warn!("Cursor {date} has no following day, fetching everything");
            }
            since
        });
        info!("Starting sync, cursor {previous:?}, fetching since {since:?}");

        let samples = self.source.fetch(since)?;

        let aggregated = aggregate(samples, &self.tz);
        if aggregated.is_empty() {
            info!("Nothing to aggregate");
            return Ok(SyncOutcome::NoNewData);
        }
        debug!("Aggregated {} day/domain buckets", aggregated.len());

        let today = self.clock.time().with_timezone(&self.tz).date_naive();
        let CompletedRows { rows, through } = completed_rows(&aggregated, today, previous);
        let Some(through) = through.filter(|_| !rows.is_empty()) else {
            info!("Only incomplete days since the cursor, today is {today}");
            return Ok(SyncOutcome::NoCompletedDays);
        };

        self.destination.ensure_provisioned().await?;
        self.destination.append_rows(&rows).await?;

        self.cursor
            .write(through)
            .await
            .map_err(|source| SyncError::CursorWrite {
                path: self.cursor.path().to_owned(),
                source,
            })?;

        Ok(SyncOutcome::Synced {
            rows: rows.len(),
            through,
        })
    }
}
