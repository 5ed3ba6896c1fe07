//! Spreadsheet side of the sync. [SheetsApi] is the thin contract with Google Sheets,
//! [SheetDestination] puts the header, formatting and row layout on top of it.

pub mod client;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{error::RemoteError, utils::time::date_to_day_name};

pub const HEADER: [&str; 3] = ["Domain", "Date", "Minutes"];
pub const DATE_PATTERN: &str = "yyyy-mm-dd";

/// One output row: minutes spent on a domain during a day.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub domain: String,
    pub date: NaiveDate,
    pub minutes: f64,
}

impl SheetRow {
    pub fn new(domain: impl Into<String>, date: NaiveDate, minutes: f64) -> Self {
        Self {
            domain: domain.into(),
            date,
            minutes,
        }
    }

    pub fn to_values(&self) -> Vec<Value> {
        vec![
            json!(self.domain),
            json!(date_to_day_name(self.date)),
            json!(self.minutes),
        ]
    }
}

/// Operations of the Sheets API the sync relies on. Ranges are in A1 notation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Reads the values of a range. Empty ranges produce an empty list.
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, RemoteError>;

    /// Appends rows after the last row of the table found in `range`.
    async fn append_values(&self, range: &str, values: Vec<Vec<Value>>)
        -> Result<(), RemoteError>;

    /// Numeric id of the worksheet called `title`, if there is one.
    async fn sheet_id(&self, title: &str) -> Result<Option<i64>, RemoteError>;

    async fn batch_update(&self, requests: Vec<Value>) -> Result<(), RemoteError>;
}

/// Quotes a worksheet name for A1 notation, e.g. `'Raw Data'!A1:C1`.
pub fn a1_range(worksheet: &str, cells: &str) -> String {
    format!("'{}'!{cells}", worksheet.replace('\'', "''"))
}

/// `repeatCell` request that formats the whole date column of a worksheet.
pub fn date_column_format_request(sheet_id: i64) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startColumnIndex": 1,
                "endColumnIndex": 2,
            },
            "cell": {
                "userEnteredFormat": {
                    "numberFormat": { "type": "DATE", "pattern": DATE_PATTERN }
                }
            },
            "fields": "userEnteredFormat.numberFormat",
        }
    })
}

/// The worksheet rows are synced into.
pub struct SheetDestination<A> {
    api: A,
    worksheet: String,
}

impl<A: SheetsApi> SheetDestination<A> {
    pub fn new(api: A, worksheet: String) -> Self {
        Self { api, worksheet }
    }

    /// Makes sure the header row is there and the date column displays dates. Safe to repeat.
    pub async fn ensure_provisioned(&self) -> Result<(), RemoteError> {
        let header_range = a1_range(&self.worksheet, "A1:C1");
        if self.api.get_values(&header_range).await?.is_empty() {
            info!("Adding header to {}", self.worksheet);
            let header = HEADER.iter().map(|v| json!(v)).collect();
            self.api.append_values(&header_range, vec![header]).await?;
        } else {
            debug!("Header of {} already present", self.worksheet);
        }

        match self.api.sheet_id(&self.worksheet).await? {
            Some(sheet_id) => {
                self.api
                    .batch_update(vec![date_column_format_request(sheet_id)])
                    .await
            }
            None => {
                warn!(
                    "Worksheet {} not found, date column left unformatted",
                    self.worksheet
                );
                Ok(())
            }
        }
    }

    /// Appends all rows in one request, keeping their order.
    pub async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), RemoteError> {
        let values = rows.iter().map(SheetRow::to_values).collect();
        self.api
            .append_values(&a1_range(&self.worksheet, "A:C"), values)
            .await?;
        info!("Appended {} rows to {}", rows.len(), self.worksheet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::error::RemoteError;

    use super::{a1_range, MockSheetsApi, SheetDestination, SheetRow};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    #[test]
    fn test_a1_range_quoting() {
        assert_eq!(a1_range("Raw Data", "A1:C1"), "'Raw Data'!A1:C1");
        assert_eq!(a1_range("Bob's", "A:C"), "'Bob''s'!A:C");
    }

    #[test]
    fn test_row_values() {
        let row = SheetRow::new("example.com", TEST_DATE, 5.);
        assert_eq!(row.to_values(), vec![json!("example.com"), json!("2024-05-01"), json!(5.0)]);
    }

    #[tokio::test]
    async fn test_provision_empty_sheet() -> Result<()> {
        let mut api = MockSheetsApi::new();
        api.expect_get_values()
            .withf(|range| range == "'Raw Data'!A1:C1")
            .times(1)
            .returning(|_| Ok(vec![]));
        api.expect_append_values()
            .withf(|range, values| {
                range == "'Raw Data'!A1:C1"
                    && *values == vec![vec![json!("Domain"), json!("Date"), json!("Minutes")]]
            })
            .times(1)
            .returning(|_, _| Ok(()));
        api.expect_sheet_id()
            .withf(|title| title == "Raw Data")
            .returning(|_| Ok(Some(42)));
        api.expect_batch_update()
            .withf(|requests| {
                requests.len() == 1
                    && requests[0]["repeatCell"]["range"]["sheetId"] == 42
                    && requests[0]["repeatCell"]["cell"]["userEnteredFormat"]["numberFormat"]
                        ["pattern"]
                        == "yyyy-mm-dd"
            })
            .times(1)
            .returning(|_| Ok(()));

        SheetDestination::new(api, "Raw Data".into())
            .ensure_provisioned()
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_provision_existing_header() -> Result<()> {
        let mut api = MockSheetsApi::new();
        api.expect_get_values()
            .returning(|_| Ok(vec![vec![json!("Domain"), json!("Date"), json!("Minutes")]]));
        api.expect_append_values().never();
        api.expect_sheet_id().returning(|_| Ok(Some(0)));
        api.expect_batch_update().times(1).returning(|_| Ok(()));

        SheetDestination::new(api, "Raw Data".into())
            .ensure_provisioned()
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_provision_missing_worksheet_skips_format() -> Result<()> {
        let mut api = MockSheetsApi::new();
        api.expect_get_values()
            .returning(|_| Ok(vec![vec![json!("Domain")]]));
        api.expect_sheet_id().returning(|_| Ok(None));
        api.expect_batch_update().never();

        SheetDestination::new(api, "Elsewhere".into())
            .ensure_provisioned()
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_append_keeps_order() -> Result<()> {
        let mut api = MockSheetsApi::new();
        api.expect_append_values()
            .withf(|range, values| {
                range == "'Raw Data'!A:C"
                    && values.len() == 2
                    && values[0][0] == "a.com"
                    && values[1][0] == "b.com"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let rows = [
            SheetRow::new("a.com", TEST_DATE, 1.5),
            SheetRow::new("b.com", TEST_DATE, 2.),
        ];
        SheetDestination::new(api, "Raw Data".into())
            .append_rows(&rows)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_append_error_propagates() {
        let mut api = MockSheetsApi::new();
        api.expect_append_values().returning(|_, _| {
            Err(RemoteError::Status {
                status: 403,
                message: "The caller does not have permission".into(),
            })
        });

        let result = SheetDestination::new(api, "Raw Data".into())
            .append_rows(&[SheetRow::new("a.com", TEST_DATE, 1.)])
            .await;
        assert!(matches!(result, Err(RemoteError::Status { status: 403, .. })));
    }
}
