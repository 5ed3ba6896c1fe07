use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::RemoteError;

use super::SheetsApi;

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Sheets REST client authenticated as a service account.
///
/// The service account key is only read on the first request, so runs that have nothing to
/// append never need valid credentials.
pub struct GoogleSheetsClient {
    spreadsheet_id: String,
    credentials_path: PathBuf,
    account: OnceCell<CustomServiceAccount>,
    client: reqwest::Client,
    base_url: String,
}

// CustomServiceAccount holds a private key, so it's kept out of Debug.
impl std::fmt::Debug for GoogleSheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsClient")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("credentials_path", &self.credentials_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendValuesResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
    updated_rows: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetMetadata>,
}

#[derive(Debug, Deserialize)]
struct SheetMetadata {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GoogleSheetsClient {
    pub fn new(spreadsheet_id: String, credentials_path: PathBuf) -> Result<Self, RemoteError> {
        Self::with_base_url(spreadsheet_id, credentials_path, SHEETS_API_URL.into())
    }

    pub fn with_base_url(
        spreadsheet_id: String,
        credentials_path: PathBuf,
        base_url: String,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            spreadsheet_id,
            credentials_path,
            account: OnceCell::new(),
            client,
            base_url,
        })
    }

    async fn access_token(&self) -> Result<String, RemoteError> {
        let account = self
            .account
            .get_or_try_init(|| async {
                debug!("Loading service account from {:?}", self.credentials_path);
                CustomServiceAccount::from_file(&self.credentials_path).map_err(|source| {
                    RemoteError::Credentials {
                        path: self.credentials_path.clone(),
                        source,
                    }
                })
            })
            .await?;
        let token = account
            .token(&[SHEETS_SCOPE])
            .await
            .map_err(RemoteError::Token)?;
        Ok(token.as_str().to_string())
    }

    /// Url of the spreadsheet with `segments` appended as percent-encoded path segments. A suffix
    /// is glued onto the last segment, which is how the API spells methods like `:append`.
    fn endpoint(&self, segments: &[&str], suffix: &str) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::Url(format!("{}: {e}", self.base_url)))?;
        let mut parts = vec![self.spreadsheet_id.clone()];
        parts.extend(segments.iter().map(|v| v.to_string()));
        if let Some(last) = parts.last_mut() {
            last.push_str(suffix);
        }
        url.path_segments_mut()
            .map_err(|_| RemoteError::Url(self.base_url.clone()))?
            .pop_if_empty()
            .extend(parts);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(error_from_body(status.as_u16(), &body))
    }
}

/// Prefers the message Google puts into its json error body over the raw text.
fn error_from_body(status: u16, body: &str) -> RemoteError {
    let message = match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(GoogleErrorResponse {
            error: GoogleError {
                message,
                status: Some(code),
            },
        }) => format!("{message} ({code})"),
        Ok(GoogleErrorResponse {
            error: GoogleError { message, .. },
        }) => message,
        Err(_) => body.to_string(),
    };
    RemoteError::Status { status, message }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, RemoteError> {
        let url = self.endpoint(&["values", range], "")?;
        let response = self.send(self.client.get(url)).await?;
        let range: ValueRange = response.json().await?;
        Ok(range.values)
    }

    async fn append_values(
        &self,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["values", range], ":append")?;
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": values }));
        let response: AppendValuesResponse = self.send(request).await?.json().await?;
        if let Some(updates) = response.updates {
            debug!(
                "Sheets updated {:?} with {:?} rows",
                updates.updated_range, updates.updated_rows
            );
        }
        Ok(())
    }

    async fn sheet_id(&self, title: &str) -> Result<Option<i64>, RemoteError> {
        let url = self.endpoint(&[], "")?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "sheets(properties(sheetId,title))")]);
        let metadata: SpreadsheetMetadata = self.send(request).await?.json().await?;
        Ok(metadata
            .sheets
            .into_iter()
            .find(|v| v.properties.title == title)
            .map(|v| v.properties.sheet_id))
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<(), RemoteError> {
        let url = self.endpoint(&[], ":batchUpdate")?;
        let request = self
            .client
            .post(url)
            .json(&json!({ "requests": requests }));
        self.send(request).await?;
        Ok(())
    }
}
