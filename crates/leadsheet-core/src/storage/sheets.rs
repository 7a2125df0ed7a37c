//! Google Sheets backend.
//!
//! Talks to the Sheets REST API (v4) with a plain `reqwest` client. One store
//! is bound to one spreadsheet; tables are the spreadsheet's tabs. Values are
//! written with `valueInputOption=RAW` so cells hold exactly the coerced
//! strings.

use std::time::Duration;

use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{StoreFuture, TabularStore};
use crate::{
    error::{StoreError, StoreResult},
    models::{Row, TableRef, HEADER_ROW},
};

/// Longest backend response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for the Sheets backend.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// API root, without the `/v4` suffix.
    pub api_base: String,
    /// Id of the spreadsheet this store writes to.
    pub spreadsheet_id: String,
    /// OAuth bearer token with spreadsheet scope.
    pub access_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: String::new(),
            access_token: String::new(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("leadsheet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Spreadsheet-backed store.
#[derive(Debug, Clone)]
pub struct SheetsStore {
    client: reqwest::Client,
    config: SheetsConfig,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: Option<i64>,
    title: String,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<BatchUpdateReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateReply {
    #[serde(default)]
    add_sheet: Option<Sheet>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsStore {
    /// Creates a store bound to `config.spreadsheet_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the HTTP client cannot be built or
    /// the API base is not a valid URL.
    pub fn new(config: SheetsConfig) -> StoreResult<Self> {
        Url::parse(&config.api_base)
            .map_err(|e| StoreError::Backend(format!("invalid sheets api base: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Id of the bound spreadsheet.
    pub fn spreadsheet_id(&self) -> &str {
        &self.config.spreadsheet_id
    }

    /// Builds `{api_base}/v4/spreadsheets/{id}/{segments..}`.
    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| StoreError::Backend(format!("invalid sheets api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Backend("sheets api base cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    /// Looks up a tab by title. Sheets treats titles as case-insensitive,
    /// so matching does too; the returned reference keeps the tab's own
    /// spelling for later range lookups.
    async fn find_sheet(&self, name: &str) -> StoreResult<Option<TableRef>> {
        let mut url = self.url(&[&self.config.spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties(sheetId,title)");

        let response = self.client.get(url).bearer_auth(&self.config.access_token).send().await?;
        let spreadsheet: Spreadsheet = check_status(response).await?.json().await?;

        Ok(spreadsheet
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title.to_lowercase() == name.to_lowercase())
            .map(|sheet| table_ref(sheet.properties)))
    }

    async fn add_sheet(&self, name: &str) -> StoreResult<TableRef> {
        let batch_update = format!("{}:batchUpdate", self.config.spreadsheet_id);
        let url = self.url(&[&batch_update])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": name } } }]
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await?;
        let update: BatchUpdateResponse = check_status(response).await?.json().await?;

        let created = update
            .replies
            .into_iter()
            .find_map(|reply| reply.add_sheet)
            .map_or_else(|| TableRef::named(name), |sheet| table_ref(sheet.properties));
        Ok(created)
    }
}

impl TabularStore for SheetsStore {
    fn backend_name(&self) -> &'static str {
        "sheets"
    }

    fn get_or_create_table<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TableRef> {
        Box::pin(async move {
            if let Some(table) = self.find_sheet(name).await? {
                return Ok(table);
            }

            debug!(table = name, spreadsheet_id = %self.config.spreadsheet_id, "Creating sheet");
            self.add_sheet(name).await
        })
    }

    fn row_count<'a>(&'a self, table: &'a TableRef) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let range = a1_range(&table.name, Some(header_span()));
            let mut url = self.url(&[&self.config.spreadsheet_id, "values", &range])?;
            url.query_pairs_mut().append_pair("majorDimension", "ROWS");

            let response =
                self.client.get(url).bearer_auth(&self.config.access_token).send().await?;
            let values: ValueRange = check_status(response).await?.json().await?;

            Ok(values.values.len() as u64)
        })
    }

    fn append_row<'a>(&'a self, table: &'a TableRef, row: Row) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let range = a1_range(&table.name, Some("A1".to_string()));
            let append = format!("{range}:append");
            let mut url = self.url(&[&self.config.spreadsheet_id, "values", &append])?;
            url.query_pairs_mut()
                .append_pair("valueInputOption", "RAW")
                .append_pair("insertDataOption", "INSERT_ROWS");

            let body = json!({ "majorDimension": "ROWS", "values": [row.into_cells()] });

            let response = self
                .client
                .post(url)
                .bearer_auth(&self.config.access_token)
                .json(&body)
                .send()
                .await?;
            check_status(response).await?;
            Ok(())
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut url = self.url(&[&self.config.spreadsheet_id])?;
            url.query_pairs_mut().append_pair("fields", "spreadsheetId");

            let response =
                self.client.get(url).bearer_auth(&self.config.access_token).send().await?;
            check_status(response).await?;
            Ok(())
        })
    }
}

fn table_ref(properties: SheetProperties) -> TableRef {
    let table = TableRef::named(properties.title);
    match properties.sheet_id {
        Some(id) => table.with_id(id),
        None => table,
    }
}

/// Quotes a sheet name for A1 notation and appends an optional cell range.
fn a1_range(sheet: &str, cells: Option<String>) -> String {
    let quoted = format!("'{}'", sheet.replace('\'', "''"));
    match cells {
        Some(cells) => format!("{quoted}!{cells}"),
        None => quoted,
    }
}

/// Column span covered by the header row, e.g. `A:J`.
fn header_span() -> String {
    let last = char::from(b'A' + (HEADER_ROW.len() as u8 - 1));
    format!("A:{last}")
}

/// Maps non-success statuses onto store errors.
async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(&body, MAX_ERROR_BODY));
    warn!(status = status.as_u16(), "Sheets API request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(detail),
        StatusCode::TOO_MANY_REQUESTS => StoreError::QuotaExceeded(detail),
        s if s.is_server_error() => StoreError::Unavailable(detail),
        _ => StoreError::Backend(detail),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
