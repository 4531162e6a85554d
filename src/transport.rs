use crate::error::{ConfigError, TransportError};
use crate::range::A1Range;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the store reports back after an append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppendConfirmation {
    /// A1 range the store wrote into, e.g. `Sheet1!A7:O7`.
    pub updated_range: String,
    pub updated_cells: u64,
}

/// Primitive read/append calls against a remote spreadsheet.
///
/// Implementations authenticate once when constructed. Neither call retries
/// and neither provides concurrency control.
#[async_trait]
pub trait SheetTransport: Send + Sync {
    /// All rows in `range`. A range without data yields an empty vector.
    async fn read_range(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, TransportError>;

    /// Append one row after the existing data in `range`.
    async fn append_row(
        &self,
        sheet_id: &str,
        range: &str,
        row: Vec<String>,
    ) -> Result<AppendConfirmation, TransportError>;
}

/// In-process grid store with the same contract as the remote one.
///
/// Each `(sheet_id, tab)` pair is a grid of rows. A range without a sheet
/// name addresses the first tab, called `Sheet1`.
#[derive(Default)]
pub struct MemoryTransport {
    grids: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
    unreachable: AtomicBool,
}

const DEFAULT_TAB: &str = "Sheet1";

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of a tab.
    pub fn seed(&self, sheet_id: &str, tab: &str, rows: Vec<Vec<String>>) {
        let mut grids = self.grids.lock().unwrap_or_else(|e| e.into_inner());
        grids.insert((sheet_id.to_string(), tab.to_string()), rows);
    }

    /// Raw contents of a tab, including the header row.
    pub fn snapshot(&self, sheet_id: &str, tab: &str) -> Vec<Vec<String>> {
        let grids = self.grids.lock().unwrap_or_else(|e| e.into_inner());
        grids
            .get(&(sheet_id.to_string(), tab.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Make every call fail with [`TransportError::Unreachable`] until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), TransportError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(TransportError::Unreachable)
        } else {
            Ok(())
        }
    }

    fn parse(range: &str) -> Result<(String, A1Range), TransportError> {
        let parsed = A1Range::parse(range).map_err(|e: ConfigError| TransportError::Status {
            status: 400,
            message: e.to_string(),
        })?;
        let tab = parsed.sheet.clone().unwrap_or_else(|| DEFAULT_TAB.to_string());
        Ok((tab, parsed))
    }
}

#[async_trait]
impl SheetTransport for MemoryTransport {
    async fn read_range(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, TransportError> {
        self.check_reachable()?;
        let (tab, range) = Self::parse(range)?;
        let grid = self.snapshot(sheet_id, &tab);

        let first = range.first_row() - 1;
        let last = range.end_row.unwrap_or(grid.len()).min(grid.len());
        let offset = range.column_offset();

        let mut out: Vec<Vec<String>> = Vec::new();
        for row in grid.iter().take(last).skip(first) {
            let mut cells: Vec<String> = row.iter().skip(offset).cloned().collect();
            if let Some(width) = range.width() {
                cells.truncate(width);
            }
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            out.push(cells);
        }
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn append_row(
        &self,
        sheet_id: &str,
        range: &str,
        row: Vec<String>,
    ) -> Result<AppendConfirmation, TransportError> {
        self.check_reachable()?;
        let (tab, range) = Self::parse(range)?;
        let offset = range.column_offset();

        let mut grids = self.grids.lock().unwrap_or_else(|e| e.into_inner());
        let grid = grids.entry((sheet_id.to_string(), tab.clone())).or_default();

        let cells = row.len() as u64;
        let mut padded = vec![String::new(); offset];
        padded.extend(row);
        grid.push(padded);

        let row_number = grid.len();
        let first_col = offset + 1;
        let last_col = offset + cells.max(1) as usize;
        Ok(AppendConfirmation {
            updated_range: format!(
                "{}!{}{}:{}{}",
                tab,
                crate::range::col_to_letter(first_col),
                row_number,
                crate::range::col_to_letter(last_col),
                row_number
            ),
            updated_cells: cells,
        })
    }
}

#[cfg(feature = "web")]
pub use google::GoogleSheetsTransport;

#[cfg(feature = "web")]
mod google {
    use super::{AppendConfirmation, SheetTransport};
    use crate::config::SheetsConfig;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use reqwest::{Client, StatusCode, Url};
    use serde::Deserialize;
    use serde_json::Value;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct ValueRange {
        #[serde(default)]
        values: Vec<Vec<Value>>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AppendResponse {
        #[serde(default)]
        updates: Option<UpdateSummary>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct UpdateSummary {
        #[serde(default)]
        updated_range: String,
        #[serde(default)]
        updated_cells: u64,
    }

    #[derive(Debug, Clone)]
    enum Credential {
        Bearer(String),
        ApiKey(String),
        Anonymous,
    }

    /// Google Sheets API v4 client.
    pub struct GoogleSheetsTransport {
        client: Client,
        api_base: Url,
        credential: Credential,
    }

    impl GoogleSheetsTransport {
        pub fn new(config: &SheetsConfig) -> Result<Self, TransportError> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let api_base = Url::parse(config.api_base.trim_end_matches('/'))
                .map_err(|e| TransportError::Network(format!("invalid API base URL: {e}")))?;

            let credential = match (&config.access_token, &config.api_key) {
                (Some(token), _) if !token.is_empty() => Credential::Bearer(token.clone()),
                (_, Some(key)) if !key.is_empty() => Credential::ApiKey(key.clone()),
                _ => {
                    log::warn!("No Sheets credentials configured; requests will be anonymous");
                    Credential::Anonymous
                }
            };

            Ok(Self {
                client,
                api_base,
                credential,
            })
        }

        fn values_url(&self, sheet_id: &str, last_segment: &str) -> Result<Url, TransportError> {
            let mut url = self.api_base.clone();
            url.path_segments_mut()
                .map_err(|_| TransportError::Network("API base URL cannot be a base".to_string()))?
                .pop_if_empty()
                .extend(["spreadsheets", sheet_id, "values", last_segment]);
            if let Credential::ApiKey(key) = &self.credential {
                url.query_pairs_mut().append_pair("key", key);
            }
            Ok(url)
        }

        fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
            match &self.credential {
                Credential::Bearer(token) => request.bearer_auth(token),
                _ => request,
            }
        }

        async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let message = response.text().await.unwrap_or_default();
            Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Auth {
                    status: status.as_u16(),
                    message,
                },
                StatusCode::TOO_MANY_REQUESTS => TransportError::Quota(message),
                _ => TransportError::Status {
                    status: status.as_u16(),
                    message,
                },
            })
        }
    }

    fn network(e: reqwest::Error) -> TransportError {
        TransportError::Network(e.to_string())
    }

    fn cell_text(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    #[async_trait]
    impl SheetTransport for GoogleSheetsTransport {
        async fn read_range(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, TransportError> {
            let url = self.values_url(sheet_id, range)?;
            log::debug!("Reading {} from spreadsheet {}", range, sheet_id);

            let response = self.authorize(self.client.get(url)).send().await.map_err(network)?;
            let body: ValueRange = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))?;

            log::debug!("Read {} rows from {}", body.values.len(), range);
            Ok(body
                .values
                .into_iter()
                .map(|row| row.into_iter().map(cell_text).collect())
                .collect())
        }

        async fn append_row(
            &self,
            sheet_id: &str,
            range: &str,
            row: Vec<String>,
        ) -> Result<AppendConfirmation, TransportError> {
            let mut url = self.values_url(sheet_id, &format!("{range}:append"))?;
            url.query_pairs_mut()
                .append_pair("valueInputOption", "USER_ENTERED")
                .append_pair("insertDataOption", "INSERT_ROWS");
            log::debug!("Appending {} cells to {} in spreadsheet {}", row.len(), range, sheet_id);

            let body = serde_json::json!({ "values": [row] });
            let response = self
                .authorize(self.client.post(url))
                .json(&body)
                .send()
                .await
                .map_err(network)?;
            let parsed: AppendResponse = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))?;

            let updates = parsed.updates.unwrap_or(UpdateSummary {
                updated_range: String::new(),
                updated_cells: 0,
            });
            Ok(AppendConfirmation {
                updated_range: updates.updated_range,
                updated_cells: updates.updated_cells,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_range_reads_as_no_rows() {
        let store = MemoryTransport::new();
        assert!(store.read_range("sheet", "A:Q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_respect_column_bounds_and_trim_trailing_blanks() {
        let store = MemoryTransport::new();
        store.seed(
            "sheet",
            "Sheet1",
            vec![row(&["A", "B", "C", "D"]), row(&["1", "", "", ""]), row(&["", "", "", "x"])],
        );

        let values = store.read_range("sheet", "A:C").await.unwrap();
        assert_eq!(values, vec![row(&["A", "B", "C"]), row(&["1"])]);

        let header = store.read_range("sheet", "B1:D1").await.unwrap();
        assert_eq!(header, vec![row(&["B", "C", "D"])]);
    }

    #[tokio::test]
    async fn append_is_a_pure_append() {
        let store = MemoryTransport::new();
        store.seed("sheet", "Log", vec![row(&["Name", "Topic"])]);

        let first = store.append_row("sheet", "Log!A:B", row(&["Sam", "Repair"])).await.unwrap();
        store.append_row("sheet", "Log!A:B", row(&["Sam", "Repair"])).await.unwrap();

        assert_eq!(first.updated_range, "Log!A2:B2");
        assert_eq!(first.updated_cells, 2);
        assert_eq!(store.snapshot("sheet", "Log").len(), 3);
    }

    #[tokio::test]
    async fn unreachable_store_fails_both_calls() {
        let store = MemoryTransport::new();
        store.set_unreachable(true);
        assert_eq!(store.read_range("s", "A:B").await, Err(TransportError::Unreachable));
        assert!(store.append_row("s", "A:B", vec![]).await.is_err());
        store.set_unreachable(false);
        assert!(store.read_range("s", "A:B").await.is_ok());
    }
}
