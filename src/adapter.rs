use crate::cache::TableCache;
use crate::config::SheetAddress;
use crate::error::{AppendError, SchemaError, TransportError};
use crate::schema::Schema;
use crate::table::Table;
use crate::transport::{AppendConfirmation, SheetTransport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A record to store: header text → cell text.
pub type Record = HashMap<String, String>;

/// How a read went, in the three shapes a caller renders differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReadState {
    Ok,
    /// Reachable, but no data rows (or no header row at all).
    Empty,
    Unreachable { message: String },
}

/// Result of a best-effort table read.
///
/// On transport failure `table` is empty and `error` holds the failure, so
/// the caller can keep rendering and still show what went wrong.
#[derive(Debug, Clone)]
pub struct TableRead {
    pub table: Table,
    pub error: Option<TransportError>,
}

impl TableRead {
    /// How a client should render this read.
    pub fn state(&self) -> ReadState {
        match (&self.error, self.table.is_empty()) {
            (Some(e), _) => ReadState::Unreachable { message: e.to_string() },
            (None, true) => ReadState::Empty,
            (None, false) => ReadState::Ok,
        }
    }
}

/// Treats one spreadsheet range as a table with a runtime schema.
#[derive(Clone)]
pub struct TabularAdapter {
    transport: Arc<dyn SheetTransport>,
    address: SheetAddress,
    cache: TableCache,
}

impl TabularAdapter {
    /// Create an adapter for one range.
    ///
    /// # Arguments
    /// * `transport` - Store access shared with other adapters
    /// * `address` - Spreadsheet id and range holding header and data rows
    /// * `cache` - Read cache, possibly shared; keys include the range
    pub fn new(transport: Arc<dyn SheetTransport>, address: SheetAddress, cache: TableCache) -> Self {
        Self {
            transport,
            address,
            cache,
        }
    }

    /// Where this adapter reads and writes.
    pub fn address(&self) -> &SheetAddress {
        &self.address
    }

    fn cache_key(&self) -> String {
        TableCache::key(&self.address.sheet_id, &self.address.range)
    }

    /// Read the header row. Never cached.
    ///
    /// An empty schema means the sheet has not been initialized; that is not
    /// an error.
    pub async fn get_schema(&self) -> Result<Schema, SchemaError> {
        let range = self.address.header_range();
        let values = self.transport.read_range(&self.address.sheet_id, &range).await?;
        let headers = values.into_iter().next().unwrap_or_default();
        if headers.is_empty() {
            log::warn!("Sheet {} has no header row in {}", self.address.sheet_id, range);
        }
        Ok(Schema::new(headers))
    }

    /// Read the whole range as a [`Table`], best effort.
    ///
    /// Served from the cache while it is fresh, otherwise see
    /// [`TabularAdapter::refresh`].
    pub async fn get_table(&self) -> TableRead {
        let key = self.cache_key();
        if let Some(table) = self.cache.get(&key) {
            log::debug!("Serving {} from cache", key);
            return TableRead { table, error: None };
        }
        self.refresh().await
    }

    /// Read the whole range from the store, bypassing the cache.
    ///
    /// A successful read replaces the cached table. A failed read leaves the
    /// cache alone and yields an empty table plus the error.
    pub async fn refresh(&self) -> TableRead {
        let key = self.cache_key();
        match self
            .transport
            .read_range(&self.address.sheet_id, &self.address.range)
            .await
        {
            Ok(values) => {
                let table = Table::from_values(values);
                log::debug!(
                    "Read {} rows x {} columns from {}",
                    table.len(),
                    table.schema().len(),
                    key
                );
                self.cache.insert(key, table.clone());
                TableRead { table, error: None }
            }
            Err(e) => {
                log::error!("Failed to read {}: {}", key, e);
                TableRead {
                    table: Table::empty(),
                    error: Some(e),
                }
            }
        }
    }

    /// Align `record` to `schema` and append it.
    ///
    /// Keys are matched against headers exactly; headers without a value are
    /// written as empty strings. Values are not type-checked.
    ///
    /// # Arguments
    /// * `record` - Values keyed by header text
    /// * `schema` - The live header row of the target range
    ///
    /// # Returns
    /// The store's confirmation, or [`AppendError::MissingHeaders`] for an
    /// uninitialized sheet and [`AppendError::NoMatchingColumns`] when no key
    /// names a column. Nothing is written in either case.
    pub async fn append_record(
        &self,
        record: &Record,
        schema: &Schema,
    ) -> Result<AppendConfirmation, AppendError> {
        if schema.is_empty() {
            log::error!("Cannot append to {}: sheet headers not found", self.address.range);
            return Err(AppendError::MissingHeaders);
        }

        let mut unmatched: Vec<String> = record
            .keys()
            .filter(|key| schema.position(key).is_none())
            .cloned()
            .collect();
        unmatched.sort();
        if unmatched.len() == record.len() {
            log::error!(
                "Cannot append to {}: no record key matches a column ({:?})",
                self.address.range,
                unmatched
            );
            return Err(AppendError::NoMatchingColumns(unmatched));
        }
        if !unmatched.is_empty() {
            log::warn!("Dropping keys with no column in {}: {:?}", self.address.range, unmatched);
        }

        let row: Vec<String> = schema
            .headers()
            .iter()
            .map(|header| record.get(header).cloned().unwrap_or_default())
            .collect();

        let confirmation = self
            .transport
            .append_row(&self.address.sheet_id, &self.address.range, row)
            .await
            .inspect_err(|e| log::error!("Failed to append row to {}: {}", self.address.range, e))?;

        self.cache.invalidate(&self.cache_key());
        log::info!(
            "{} cells appended at {}",
            confirmation.updated_cells,
            confirmation.updated_range
        );
        Ok(confirmation)
    }

    /// Read the live schema, then append against it.
    pub async fn append_with_live_schema(&self, record: &Record) -> Result<AppendConfirmation, AppendError> {
        let schema = self.get_schema().await?;
        self.append_record(record, &schema).await
    }
}
