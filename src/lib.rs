/*!
# SheetDesk

A production request desk that keeps its data in a spreadsheet.

## Overview

Users submit maintenance, repair and supply requests through a form. Each
submission is validated, appended as a row to a remote spreadsheet, and
announced to the team through a messaging bot. A dashboard reads the same
sheet back and summarizes it.

## Architecture

### Spreadsheet Transport
- `read_range` / `append_row` against one spreadsheet range
- Google Sheets API v4 client, plus an in-memory store for tests and offline runs
- No retries, no locking: each failure is reported once

### Tabular Adapter
- Reads the header row at runtime and treats it as the schema
- Reconciles every row to the schema width (pad, truncate, fill blank lines)
- Maps header-keyed records onto positional columns for appends
- Best-effort reads: an unreachable store yields an empty table and a reported error
- Short TTL cache in front of table reads

### Form Collector
- Labels and selector options come from a form configuration sheet
- Collects every failed required-field rule before refusing a submission
- Appends against the live schema, then notifies recipients independently

### Dashboard Aggregator
- Totals, unique requesters, busiest date
- Grouped counts by requester, topic, team and location
- Daily series with a 7-row moving average and running total
- Weekday × hour density and a one-time/repeat retention split

## Modules

- **range**: A1 range parsing and column letters
- **schema**, **table**: runtime schema and reconciled tables
- **transport**: remote store access
- **cache**: time-boxed table cache
- **adapter**: the sheet-as-table adapter
- **dates**: serial and literal date parsing
- **form**: form definition, validation and submission
- **notify**, **mailer**: Telegram and e-mail delivery
- **dashboard**: aggregates
- **downloader**: CSV and XLSX export
- **config**: startup configuration
- **app**: HTTP routes

## REST API Endpoints

- `GET /api/form` - Form labels and selector options
- `POST /api/requests` - Submit a request
- `GET /api/requests` - Stored requests
- `GET /api/dashboard` - Dashboard aggregates
- `GET /api/export/csv`, `GET /api/export/xlsx` - Downloads
*/

pub mod adapter;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod dates;
pub mod downloader;
pub mod error;
pub mod form;
pub mod notify;
pub mod range;
pub mod schema;
pub mod table;
pub mod transport;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod mailer;

pub use adapter::{ReadState, Record, TableRead, TabularAdapter};
pub use config::AppConfig;
pub use error::*;
pub use schema::Schema;
pub use table::Table;
