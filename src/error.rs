use serde::Serialize;
use thiserror::Error;

/// Failure talking to the remote spreadsheet store.
///
/// Never retried by the crate. Read paths turn it into an empty result plus
/// a reported error; the write path wraps it in [`AppendError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout and similar.
    #[error("network failure: {0}")]
    Network(String),

    /// The store rejected our credentials (HTTP 401/403).
    #[error("authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Rate limit or quota exhausted (HTTP 429).
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Any other non-success HTTP status.
    #[error("remote store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The store is not reachable at all (used by the in-memory store).
    #[error("spreadsheet store unreachable")]
    Unreachable,
}

/// The header row could not be read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("header row unreadable: {0}")]
    Unreachable(#[from] TransportError),
}

/// The append call failed after the record passed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppendError {
    /// The sheet has no header row, so there is nothing to align the record to.
    #[error("cannot append: sheet headers not found")]
    MissingHeaders,

    /// None of the record's keys names a column of the live schema.
    #[error("cannot append: no field matches a sheet column ({0:?})")]
    NoMatchingColumns(Vec<String>),

    /// Form labels the live schema lacks; the record would land in the wrong
    /// columns or be dropped.
    #[error("cannot append: sheet has no column for {0:?}")]
    MissingColumns(Vec<String>),

    /// The form definition could not be read, so record keys are unknown.
    #[error("form definition unavailable: {0}")]
    FormUnavailable(TransportError),

    #[error("could not read sheet headers before appending: {0}")]
    Schema(#[from] SchemaError),

    #[error("failed to append row: {0}")]
    Transport(#[from] TransportError),
}

/// One failed required-field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    NameRequired,
    RequestDateRequired,
    ToDateRequired,
    AssignedToRequired,
    TopicRequired,
    AmountNotPositive,
    UnitRequired,
    RoomRequired,
    BuildingRequired,
    ZoneRequired,
    ContactRequired,
}

impl Violation {
    pub fn message(&self) -> &'static str {
        match self {
            Violation::NameRequired => "Name is required.",
            Violation::RequestDateRequired => "Request Date is required.",
            Violation::ToDateRequired => "To Date is required.",
            Violation::AssignedToRequired => "Assigned To is required.",
            Violation::TopicRequired => "Topic is required.",
            Violation::AmountNotPositive => "Amount must be greater than zero.",
            Violation::UnitRequired => "Unit is required.",
            Violation::RoomRequired => "Room is required.",
            Violation::BuildingRequired => "Building is required.",
            Violation::ZoneRequired => "Zoon is required.",
            Violation::ContactRequired => "Contact information is required.",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Every required-field rule that failed for one submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} required field rule(s) failed", violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

/// Per-recipient delivery failure. Logged, never propagated past the form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("delivery to {recipient} rejected with HTTP {status}")]
    Rejected { recipient: String, status: u16 },

    #[error("invalid recipient address {0:?}")]
    InvalidRecipient(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid Google Sheets URL or spreadsheet ID: {0:?}")]
    InvalidSheetUrl(String),

    #[error("invalid range {0:?}")]
    InvalidRange(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build export: {0}")]
    Build(String),
}
