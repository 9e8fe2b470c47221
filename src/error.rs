use std::fmt;

use thiserror::Error;

/// Failures surfaced by a `BrowserDriver`.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{action} on {target} failed: {reason}")]
    Action {
        action: &'static str,
        target: String,
        reason: String,
    },

    #[error("browser session lost: {0}")]
    Session(String),
}

/// Listing fields read from a job card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ExternalId,
    Company,
    Title,
    Location,
    Region,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::ExternalId => "external_id",
            Field::Company => "company",
            Field::Title => "title",
            Field::Location => "location",
            Field::Region => "region",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("required field `{0}` could not be read")]
    FieldMissing(Field),

    /// The browser stopped answering mid-read. Not a per-listing problem.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record failed required-field validation and never reached SQL.
    #[error("record rejected: `{0}` is empty")]
    Rejected(Field),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a search session. Teardown still runs.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser failure: {0}")]
    Driver(#[from] DriverError),

    #[error("record store failure: {0}")]
    Store(#[from] StoreError),
}
