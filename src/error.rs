use thiserror::Error;

#[derive(Error, Debug)]
pub enum DonorError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed currency for account {account_id}: {value:?}")]
    MalformedCurrency { account_id: String, value: String },

    #[error("Malformed number for account {account_id}: {value:?}")]
    MalformedNumber { account_id: String, value: String },

    #[error("Malformed date: {value:?}")]
    MalformedDate { value: String },

    #[error("Missing identity column \"Account ID\" in {0}")]
    MissingIdentityColumn(String),

    #[error("Row {line} of {source_name} has no Account ID")]
    BlankIdentityKey { source_name: String, line: u64 },

    #[error("{count} duplicate Account ID row(s) found (strict mode)")]
    DuplicateIdentityKey { count: usize },

    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DonorError>;
