use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerReportError {
    #[error("Invalid period {year}-{month}: month must be between 1 and 12")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Invalid period range: end {end} is before start {start}")]
    InvalidPeriodRange { start: String, end: String },

    #[error("Invalid setting '{name}': {details}")]
    InvalidSetting { name: String, details: String },

    #[error("Unknown enhanced P&L bucket: {0}")]
    UnknownBucket(String),

    #[error("Invalid month key '{0}': expected YYYY-MM")]
    InvalidMonthKey(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerReportError>;
