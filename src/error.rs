//! Error taxonomy for the demographic query engine
//!
//! Every rejected input maps to its own variant so callers can branch on the
//! kind rather than parse message text. Messages name the offending input
//! and, for range errors, the violated bound.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures surfaced by the query engine and its collaborators
#[derive(Debug, Error)]
pub enum QueryError {
    /// Sex argument was not one of the supported enumerated values
    #[error("invalid sex '{0}': expected one of female, male, unisex")]
    InvalidSex(String),

    /// Country is not present in the loaded dataset
    #[error("unknown country '{0}'")]
    InvalidCountry(String),

    /// Birthdate outside the supported birthdate span
    #[error("birthdate {birthdate} is outside the supported range {min} to {max}")]
    BirthdateOutOfRange {
        birthdate: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    /// Calculation date outside the supported span, or before the birthdate
    #[error("calculation date {date} is outside the supported range {min} to {max}")]
    CalculationDateOutOfRange {
        date: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    /// Birthdate and calculation date are individually valid but too far apart
    #[error(
        "calculation from birthdate {birthdate} to {date} spans more than {max_years} years"
    )]
    CalculationTooWide {
        birthdate: NaiveDate,
        date: NaiveDate,
        max_years: u32,
    },

    /// Requested rank has no solution within the supported date span
    #[error("rank {rank} is not reachable within the supported date range (maximum {max})")]
    RankOutOfRange { rank: i64, max: i64 },

    /// Age lookup outside the tabulated age range
    #[error("age {age:.2} is outside the tabulated range 0 to {max} years")]
    AgeOutOfRange { age: f64, max: u32 },

    /// Age offset string could not be parsed
    #[error("invalid age offset '{0}': expected a day count or e.g. '12y34m56d'")]
    InvalidOffset(String),

    /// The raw dataset is missing a row the builder requires
    #[error("dataset has no population counts for {country} in {year}")]
    MissingData { country: String, year: i32 },

    /// Backing store failure while reading or writing a cached table
    #[error("extrapolation table store: {0}")]
    Store(#[from] StoreError),
}

/// Failures in the table store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("no entry for key '{0}'")]
    MissingEntry(String),
}
