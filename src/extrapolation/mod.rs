//! Derived extrapolation tables: daily cumulative birth curves per cohort
//!
//! A table is expensive to generate and therefore cached (see `store`);
//! once built it is immutable and serde round-trippable.

mod builder;

pub use builder::CohortCurveBuilder;

use crate::data::Sex;
use crate::error::QueryError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Pluggable generator for extrapolation tables
///
/// Implementations must be deterministic: the same (sex, country) against
/// the same datasets always produces the same table, so regenerating a lost
/// cache entry is never a correctness hazard.
pub trait TableBuilder: Send + Sync {
    fn build(&self, sex: Sex, country: &str) -> Result<ExtrapolationTable, QueryError>;
}

/// Daily-resolution cumulative birth curve for one (sex, country) cohort
///
/// `values[i]` holds the estimated cumulative births of the cohort through
/// the end of day `start + i`. The curve is monotone non-decreasing by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationTable {
    sex: Sex,
    country: String,
    start: NaiveDate,
    values: Vec<f64>,
}

impl ExtrapolationTable {
    pub fn new(sex: Sex, country: impl Into<String>, start: NaiveDate, values: Vec<f64>) -> Self {
        Self {
            sex,
            country: country.into(),
            start,
            values,
        }
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day covered by the curve
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(self.values.len().saturating_sub(1) as i64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cumulative births through the end of `date`
    ///
    /// Zero before the first covered day, clamped to the final value after
    /// the last covered day.
    pub fn value_on(&self, date: NaiveDate) -> f64 {
        if self.values.is_empty() || date < self.start {
            return 0.0;
        }
        let idx = (date - self.start).num_days() as usize;
        self.values[idx.min(self.values.len() - 1)]
    }

    /// Births falling in the half-open day window `(after, through]`
    pub fn births_between(&self, after: NaiveDate, through: NaiveDate) -> f64 {
        if through <= after {
            return 0.0;
        }
        (self.value_on(through) - self.value_on(after)).max(0.0)
    }

    /// Total births accumulated over the whole span
    pub fn total(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    pub fn is_monotonic(&self) -> bool {
        self.values.windows(2).all(|w| w[1] >= w[0])
    }
}
