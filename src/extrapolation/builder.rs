//! Builds cohort birth curves from the raw yearly tables
//!
//! Yearly age-bucketed counts are turned into a daily cumulative curve in
//! two steps: estimate each calendar year's cohort births, then spread them
//! across the year with the country's day-of-year birth distribution.

use super::{ExtrapolationTable, TableBuilder};
use crate::data::{Datasets, Sex, MAX_AGE};
use crate::error::QueryError;
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;

/// Survival ratios below this are treated as data noise
const MIN_SURVIVAL: f64 = 0.2;

/// Production table builder over the shared raw datasets
///
/// Pure with respect to its inputs: the datasets are immutable and the
/// produced curve depends only on (sex, country, span).
pub struct CohortCurveBuilder {
    datasets: Arc<Datasets>,
    start: NaiveDate,
    end: NaiveDate,
}

impl CohortCurveBuilder {
    pub fn new(datasets: Arc<Datasets>, start: NaiveDate, end: NaiveDate) -> Self {
        Self { datasets, start, end }
    }

    /// Estimated births of the cohort during one calendar year
    ///
    /// The mid-year age-0 count has already lost roughly half a year of
    /// infant mortality, so it is divided back by the half-year exposure.
    /// Years before the first observation are recovered by chaining the
    /// earliest survival ratios down the cohort's age diagonal; years past
    /// the last observation carry the final estimate forward.
    fn yearly_births(&self, sex: Sex, country: &str, year: i32) -> Result<f64, QueryError> {
        let ds = &self.datasets;
        if let Some(pop0) = ds.population(country, year, 0, sex) {
            let sr0 = ds
                .survival_ratio_at(country, sex, year, 0)
                .unwrap_or(1.0)
                .clamp(MIN_SURVIVAL, 1.0);
            return Ok(pop0 / (0.5 * (1.0 + sr0)));
        }

        let (first, last) = ds
            .year_span(country)
            .ok_or_else(|| QueryError::InvalidCountry(country.to_string()))?;
        if year > last {
            return self.yearly_births(sex, country, last);
        }
        if year >= first {
            return Err(QueryError::MissingData {
                country: country.to_string(),
                year,
            });
        }

        let age = ((first - year) as u32).min(MAX_AGE);
        let observed = ds
            .population(country, first, age, sex)
            .ok_or_else(|| QueryError::MissingData {
                country: country.to_string(),
                year: first,
            })?;
        let mut survival = 1.0;
        for a in 0..age {
            let sr = ds.survival_ratio_at(country, sex, first, a).unwrap_or(1.0);
            survival *= sr.clamp(MIN_SURVIVAL, 1.0);
        }
        Ok(observed / survival.max(1e-6))
    }
}

impl TableBuilder for CohortCurveBuilder {
    fn build(&self, sex: Sex, country: &str) -> Result<ExtrapolationTable, QueryError> {
        if !self.datasets.contains_country(country) {
            return Err(QueryError::InvalidCountry(country.to_string()));
        }

        let capacity = (self.end - self.start).num_days().max(0) as usize + 1;
        let mut values = Vec::with_capacity(capacity);
        let mut births_by_year: HashMap<i32, f64> = HashMap::new();
        let mut cumulative = 0.0;

        for day in self.start.iter_days() {
            if day > self.end {
                break;
            }
            let year = day.year();
            let births = match births_by_year.get(&year) {
                Some(b) => *b,
                None => {
                    let b = self.yearly_births(sex, country, year)?;
                    births_by_year.insert(year, b);
                    b
                }
            };
            cumulative += births * self.datasets.birth_share(country, day.ordinal());
            values.push(cumulative);
        }

        Ok(ExtrapolationTable::new(sex, country, self.start, values))
    }
}
