//! Record types shared across the raw datasets and the query surface

use crate::error::QueryError;
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sex of a queried cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
    /// Both sexes combined
    Unisex,
}

impl Sex {
    /// All supported values, in dataset column order
    pub const ALL: [Sex; 3] = [Sex::Female, Sex::Male, Sex::Unisex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
            Sex::Unisex => "unisex",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "female" => Ok(Sex::Female),
            "male" => Ok(Sex::Male),
            "unisex" => Ok(Sex::Unisex),
            other => Err(QueryError::InvalidSex(other.to_string())),
        }
    }
}

/// One value per sex column of a raw table row
///
/// Used for population counts, remaining life expectancy in years and
/// one-year survival probabilities alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SexValues {
    pub female: f64,
    pub male: f64,
    pub unisex: f64,
}

impl SexValues {
    pub fn new(female: f64, male: f64, unisex: f64) -> Self {
        Self { female, male, unisex }
    }

    pub fn get(&self, sex: Sex) -> f64 {
        match sex {
            Sex::Female => self.female,
            Sex::Male => self.male,
            Sex::Unisex => self.unisex,
        }
    }
}

/// Calendar age offset in whole years, months and days
///
/// Parses the wire formats accepted by the public surface: a bare day count
/// ("123") or unit segments in y/m/d order ("55y4m", "12y34m56d").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeOffset {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl AgeOffset {
    pub fn new(years: u32, months: u32, days: u32) -> Self {
        Self { years, months, days }
    }

    pub fn from_years(years: u32) -> Self {
        Self { years, months: 0, days: 0 }
    }

    /// Offset expressed in fractional years
    pub fn as_fractional_years(&self) -> f64 {
        self.years as f64 + self.months as f64 / 12.0 + self.days as f64 / 365.25
    }

    /// The birthdate implied by this age at `date`
    pub fn backdate(&self, date: NaiveDate) -> NaiveDate {
        let months = self.years * 12 + self.months;
        date.checked_sub_months(Months::new(months))
            .and_then(|d| d.checked_sub_signed(Duration::days(self.days as i64)))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for AgeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}y{}m{}d", self.years, self.months, self.days)
    }
}

impl FromStr for AgeOffset {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || QueryError::InvalidOffset(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        // A bare integer is a day count
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let days = trimmed.parse().map_err(|_| invalid())?;
            return Ok(Self { years: 0, months: 0, days });
        }

        let mut offset = Self::default();
        let mut digits = String::new();
        // Units must appear in y -> m -> d order, each at most once
        let mut next_unit = 0u8;
        for c in trimmed.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if digits.is_empty() {
                return Err(invalid());
            }
            let value: u32 = digits.parse().map_err(|_| invalid())?;
            digits.clear();
            match c {
                'y' if next_unit < 1 => {
                    offset.years = value;
                    next_unit = 1;
                }
                'm' if next_unit < 2 => {
                    offset.months = value;
                    next_unit = 2;
                }
                'd' if next_unit < 3 => {
                    offset.days = value;
                    next_unit = 3;
                }
                _ => return Err(invalid()),
            }
        }
        if !digits.is_empty() {
            return Err(invalid());
        }
        Ok(offset)
    }
}

/// One year of a population time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCount {
    pub year: i32,
    pub total: i64,
}

/// One age of a single-year population pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePopulation {
    pub age: u32,
    pub total: i64,
}
