//! Raw demographic datasets and their lookup/interpolation accessors
//!
//! The tables are loaded once at startup and are immutable afterwards, so
//! they can be shared freely across threads behind an `Arc`.

mod records;
pub mod loader;

pub use loader::LoadedTables;
pub use records::{AgeOffset, AgePopulation, PopulationCount, Sex, SexValues};

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::Path;

/// Highest tabulated age; data above it is folded into this bucket
pub const MAX_AGE: u32 = 100;

/// country -> year -> per-age counts (index = age)
pub type PopulationTable = HashMap<String, BTreeMap<i32, Vec<SexValues>>>;

/// country -> year -> age -> value
pub type AgeTable = HashMap<String, BTreeMap<i32, BTreeMap<u32, SexValues>>>;

/// Mid-year anchor date used for interpolating yearly observations
fn mid_year(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 7, 1).expect("mid-year date")
}

fn year_weight(lower: i32, upper: i32, year: f64) -> f64 {
    if upper > lower {
        ((year - lower as f64) / (upper - lower) as f64).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Interpolate an age-keyed map at a fractional age, clamping at both ends
fn age_interp(map: &BTreeMap<u32, SexValues>, sex: Sex, age: f64) -> Option<f64> {
    let floor = age.max(0.0).floor() as u32;
    let (a0, v0) = map
        .range(..=floor)
        .next_back()
        .or_else(|| map.iter().next())?;
    let (a1, v1) = map.range(floor + 1..).next().unwrap_or((a0, v0));
    let lo = v0.get(sex);
    let hi = v1.get(sex);
    if a1 > a0 {
        let w = ((age - *a0 as f64) / (a1 - a0) as f64).clamp(0.0, 1.0);
        Some(lo + (hi - lo) * w)
    } else {
        Some(lo)
    }
}

/// Immutable container for all raw demographic tables
pub struct Datasets {
    population: PopulationTable,
    life_expectancy: AgeTable,
    survival_ratio: AgeTable,
    total_population: BTreeMap<i32, f64>,
    birth_distribution: HashMap<String, Vec<f64>>,
    countries: Vec<String>,
}

impl Datasets {
    /// Build the container from loaded tables, deriving the country list
    /// from the population table
    pub fn new(tables: LoadedTables) -> Self {
        let mut countries: Vec<String> = tables.population.keys().cloned().collect();
        countries.sort();
        Self {
            population: tables.population,
            life_expectancy: tables.life_expectancy,
            survival_ratio: tables.survival_ratio,
            total_population: tables.total_population,
            birth_distribution: tables.birth_distribution,
            countries,
        }
    }

    /// Load all tables from CSV files in a specific directory
    pub fn from_csv_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self::new(LoadedTables::load_from(path)?))
    }

    /// Load all tables from the default data directory
    pub fn from_csv() -> Result<Self, Box<dyn Error>> {
        Ok(Self::new(LoadedTables::load_default()?))
    }

    /// All countries present in the population table, sorted
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn contains_country(&self, country: &str) -> bool {
        self.population.contains_key(country)
    }

    /// Tabulated population count for an exact (country, year, age) cell
    pub fn population(&self, country: &str, year: i32, age: u32, sex: Sex) -> Option<f64> {
        self.population
            .get(country)?
            .get(&year)?
            .get(age.min(MAX_AGE) as usize)
            .map(|v| v.get(sex))
    }

    /// Yearly series for one country, keyed by year ascending
    pub fn population_series(&self, country: &str) -> Option<&BTreeMap<i32, Vec<SexValues>>> {
        self.population.get(country)
    }

    /// First and last tabulated year for a country
    pub fn year_span(&self, country: &str) -> Option<(i32, i32)> {
        let series = self.population.get(country)?;
        let first = *series.keys().next()?;
        let last = *series.keys().next_back()?;
        Some((first, last))
    }

    /// Population of one age bucket at an arbitrary date, linearly
    /// interpolated between mid-year observations and clamped at the ends
    pub fn population_on(&self, country: &str, date: NaiveDate, age: u32, sex: Sex) -> f64 {
        let year = date.year();
        let (y0, y1) = if date < mid_year(year) {
            (year - 1, year)
        } else {
            (year, year + 1)
        };
        let v0 = self.population(country, y0, age, sex);
        let v1 = self.population(country, y1, age, sex);
        match (v0, v1) {
            (Some(lo), Some(hi)) => {
                let span = (mid_year(y1) - mid_year(y0)).num_days() as f64;
                let elapsed = (date - mid_year(y0)).num_days() as f64;
                lo + (hi - lo) * (elapsed / span)
            }
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => 0.0,
        }
    }

    /// Remaining life expectancy interpolated over (fractional year,
    /// fractional age)
    pub fn life_expectancy_at(
        &self,
        country: &str,
        sex: Sex,
        year: f64,
        age: f64,
    ) -> Option<f64> {
        let table = self.life_expectancy.get(country)?;
        let floor = year.floor() as i32;
        let (y0, ages0) = table
            .range(..=floor)
            .next_back()
            .or_else(|| table.iter().next())?;
        let (y1, ages1) = table.range(floor + 1..).next().unwrap_or((y0, ages0));
        let lo = age_interp(ages0, sex, age)?;
        let hi = age_interp(ages1, sex, age)?;
        let w = year_weight(*y0, *y1, year);
        Some(lo + (hi - lo) * w)
    }

    /// One-year survival probability at the nearest tabulated (year, age)
    /// at or below the requested cell
    pub fn survival_ratio_at(&self, country: &str, sex: Sex, year: i32, age: u32) -> Option<f64> {
        let table = self.survival_ratio.get(country)?;
        let (_, ages) = table
            .range(..=year)
            .next_back()
            .or_else(|| table.iter().next())?;
        let (_, value) = ages
            .range(..=age)
            .next_back()
            .or_else(|| ages.iter().next())?;
        Some(value.get(sex))
    }

    /// Reference total population for a year
    pub fn total_population_in(&self, year: i32) -> Option<f64> {
        self.total_population.get(&year).copied()
    }

    /// Largest reference total across all tabulated years
    pub fn max_total_population(&self) -> f64 {
        self.total_population.values().fold(0.0, |acc, v| acc.max(*v))
    }

    /// Share of a year's births falling on the given day of year; uniform
    /// when no distribution is tabulated for the country
    pub fn birth_share(&self, country: &str, day_of_year: u32) -> f64 {
        match self.birth_distribution.get(country) {
            Some(shares) if !shares.is_empty() => {
                let idx = (day_of_year.max(1) as usize - 1).min(shares.len() - 1);
                shares[idx].max(0.0)
            }
            _ => 1.0 / 365.0,
        }
    }
}
