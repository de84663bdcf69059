//! CSV-based raw dataset loader
//!
//! Loads the five source tables from CSV files in a data directory. Column
//! names follow the published dataset headers; ages above the tabulated
//! maximum are folded into the open-ended top bucket.

use super::records::SexValues;
use super::{AgeTable, PopulationTable, MAX_AGE};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

/// Default path to the raw dataset directory
pub const DEFAULT_DATA_PATH: &str = "data";

#[derive(Debug, serde::Deserialize)]
struct PopulationRow {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Time")]
    time: i32,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "PopMale")]
    pop_male: f64,
    #[serde(rename = "PopFemale")]
    pop_female: f64,
    #[serde(rename = "PopTotal")]
    pop_total: f64,
}

#[derive(Debug, serde::Deserialize)]
struct AgeValueRow {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Time")]
    time: i32,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "Female")]
    female: f64,
    #[serde(rename = "Male")]
    male: f64,
    #[serde(rename = "Total")]
    total: f64,
}

#[derive(Debug, serde::Deserialize)]
struct TotalPopulationRow {
    #[serde(rename = "Time")]
    time: i32,
    #[serde(rename = "Population")]
    population: f64,
}

#[derive(Debug, serde::Deserialize)]
struct BirthShareRow {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "DayOfYear")]
    day_of_year: u32,
    #[serde(rename = "Share")]
    share: f64,
}

/// Load the population table from any reader
pub fn load_population_from_reader<R: Read>(reader: R) -> Result<PopulationTable, Box<dyn Error>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut table: PopulationTable = HashMap::new();

    for result in csv_reader.deserialize() {
        let row: PopulationRow = result?;
        let by_age = table
            .entry(row.location)
            .or_default()
            .entry(row.time)
            .or_insert_with(|| vec![SexValues::default(); MAX_AGE as usize + 1]);
        // Fold the open-ended top bucket into the last tabulated age
        let idx = row.age.min(MAX_AGE) as usize;
        by_age[idx].female += row.pop_female;
        by_age[idx].male += row.pop_male;
        by_age[idx].unisex += row.pop_total;
    }

    Ok(table)
}

/// Load the population table from `population.csv`
pub fn load_population(path: &Path) -> Result<PopulationTable, Box<dyn Error>> {
    let file = File::open(path.join("population.csv"))?;
    load_population_from_reader(file)
}

fn load_age_value_table<R: Read>(reader: R) -> Result<AgeTable, Box<dyn Error>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut table: AgeTable = HashMap::new();

    for result in csv_reader.deserialize() {
        let row: AgeValueRow = result?;
        table
            .entry(row.location)
            .or_default()
            .entry(row.time)
            .or_default()
            .insert(row.age.min(MAX_AGE), SexValues::new(row.female, row.male, row.total));
    }

    Ok(table)
}

/// Load the remaining-life-expectancy-at-age table from `life_expectancy.csv`
pub fn load_life_expectancy(path: &Path) -> Result<AgeTable, Box<dyn Error>> {
    let file = File::open(path.join("life_expectancy.csv"))?;
    load_age_value_table(file)
}

/// Load the life-expectancy table from any reader
pub fn load_life_expectancy_from_reader<R: Read>(reader: R) -> Result<AgeTable, Box<dyn Error>> {
    load_age_value_table(reader)
}

/// Load one-year survival probabilities from `survival_ratio.csv`
pub fn load_survival_ratio(path: &Path) -> Result<AgeTable, Box<dyn Error>> {
    let file = File::open(path.join("survival_ratio.csv"))?;
    load_age_value_table(file)
}

/// Load yearly reference totals from `total_population.csv`
pub fn load_total_population(path: &Path) -> Result<BTreeMap<i32, f64>, Box<dyn Error>> {
    let file = File::open(path.join("total_population.csv"))?;
    let mut csv_reader = csv::Reader::from_reader(file);
    let mut table = BTreeMap::new();

    for result in csv_reader.deserialize() {
        let row: TotalPopulationRow = result?;
        table.insert(row.time, row.population);
    }

    Ok(table)
}

/// Load day-of-year birth shares from `births_by_day.csv`
pub fn load_birth_distribution(
    path: &Path,
) -> Result<HashMap<String, Vec<f64>>, Box<dyn Error>> {
    let file = File::open(path.join("births_by_day.csv"))?;
    let mut csv_reader = csv::Reader::from_reader(file);
    let mut table: HashMap<String, Vec<f64>> = HashMap::new();

    for result in csv_reader.deserialize() {
        let row: BirthShareRow = result?;
        let shares = table.entry(row.location).or_insert_with(|| vec![0.0; 365]);
        if (1..=365).contains(&row.day_of_year) {
            shares[row.day_of_year as usize - 1] = row.share.max(0.0);
        }
    }

    Ok(table)
}

/// All raw tables loaded from one data directory
pub struct LoadedTables {
    pub population: PopulationTable,
    pub life_expectancy: AgeTable,
    pub survival_ratio: AgeTable,
    pub total_population: BTreeMap<i32, f64>,
    pub birth_distribution: HashMap<String, Vec<f64>>,
}

impl LoadedTables {
    /// Load all tables from the default data directory
    pub fn load_default() -> Result<Self, Box<dyn Error>> {
        Self::load_from(Path::new(DEFAULT_DATA_PATH))
    }

    /// Load all tables from a specific directory
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        let start = Instant::now();
        let tables = Self {
            population: load_population(path)?,
            life_expectancy: load_life_expectancy(path)?,
            survival_ratio: load_survival_ratio(path)?,
            total_population: load_total_population(path)?,
            birth_distribution: load_birth_distribution(path)?,
        };
        log::info!("Parsed raw dataset CSVs in {:.02?}", start.elapsed());
        Ok(tables)
    }
}
