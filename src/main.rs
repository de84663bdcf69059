//! Demographic System CLI
//!
//! Command-line interface for running demographic queries against the raw
//! datasets and the extrapolation table cache

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use demographic_system::{
    AgeOffset, ArchiveStore, CohortCurveBuilder, Datasets, ExtrapolationCache, FlatFileStore,
    QueryEngine, Sex, TableStore, ValidityRange,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Backing store implementation for cached tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// One file per (sex, country) key
    Flat,
    /// Single data file with an offset index
    Archive,
}

#[derive(Parser)]
#[command(name = "demographic_system", version, about = "Demographic queries over population datasets")]
struct Cli {
    /// Directory containing the raw dataset CSVs
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory holding cached extrapolation tables
    #[arg(long, default_value = "data/tables")]
    store_dir: PathBuf,

    #[arg(long, value_enum, default_value = "flat")]
    backend: Backend,

    /// Do not persist newly generated tables
    #[arg(long)]
    read_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// World population rank of a person on a given date
    Rank {
        sex: Sex,
        country: String,
        birthdate: NaiveDate,
        date: NaiveDate,
    },
    /// Date at which a person reaches a given rank
    RankDate {
        sex: Sex,
        country: String,
        birthdate: NaiveDate,
        rank: i64,
    },
    /// Remaining life expectancy at an age (e.g. '55y4m' or a day count)
    LifeExpectancy {
        sex: Sex,
        country: String,
        date: NaiveDate,
        age: AgeOffset,
    },
    /// Life expectancy at birth for a cohort
    TotalLifeExpectancy {
        sex: Sex,
        country: String,
        birthdate: NaiveDate,
    },
    /// Population counts for a country and age, optionally a single year
    Population {
        country: String,
        age: u32,
        year: Option<i32>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let datasets = Datasets::from_csv_path(&cli.data_dir)
        .map_err(|e| anyhow!("loading datasets from {}: {e}", cli.data_dir.display()))?;
    let datasets = Arc::new(datasets);

    let validity = ValidityRange::default();
    let builder = CohortCurveBuilder::new(
        datasets.clone(),
        validity.min_birthdate,
        validity.max_calculation,
    );
    let store: Box<dyn TableStore> = match cli.backend {
        Backend::Flat => Box::new(FlatFileStore::new(&cli.store_dir)?),
        Backend::Archive => Box::new(ArchiveStore::new(&cli.store_dir)?),
    };
    let cache = ExtrapolationCache::new(store, Box::new(builder), !cli.read_only);
    let engine = QueryEngine::with_validity(datasets, cache, validity);

    match cli.command {
        Command::Rank { sex, country, birthdate, date } => {
            let rank = engine.world_population_rank_by_date(sex, &country, birthdate, date)?;
            println!(
                "A {} person born {} in {} is number {} in the reference population on {}",
                sex, birthdate, country, rank, date
            );
        }
        Command::RankDate { sex, country, birthdate, rank } => {
            let date = engine.date_by_world_population_rank(sex, &country, birthdate, rank)?;
            println!(
                "A {} person born {} in {} reaches rank {} on {}",
                sex, birthdate, country, rank, date
            );
        }
        Command::LifeExpectancy { sex, country, date, age } => {
            let years = engine.remaining_life_expectancy(sex, &country, date, age)?;
            println!(
                "A {} person in {} aged {} on {} has {:.2} years remaining",
                sex, country, age, date, years
            );
        }
        Command::TotalLifeExpectancy { sex, country, birthdate } => {
            let years = engine.total_life_expectancy(sex, &country, birthdate)?;
            println!(
                "A {} cohort born {} in {} has a life expectancy of {:.2} years",
                sex, birthdate, country, years
            );
        }
        Command::Population { country, age, year } => {
            println!("year,total");
            for record in engine.population_count(&country, age, year)? {
                println!("{},{}", record.year, record.total);
            }
        }
    }

    Ok(())
}
