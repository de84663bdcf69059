//! Pre-generate extrapolation tables for every sex and country
//!
//! First-time table generation is slow, so deployments warm the cache up
//! front; queries then only ever hit persisted entries.

use anyhow::anyhow;
use clap::Parser;
use demographic_system::{
    ArchiveStore, CohortCurveBuilder, Datasets, ExtrapolationCache, FlatFileStore, Sex,
    TableStore, ValidityRange,
};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "warm_tables", about = "Pre-generate all extrapolation tables")]
struct Cli {
    /// Directory containing the raw dataset CSVs
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory holding cached extrapolation tables
    #[arg(long, default_value = "data/tables")]
    store_dir: PathBuf,

    /// Use the single-file archive backend instead of flat files
    #[arg(long)]
    archive: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let start = Instant::now();
    println!("Loading raw datasets from {}...", cli.data_dir.display());
    let datasets = Datasets::from_csv_path(&cli.data_dir)
        .map_err(|e| anyhow!("loading datasets from {}: {e}", cli.data_dir.display()))?;
    let datasets = Arc::new(datasets);
    println!(
        "Loaded {} countries in {:?}",
        datasets.countries().len(),
        start.elapsed()
    );

    let validity = ValidityRange::default();
    let builder = CohortCurveBuilder::new(
        datasets.clone(),
        validity.min_birthdate,
        validity.max_calculation,
    );
    let store: Box<dyn TableStore> = if cli.archive {
        Box::new(ArchiveStore::new(&cli.store_dir)?)
    } else {
        Box::new(FlatFileStore::new(&cli.store_dir)?)
    };
    let cache = ExtrapolationCache::new(store, Box::new(builder), true);

    let pairs: Vec<(Sex, String)> = Sex::ALL
        .iter()
        .flat_map(|sex| datasets.countries().iter().map(move |c| (*sex, c.clone())))
        .collect();

    println!("Generating {} tables...", pairs.len());
    let gen_start = Instant::now();

    let failures: Vec<String> = pairs
        .par_iter()
        .filter_map(|(sex, country)| match cache.get_or_generate(*sex, country) {
            Ok(_) => None,
            Err(e) => Some(format!("({sex}, {country}): {e}")),
        })
        .collect();

    println!(
        "Generated {} tables in {:?}",
        pairs.len() - failures.len(),
        gen_start.elapsed()
    );
    for failure in &failures {
        eprintln!("failed: {failure}");
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} tables failed to generate", failures.len()))
    }
}
