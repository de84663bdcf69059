//! Persistence for extrapolation tables
//!
//! A `TableStore` is a file-backed key-value store addressed by the stable
//! (sex, country) key. Existence checks never load a value, so a cache probe
//! stays cheap even when the tables themselves are large.

mod archive;
mod flat_file;

pub use archive::ArchiveStore;
pub use flat_file::FlatFileStore;

use crate::data::Sex;
use crate::error::{QueryError, StoreError};
use crate::extrapolation::{ExtrapolationTable, TableBuilder};
use std::sync::Mutex;
use std::time::Instant;

/// Stable, collision-free store key for a (sex, country) pair
pub fn table_key(sex: Sex, country: &str) -> String {
    format!("{}-{}", sex.as_str(), country.replace(' ', "_"))
}

/// Backing-store contract shared by all backends
pub trait TableStore: Send + Sync {
    /// Whether an entry exists, without loading its value
    fn exists(&self, key: &str) -> bool;

    fn read(&self, key: &str) -> Result<ExtrapolationTable, StoreError>;

    fn write(&self, key: &str, table: &ExtrapolationTable) -> Result<(), StoreError>;
}

/// Get-or-generate cache over a `TableStore` and an injected builder
///
/// A persisted key is never regenerated by this component; staleness is
/// handled externally by deleting the persisted entry. With a non-writable
/// store every call regenerates, which is the expected read-only deployment
/// mode.
pub struct ExtrapolationCache {
    store: Box<dyn TableStore>,
    builder: Box<dyn TableBuilder>,
    writable: bool,
    write_lock: Mutex<()>,
}

impl ExtrapolationCache {
    pub fn new(store: Box<dyn TableStore>, builder: Box<dyn TableBuilder>, writable: bool) -> Self {
        Self {
            store,
            builder,
            writable,
            write_lock: Mutex::new(()),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Return the persisted table for (sex, country), generating and (when
    /// writable) persisting it on first use
    pub fn get_or_generate(
        &self,
        sex: Sex,
        country: &str,
    ) -> Result<ExtrapolationTable, QueryError> {
        let key = table_key(sex, country);

        if self.store.exists(&key) {
            let start = Instant::now();
            let table = self.store.read(&key)?;
            log::info!(
                "Retrieved extrapolation table for ({}, {}) in {:.02?}",
                sex,
                country,
                start.elapsed()
            );
            return Ok(table);
        }

        let start = Instant::now();
        let table = self.builder.build(sex, country)?;
        log::info!(
            "Generated extrapolation table for ({}, {}) in {:.02?}",
            sex,
            country,
            start.elapsed()
        );

        if self.writable {
            let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
            // A concurrent generator may have won the race; keep the first
            // persisted entry authoritative
            if !self.store.exists(&key) {
                let start = Instant::now();
                self.store.write(&key, &table)?;
                log::info!(
                    "Stored extrapolation table for ({}, {}) in {:.02?}",
                    sex,
                    country,
                    start.elapsed()
                );
            }
        }

        Ok(table)
    }
}
