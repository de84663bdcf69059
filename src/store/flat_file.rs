//! One-file-per-key table store
//!
//! Each entry lives in `<dir>/<key>.json`. Writes land in a temp file first
//! and are renamed into place, so a concurrent reader never observes a
//! partially written table.

use super::TableStore;
use crate::error::StoreError;
use crate::extrapolation::ExtrapolationTable;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct FlatFileStore {
    dir: PathBuf,
}

impl FlatFileStore {
    /// Open (creating if necessary) a store rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl TableStore for FlatFileStore {
    fn exists(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }

    fn read(&self, key: &str) -> Result<ExtrapolationTable, StoreError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Err(StoreError::MissingEntry(key.to_string()));
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write(&self, key: &str, table: &ExtrapolationTable) -> Result<(), StoreError> {
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, table)?;
        writer.flush()?;
        fs::rename(tmp, self.entry_path(key))?;
        Ok(())
    }
}
