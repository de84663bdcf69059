//! Single structured-file table store
//!
//! Entries are appended to one data file; a small JSON index maps keys to
//! (offset, length) so existence checks and lookups never scan or load the
//! (potentially large) values. The index is replaced atomically after every
//! append, and all writes are serialized by the store's lock.

use super::TableStore;
use crate::error::StoreError;
use crate::extrapolation::ExtrapolationTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DATA_FILE: &str = "tables.dat";
const INDEX_FILE: &str = "tables.idx";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct IndexEntry {
    offset: u64,
    len: u64,
}

pub struct ArchiveStore {
    data_path: PathBuf,
    index_path: PathBuf,
    index: Mutex<HashMap<String, IndexEntry>>,
}

impl ArchiveStore {
    /// Open (creating if necessary) an archive rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            let reader = BufReader::new(File::open(&index_path)?);
            serde_json::from_reader(reader)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            data_path: dir.join(DATA_FILE),
            index_path,
            index: Mutex::new(index),
        })
    }

    fn persist_index(&self, index: &HashMap<String, IndexEntry>) -> Result<(), StoreError> {
        let tmp = self.index_path.with_extension("idx.tmp");
        let mut file = File::create(&tmp)?;
        serde_json::to_writer(&mut file, index)?;
        file.flush()?;
        fs::rename(&tmp, &self.index_path)?;
        Ok(())
    }
}

impl TableStore for ArchiveStore {
    fn exists(&self, key: &str) -> bool {
        self.index
            .lock()
            .map(|index| index.contains_key(key))
            .unwrap_or(false)
    }

    fn read(&self, key: &str) -> Result<ExtrapolationTable, StoreError> {
        let entry = {
            let index = self.index.lock().unwrap_or_else(|p| p.into_inner());
            index
                .get(key)
                .copied()
                .ok_or_else(|| StoreError::MissingEntry(key.to_string()))?
        };
        let mut file = File::open(&self.data_path)?;
        file.seek(SeekFrom::Start(entry.offset))?;
        let mut buf = vec![0u8; entry.len as usize];
        file.read_exact(&mut buf)?;
        Ok(serde_json::from_slice(&buf)?)
    }

    fn write(&self, key: &str, table: &ExtrapolationTable) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(table)?;
        let mut index = self.index.lock().unwrap_or_else(|p| p.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.data_path)?;
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&bytes)?;
        file.flush()?;

        index.insert(
            key.to_string(),
            IndexEntry {
                offset,
                len: bytes.len() as u64,
            },
        );
        self.persist_index(&index)
    }
}
