use heed::types::{Bytes, SerdeBincode, Str};
use heed::{Database, Env, EnvOpenOptions};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RetrievalError, Result};
use crate::vector_entry::IndexEntry;

const MAP_SIZE: usize = 1024 * 1024 * 1024; // 1GB
const ENTRIES_DB: &str = "entries";
const META_DB: &str = "meta";
const MAX_DBS: u32 = 4;

pub const NEXT_ID_KEY: &str = "next_id";
pub const DIMENSIONS_KEY: &str = "dimensions";

pub type EntriesDb = Database<Str, Bytes>;
pub type MetaDb = Database<Str, SerdeBincode<u64>>;

/// Outcome of looking up a named database inside the environment.
pub enum Collection<KC, DC> {
    Existing(Database<KC, DC>),
    Absent,
}

fn lookup_collection<KC: 'static, DC: 'static>(env: &Env, name: &str) -> Result<Collection<KC, DC>> {
    let rtxn = env.read_txn()?;
    let found = env.open_database::<KC, DC>(&rtxn, Some(name))?;
    rtxn.commit()?;
    Ok(match found {
        Some(db) => Collection::Existing(db),
        None => Collection::Absent,
    })
}

fn open_or_create<KC: 'static, DC: 'static>(env: &Env, name: &str) -> Result<Database<KC, DC>> {
    match lookup_collection::<KC, DC>(env, name)? {
        Collection::Existing(db) => {
            debug!("Loaded existing collection '{}'", name);
            Ok(db)
        }
        Collection::Absent => {
            let mut wtxn = env.write_txn()?;
            let db = env.create_database::<KC, DC>(&mut wtxn, Some(name))?;
            wtxn.commit()?;
            info!("Created new collection '{}'", name);
            Ok(db)
        }
    }
}

/// LMDB-backed storage for index entries plus a small metadata table.
pub struct LmdbStore {
    env: Env,
    entries: EntriesDb,
    meta: MetaDb,
}

impl LmdbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = PathBuf::from(path.as_ref());

        fs::create_dir_all(&path).map_err(|e| {
            RetrievalError::IndexUnavailable(format!(
                "failed to create directory '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!("Opening LMDB at: {}", path.display());

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(MAX_DBS)
                .open(&path)
                .map_err(|e| {
                    RetrievalError::IndexUnavailable(format!(
                        "failed to open LMDB environment at '{}': {}",
                        path.display(),
                        e
                    ))
                })?
        };

        let entries = open_or_create::<Str, Bytes>(&env, ENTRIES_DB)?;
        let meta = open_or_create::<Str, SerdeBincode<u64>>(&env, META_DB)?;

        Ok(Self { env, entries, meta })
    }

    /// Writes one entry and advances the id counter in a single transaction.
    pub fn insert(&self, entry: &IndexEntry, next_id: u64) -> Result<()> {
        let value = bincode::serialize(entry)?;
        let mut wtxn = self.env.write_txn()?;
        self.entries.put(&mut wtxn, entry.id.as_str(), &value)?;
        self.meta.put(&mut wtxn, NEXT_ID_KEY, &next_id)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn raw_entries(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let rtxn = self.env.read_txn()?;
        let entries = self
            .entries
            .iter(&rtxn)?
            .map(|result| result.map(|(k, v)| (k.to_string(), v.to_vec())))
            .collect::<std::result::Result<Vec<_>, heed::Error>>()?;
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize> {
        let rtxn = self.env.read_txn()?;
        Ok(self.entries.len(&rtxn)? as usize)
    }

    /// Drops every entry. Metadata, including the id counter, is kept.
    pub fn clear(&self) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.entries.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<u64>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.meta.get(&rtxn, key)?)
    }

    pub fn put_meta(&self, key: &str, value: u64) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.meta.put(&mut wtxn, key, &value)?;
        wtxn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_entry::{entry_id, Metadata};
    use tempfile::TempDir;

    fn entry(seq: u64) -> IndexEntry {
        IndexEntry {
            id: entry_id(seq),
            seq,
            vector: vec![1.0, 0.0],
            content: format!("content {}", seq),
            metadata: Metadata {
                source: "a.txt".to_string(),
                chunk_index: seq as usize,
                total_chunks: 3,
                file_path: "/docs/a.txt".to_string(),
            },
        }
    }

    #[test]
    fn collections_are_created_once() {
        let dir = TempDir::new().unwrap();
        let store = LmdbStore::open(dir.path()).unwrap();
        assert!(matches!(
            lookup_collection::<Str, Bytes>(&store.env, ENTRIES_DB).unwrap(),
            Collection::Existing(_)
        ));
        assert!(matches!(
            lookup_collection::<Str, Bytes>(&store.env, "missing").unwrap(),
            Collection::Absent
        ));
    }

    #[test]
    fn insert_count_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = LmdbStore::open(dir.path()).unwrap();
        assert_eq!(store.count().unwrap(), 0);

        store.insert(&entry(0), 1).unwrap();
        store.insert(&entry(1), 2).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get_meta(NEXT_ID_KEY).unwrap(), Some(2));

        let raw = store.raw_entries().unwrap();
        let decoded: IndexEntry = bincode::deserialize(&raw[0].1).unwrap();
        assert_eq!(decoded.content, "content 0");

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.get_meta(NEXT_ID_KEY).unwrap(), Some(2));
    }

    #[test]
    fn meta_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = LmdbStore::open(dir.path()).unwrap();
        assert_eq!(store.get_meta(DIMENSIONS_KEY).unwrap(), None);
        store.put_meta(DIMENSIONS_KEY, 384).unwrap();
        assert_eq!(store.get_meta(DIMENSIONS_KEY).unwrap(), Some(384));
    }
}
