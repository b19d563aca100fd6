//! Adapter implementation of [`rocksdb`].
//!
//! ## Configuration Format
//!
//! ``` toml
//! [map]
//! name = "rocksdb"
//! path = "..." # path to the rocksdb data directory
//! ```
//!
//! This store is [`KVMap`]. RocksDB cannot tell an insert from an overwrite without an extra
//! read, so every successful write counts as an insert.

use crate::error::{Error, Result};
use crate::stores::{parse_opt, Registry};
use crate::{KVMap, KVMapHandle, Key};
use log::error;
use rocksdb::{WriteOptions, DB};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct RocksDBOpt {
    pub path: String,
}

#[derive(Clone)]
pub struct RocksDB {
    db: Arc<DB>,
}

impl RocksDB {
    pub fn new(opt: &RocksDBOpt) -> Result<Self> {
        let db = DB::open_default(&opt.path)
            .map_err(|e| Error::Config(format!("rocksdb: cannot open {}: {}", opt.path, e)))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn new_kvmap(opt: &toml::Table) -> Result<Box<dyn KVMap>> {
        let opt: RocksDBOpt = parse_opt("rocksdb", opt)?;
        Ok(Box::new(Self::new(&opt)?))
    }
}

impl KVMap for RocksDB {
    fn handle(&self) -> Box<dyn KVMapHandle> {
        Box::new(self.clone())
    }
}

// Big-endian keys keep the tables in separate, ordered ranges of the keyspace.
impl KVMapHandle for RocksDB {
    fn put(&mut self, key: Key, value: &[u8]) -> usize {
        match self.db.put(key.to_be_bytes(), value) {
            Ok(()) => 1,
            Err(e) => {
                error!("rocksdb: put {:#018x} failed: {}", key, e);
                0
            }
        }
    }

    fn get(&mut self, key: Key) -> Option<Box<[u8]>> {
        match self.db.get(key.to_be_bytes()) {
            Ok(v) => v.map(|vec| vec.into_boxed_slice()),
            Err(e) => {
                error!("rocksdb: get {:#018x} failed: {}", key, e);
                None
            }
        }
    }

    fn load(&mut self, key: Key, value: &[u8]) -> usize {
        let mut opts = WriteOptions::default();
        opts.disable_wal(true);
        match self.db.put_opt(key.to_be_bytes(), value, &opts) {
            Ok(()) => 1,
            Err(e) => {
                error!("rocksdb: load {:#018x} failed: {}", key, e);
                0
            }
        }
    }
}

inventory::submit! {
    Registry::new("rocksdb", RocksDB::new_kvmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_load() {
        let dir = tempfile::tempdir().unwrap();
        let opt = RocksDBOpt {
            path: dir.path().to_str().unwrap().to_string(),
        };
        let map = RocksDB::new(&opt).unwrap();
        let mut handle = map.handle();
        assert_eq!(handle.put(1, b"a"), 1);
        assert_eq!(handle.put(1, b"b"), 1);
        assert_eq!(handle.load(2, b"c"), 1);
        assert_eq!(handle.get(1), Some((*b"b").into()));
        assert_eq!(map.handle().get(2), Some((*b"c").into()));
        assert_eq!(handle.get(3), None);
    }
}
