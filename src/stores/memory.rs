//! An in-memory store built on [`hashbrown::HashMap`]. Internally sharded.
//!
//! ## Configuration Format
//!
//! ``` toml
//! [map]
//! name = "memory"
//! shards = ... # number of shards, default 64
//! ```
//!
//! This store is [`KVMap`].

use crate::error::{Error, Result};
use crate::stores::{parse_opt, Registry};
use crate::{KVMap, KVMapHandle, Key};
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::Arc;

const DEFAULT_SHARDS: usize = 64;

type Shard = RwLock<HashMap<Key, Box<[u8]>>>;

fn shard(key: Key, nr_shards: usize) -> usize {
    let mut hasher = FxHasher::default();
    hasher.write_u64(key);
    (hasher.finish() % nr_shards as u64) as usize
}

#[derive(Clone)]
pub struct MemoryMap {
    nr_shards: usize,
    shards: Arc<Vec<Shard>>,
}

#[derive(Deserialize)]
pub struct MemoryMapOpt {
    pub shards: Option<usize>,
}

impl MemoryMap {
    pub fn new(nr_shards: usize) -> Self {
        let nr_shards = nr_shards.max(1);
        let shards = (0..nr_shards).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            nr_shards,
            shards: Arc::new(shards),
        }
    }

    pub fn new_kvmap(opt: &toml::Table) -> Result<Box<dyn KVMap>> {
        let opt: MemoryMapOpt = parse_opt("memory", opt)?;
        let shards = opt.shards.unwrap_or(DEFAULT_SHARDS);
        if shards == 0 {
            return Err(Error::Config("memory: shards must be positive".into()));
        }
        Ok(Box::new(Self::new(shards)))
    }

    /// Total number of keys across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An ordered copy of the whole contents.
    pub fn snapshot(&self) -> BTreeMap<Key, Box<[u8]>> {
        let mut all = BTreeMap::new();
        for s in self.shards.iter() {
            for (k, v) in s.read().iter() {
                all.insert(*k, v.clone());
            }
        }
        all
    }
}

impl KVMap for MemoryMap {
    fn handle(&self) -> Box<dyn KVMapHandle> {
        Box::new(self.clone())
    }
}

impl KVMapHandle for MemoryMap {
    fn put(&mut self, key: Key, value: &[u8]) -> usize {
        let sid = shard(key, self.nr_shards);
        match self.shards[sid].write().insert(key, value.into()) {
            Some(_) => 0,
            None => 1,
        }
    }

    fn get(&mut self, key: Key) -> Option<Box<[u8]>> {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].read().get(&key).cloned()
    }
}

inventory::submit! {
    Registry::new("memory", MemoryMap::new_kvmap)
}
