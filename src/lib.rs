#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A TPC-C style OLTP benchmark for key-value stores.
//!
//! With `tpccbench`, you populate a key-value store with the nine TPC-C tables (plus two secondary
//! indexes) and then drive a configurable mix of the five TPC-C transactions against it, reporting
//! throughput in transactions per minute.
//!
//! The store is a black box behind the [`KVMap`] and [`KVMapHandle`] traits. Every table row is a
//! fixed-width integer [`Key`] mapped to an encoded record, so any store that can put and get
//! bytes by a 64-bit key can be benchmarked. Built-in stores are an in-memory sharded hash map, a
//! custom append-only log store and (with the `rocksdb` feature) RocksDB. New stores can be
//! registered from other crates without touching this one, see [`mod@stores`].
//!
//! A few key design choices include:
//!
//! - The initial dataset is deterministic. Each table is populated by its own seeded generator, so
//! loading the same scale twice yields byte-identical stores.
//! - Configuration is explicit and immutable. Scale, workload mix and benchmark options are parsed
//! once from TOML and handed to the loader and workers at construction time.
//! - Workers share nothing but the store. Each has its own generator and store handle, and all
//! cross-worker coordination is left to the store.
//!
//! More detailed usage could be found in the module-level rustdocs:
//!
//! - [`mod@bench`] for the config format of a benchmark.
//! - [`mod@tpcc`] for the dataset options, the loader and the transactions.
//! - [`mod@stores`] for the config format of a built-in key-value store.
//! - [`cmdline()`] for the usage of the default command line interface.

/// The fixed-width key of every row in the store.
pub type Key = u64;

/// A synchronous, thread-safe key-value store.
///
/// This trait is used for owned stores, with which a per-thread handle can be created.
pub trait KVMap: Send + Sync + 'static {
    /// Create a handle that can be used by one worker thread.
    /// For most stores, this can just be done using an Arc.
    fn handle(&self) -> Box<dyn KVMapHandle>;
}

/// A per-thread handle that references a [`KVMap`].
///
/// The handle is the real object that exposes a key-value interface.
pub trait KVMapHandle {
    /// Adding a new key-value pair or blindly updating an existing key's value.
    ///
    /// Returns the number of newly inserted keys: 1 for a new key, 0 if an existing value was
    /// replaced or the write failed. Stores that cannot tell the two apart return 1.
    fn put(&mut self, key: Key, value: &[u8]) -> usize;

    /// Retrieving the value of a key if it exists.
    fn get(&mut self, key: Key) -> Option<Box<[u8]>>;

    /// Bulk-loading a key-value pair during population. Stores may trade durability or
    /// read-your-writes latency for speed here.
    fn load(&mut self, key: Key, value: &[u8]) -> usize {
        self.put(key, value)
    }
}

pub mod bench;
mod cmdline;
pub mod error;
pub mod stores;
pub mod tpcc;
pub mod workload;

pub use cmdline::cmdline;
pub use error::{Error, ErrorKind, Result};

pub extern crate inventory;
pub extern crate toml;
