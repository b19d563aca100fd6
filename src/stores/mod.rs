//! The implementation of built-in key-value stores, and the store registry.
//!
//! ## Configuration Format
//!
//! The configuration of a key-value store is stored in a dictionary named `map`. Therefore, a
//! store's configuration file looks like the following:
//!
//! ```toml
//! [map]
//! name = "..."
//! # option1 = ...
//! # option2 = ...
//!
//! ...
//! ```
//! The field `name` must be given and it should be equal to the name registered by the store.
//! Other than `name`, all the fields are parsed as a string map and will be hand over to the
//! constructor of the store's constructor function. For available options other than `name`, one
//! can refer to the module-level documentation of a specific store.
//!
//! ## Registering New Stores
//!
//! When users would like to dynamically register new key-value stores from their own crate, first
//! of all, they need to implement [`KVMap`]/[`KVMapHandle`] for the store. Then, they need to
//! create a constructor function with a signature of `fn(&toml::Table) -> Result<Box<dyn KVMap>>`.
//!
//! The final step is to register the store's constructor (along with its name) using
//! [`inventory`]. A minimal example would be: `inventory::submit! { Registry::new("name",
//! constructor_fn) };`.
//!
//! The source code of all built-in stores provide good examples on this process.

use crate::error::{Error, Result};
use crate::KVMap;
use hashbrown::HashMap;
use log::debug;
use serde::Deserialize;
use toml::Table;

/// The constructor of a registered store.
pub type Constructor = fn(&Table) -> Result<Box<dyn KVMap>>;

/// The centralized registry that maps the name of newly added key-value store to its constructor
/// function.
///
/// A user-defined store can use the [`inventory::submit!`] macro to register their own stores to
/// be used in the benchmark framework.
pub struct Registry<'a> {
    pub(crate) name: &'a str,
    constructor: Constructor,
}

impl<'a> Registry<'a> {
    pub const fn new(name: &'a str, constructor: Constructor) -> Self {
        Self { name, constructor }
    }
}

inventory::collect!(Registry<'static>);

/// All registered store names, sorted.
pub fn registered() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = inventory::iter::<Registry>.into_iter().map(|r| r.name).collect();
    names.sort_unstable();
    names
}

/// The `[map]` section: the registered name of a store plus its own options.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct StoreOpt {
    pub name: String,
    #[serde(flatten)]
    pub opt: Table,
}

/// Creates the store selected by `opt` through its registered constructor.
pub fn new_store(opt: &StoreOpt) -> Result<Box<dyn KVMap>> {
    let mut registered: HashMap<&'static str, Constructor> = HashMap::new();
    for r in inventory::iter::<Registry> {
        debug!("Adding supported kvmap: {}", r.name);
        if registered.insert(r.name, r.constructor).is_some() {
            return Err(Error::Config(format!("store {} registered twice", r.name)));
        }
    }
    let f = registered
        .get(opt.name.as_str())
        .ok_or_else(|| Error::Config(format!("map {} not found in registry", opt.name)))?;
    f(&opt.opt)
}

/// Deserializes a store's own options out of the `[map]` table.
pub(crate) fn parse_opt<T: serde::de::DeserializeOwned>(name: &str, opt: &Table) -> Result<T> {
    opt.clone()
        .try_into()
        .map_err(|e| Error::Config(format!("invalid options for {}: {}", name, e)))
}

pub mod logstore;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::KVMapHandle;

    fn map_test(map: &dyn KVMap) {
        let mut handle = map.handle();
        // insert + get
        assert_eq!(handle.put(7, b"bar"), 1);
        assert_eq!(handle.get(7), Some((*b"bar").into()));
        assert_eq!(handle.get(8), None);

        // update
        assert_eq!(handle.put(7, b"0ar"), 0);
        assert_eq!(handle.get(7), Some((*b"0ar").into()));

        // bulk load is visible to other handles
        assert_eq!(handle.load(u64::MAX, b"loaded"), 1);
        let mut other = map.handle();
        assert_eq!(other.get(u64::MAX), Some((*b"loaded").into()));
        assert_eq!(other.get(7), Some((*b"0ar").into()));
    }

    #[test]
    fn memory() {
        let map = memory::MemoryMap::new(16);
        map_test(&map);
    }

    #[test]
    fn logstore() {
        let dir = tempfile::tempdir().unwrap();
        let map = logstore::LogStore::open(dir.path()).unwrap();
        map_test(&map);
    }

    #[test]
    fn registry_builds_stores() {
        assert!(registered().contains(&"memory"));
        assert!(registered().contains(&"logstore"));
        let opt: StoreOpt = toml::from_str("name = \"memory\"\nshards = 8").unwrap();
        let map = new_store(&opt).unwrap();
        map_test(&*map);
    }

    #[test]
    fn unknown_store_is_config_error() {
        let opt: StoreOpt = toml::from_str("name = \"nosuchmap\"").unwrap();
        let e = new_store(&opt).err().unwrap();
        assert_eq!(e.kind(), ErrorKind::Config);
    }
}
