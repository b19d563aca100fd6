//! A log-structured store: every write is appended to a single data file and an in-memory index
//! maps each key to the offset of its latest value.
//!
//! The file is truncated when the store is opened. Nothing is fsynced, compacted or recovered.
//!
//! ## Configuration Format
//!
//! ``` toml
//! [map]
//! name = "logstore"
//! path = "..." # directory that holds the data file
//! ```
//!
//! This store is [`KVMap`].

use crate::error::Result;
use crate::stores::{parse_opt, Registry};
use crate::{KVMap, KVMapHandle, Key};
use hashbrown::HashMap;
use log::{debug, error};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DATA_FILE: &str = "tpcc.log";

/// Bulk loads are buffered until this many bytes are pending.
const FLUSH_BYTES: usize = 1 << 20;

/// Entry header: key (8 bytes) then value length (4 bytes), little-endian.
const HEADER_LEN: usize = 12;

#[derive(Deserialize)]
pub struct LogStoreOpt {
    pub path: String,
}

struct Log {
    file: File,
    /// Length of the data already written to the file.
    tail: u64,
    /// Appended entries not yet written to the file; they start at `tail`.
    pending: Vec<u8>,
    /// Key to (value offset, value length).
    index: HashMap<Key, (u64, u32)>,
}

impl Log {
    /// Appends an entry and points the index at it. Returns the entry it replaced.
    fn append(&mut self, key: Key, value: &[u8], len: u32) -> Option<(u64, u32)> {
        let offset = self.tail + (self.pending.len() + HEADER_LEN) as u64;
        self.pending.extend_from_slice(&key.to_le_bytes());
        self.pending.extend_from_slice(&len.to_le_bytes());
        self.pending.extend_from_slice(value);
        self.index.insert(key, (offset, len))
    }

    /// Undoes the last [`Log::append`], given the pending length before it.
    fn undo(&mut self, key: Key, mark: usize, previous: Option<(u64, u32)>) {
        self.pending.truncate(mark);
        match previous {
            Some(entry) => self.index.insert(key, entry),
            None => self.index.remove(&key),
        };
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.tail))?;
        self.file.write_all(&self.pending)?;
        self.tail += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    fn read(&mut self, offset: u64, len: u32) -> std::io::Result<Box<[u8]>> {
        let len = len as usize;
        if offset >= self.tail {
            let start = (offset - self.tail) as usize;
            return Ok(self.pending[start..start + len].into());
        }
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf.into_boxed_slice())
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("logstore: failed to flush on close: {}", e);
        }
    }
}

#[derive(Clone)]
pub struct LogStore {
    log: Arc<Mutex<Log>>,
}

impl LogStore {
    /// Creates (or truncates) the data file under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path: PathBuf = dir.join(DATA_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        debug!("logstore: opened {}", path.display());
        let log = Log {
            file,
            tail: 0,
            pending: Vec::with_capacity(FLUSH_BYTES),
            index: HashMap::new(),
        };
        Ok(Self {
            log: Arc::new(Mutex::new(log)),
        })
    }

    pub fn new_kvmap(opt: &toml::Table) -> Result<Box<dyn KVMap>> {
        let opt: LogStoreOpt = parse_opt("logstore", opt)?;
        Ok(Box::new(Self::open(Path::new(&opt.path))?))
    }

    /// Number of bytes appended so far, flushed or not.
    pub fn log_len(&self) -> u64 {
        let log = self.log.lock();
        log.tail + log.pending.len() as u64
    }

    fn append(&mut self, key: Key, value: &[u8], flush: bool) -> usize {
        let len = match u32::try_from(value.len()) {
            Ok(len) => len,
            Err(_) => {
                error!("logstore: value of key {:#018x} too large", key);
                return 0;
            }
        };
        let mut log = self.log.lock();
        let mark = log.pending.len();
        let previous = log.append(key, value, len);
        if flush || log.pending.len() >= FLUSH_BYTES {
            if let Err(e) = log.flush() {
                error!("logstore: write failed: {}", e);
                log.undo(key, mark, previous);
                return 0;
            }
        }
        match previous {
            Some(_) => 0,
            None => 1,
        }
    }
}

impl KVMap for LogStore {
    fn handle(&self) -> Box<dyn KVMapHandle> {
        Box::new(self.clone())
    }
}

impl KVMapHandle for LogStore {
    fn put(&mut self, key: Key, value: &[u8]) -> usize {
        self.append(key, value, true)
    }

    fn get(&mut self, key: Key) -> Option<Box<[u8]>> {
        let mut log = self.log.lock();
        let (offset, len) = *log.index.get(&key)?;
        match log.read(offset, len) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("logstore: read of key {:#018x} failed: {}", key, e);
                None
            }
        }
    }

    fn load(&mut self, key: Key, value: &[u8]) -> usize {
        self.append(key, value, false)
    }
}

inventory::submit! {
    Registry::new("logstore", LogStore::new_kvmap)
}
