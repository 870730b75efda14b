//! Persistent key/value state.
//!
//! The client keeps a handful of string values between runs (last
//! connection, hotkey list).  [`KeyValueStore`] is the seam; [`MemoryStore`]
//! backs tests and `--store` less runs, [`FileStore`] keeps them on disk.
//!
//! ## File format
//!
//! One `KEY=value` per line.  Blank lines and lines starting with `;` are
//! ignored.  Values run to the end of the line and may contain `=`.
//!
//! ```text
//! ; eqbc state
//! LAST_IP=10.0.0.5
//! LAST_PORT=2112
//! LAST_NAME=bob
//! HOTKEYS=/bcaa //sit|/bcaa //stand|/bcaa //follow
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid key {0:?}")]
    InvalidKey(String),
    #[error("value for {0} contains a line break")]
    InvalidValue(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// A non-fatal problem on one line of a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

// ── KeyValueStore ─────────────────────────────────────────────────────────────

/// String get/set store used for everything the client persists.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// A store shared between the session (last connection) and the hotkey list.
pub type SharedStore = Arc<Mutex<dyn KeyValueStore + Send>>;

/// Wrap `store` for sharing.
pub fn shared<S: KeyValueStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Read `key` from a shared store.  A poisoned lock reads as absent.
pub fn shared_get(store: &SharedStore, key: &str) -> Option<String> {
    store.lock().ok()?.get(key)
}

/// Write `key` to a shared store.
pub fn shared_set(store: &SharedStore, key: &str, value: &str) -> Result<(), StoreError> {
    store.lock().map_err(|_| StoreError::Poisoned)?.set(key, value)
}

fn validate(key: &str, value: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains(['=', '\n', '\r']) || key.starts_with(';') {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    if value.contains(['\n', '\r']) {
        return Err(StoreError::InvalidValue(key.to_owned()));
    }
    Ok(())
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    vars: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        validate(key, value)?;
        self.vars.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse store file contents.
///
/// Malformed lines are skipped and reported; later duplicates win.
pub fn parse_str(s: &str) -> (MemoryStore, Vec<ParseError>) {
    let mut store = MemoryStore::new();
    let mut errors = Vec::new();

    for (i, raw) in s.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.trim_start();
        if line.trim_end().is_empty() || line.starts_with(';') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            errors.push(ParseError { line: lineno, message: "missing '='".into() });
            continue;
        };
        let key = key.trim_end();
        if key.is_empty() {
            errors.push(ParseError { line: lineno, message: "empty key".into() });
            continue;
        }
        store.vars.insert(key.to_owned(), value.to_owned());
    }

    (store, errors)
}

/// Render entries back into the file format.
fn render(store: &MemoryStore) -> String {
    let mut out = String::from("; eqbc state\n");
    for (k, v) in store.iter() {
        out.push_str(k);
        out.push('=');
        out.push_str(v);
        out.push('\n');
    }
    out
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// A store mirrored to a file.  Every `set` rewrites the file atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: MemoryStore,
}

impl FileStore {
    /// Open the store at `path`.  A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(s) => {
                let (cache, errors) = parse_str(&s);
                for e in errors {
                    warn!(path = %path.display(), "skipping malformed entry: {e}");
                }
                cache
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), entries = cache.len(), "opened store");
        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(render(&self.cache).as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.cache.set(key, value)?;
        self.flush()?;
        debug!(key, "persisted");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
