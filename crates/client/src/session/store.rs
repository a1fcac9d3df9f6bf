//! Persistence port for client state.
//!
//! Two scopes mirror what a browser offers: [`Scope::Local`] survives
//! restarts and holds the signed-in user, the recall record and the
//! community collections; [`Scope::Session`] holds only the pending
//! registration and is wiped on logout.
//!
//! Files written by [`FileSessionStore`] use a versioned envelope:
//!
//! ```json
//! { "version": 1, "entries": { "taja.user": { ... } } }
//! ```
//!
//! On unix the files are created readable by the owner only.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Store keys.
pub mod keys {
    pub const USER: &str = "taja.user";
    pub const RECALL: &str = "taja.recall";
    pub const PENDING_REGISTRATION: &str = "taja.pendingRegistration";
    pub const DEMANDS: &str = "taja.demands";
    pub const BIDS: &str = "taja.bids";
    pub const REVIEWS: &str = "taja.reviews";
    pub const PENDING_ORDERS: &str = "taja.pendingOrders";
}

/// Envelope version written by this build.
pub const STORE_VERSION: u32 = 1;

/// Errors from the persistence port.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a store file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value did not (de)serialize.
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The file was written by an incompatible build.
    #[error("unsupported store version {version} in {path}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

/// Lifetime of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Kept across restarts.
    Local,
    /// Kept until logout or registration completes.
    Session,
}

/// Key/value persistence with two scopes.
pub trait SessionStore: Send + Sync {
    /// Read a raw value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a raw value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError>;

    /// Delete one entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError>;

    /// Delete every entry in a scope.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn clear(&self, scope: Scope) -> Result<(), StoreError>;

    /// Read and decode a typed value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serde` if the stored value has another shape.
    fn load<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Result<Option<T>, StoreError>
    where
        Self: Sized,
    {
        self.get(scope, key)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Encode and write a typed value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if encoding or writing fails.
    fn save<T: Serialize>(&self, scope: Scope, key: &str, value: &T) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.set(scope, key, serde_json::to_value(value)?)
    }
}

impl<S: SessionStore> SessionStore for std::sync::Arc<S> {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(scope, key)
    }

    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(scope, key, value)
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        (**self).remove(scope, key)
    }

    fn clear(&self, scope: Scope) -> Result<(), StoreError> {
        (**self).clear(scope)
    }
}

// =============================================================================
// File store
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

/// Store backed by `local.json` and `session.json` in a data directory.
#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open a store in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the store files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, scope: Scope) -> PathBuf {
        self.dir.join(match scope {
            Scope::Local => "local.json",
            Scope::Session => "session.json",
        })
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, scope: Scope) -> Result<Envelope, StoreError> {
        let path = self.path(scope);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Envelope {
                    version: STORE_VERSION,
                    entries: BTreeMap::new(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = serde_json::from_str(&text)?;
        if envelope.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path,
                version: envelope.version,
            });
        }
        Ok(envelope)
    }

    fn write(&self, scope: Scope, envelope: &Envelope) -> Result<(), StoreError> {
        let path = self.path(scope);
        let tmp = path.with_extension("json.tmp");
        let mut file = create_private(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(envelope)?)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn modify(
        &self,
        scope: Scope,
        f: impl FnOnce(&mut BTreeMap<String, Value>),
    ) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut envelope = self.read(scope)?;
        f(&mut envelope.entries);
        envelope.version = STORE_VERSION;
        self.write(scope, &envelope)
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<File> {
    File::create(path)
}

impl SessionStore for FileSessionStore {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.guard();
        Ok(self.read(scope)?.entries.remove(key))
    }

    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError> {
        self.modify(scope, |entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.modify(scope, |entries| {
            entries.remove(key);
        })
    }

    fn clear(&self, scope: Scope) -> Result<(), StoreError> {
        let _guard = self.guard();
        match fs::remove_file(self.path(scope)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// Store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(Scope, String), Value>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(Scope, String), Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError> {
        self.lock().insert((scope, key.to_string()), value);
        Ok(())
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.lock().remove(&(scope, key.to_string()));
        Ok(())
    }

    fn clear(&self, scope: Scope) -> Result<(), StoreError> {
        self.lock().retain(|(s, _), _| *s != scope);
        Ok(())
    }
}
