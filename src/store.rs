use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

pub const ACCOUNT_KEY: &str = "github_username";
pub const GITHUB_TOKEN_KEY: &str = "github_token";
pub const OPENAI_TOKEN_KEY: &str = "chatgpt_token";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credential store {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write credential store {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("credential store {path} is not a JSON object of strings: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("credential store lock poisoned")]
    Poisoned,
}

/// Flat string key-value storage for credentials.
///
/// Values are populated once at onboarding and read on every screen entry. Nothing expires.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Remove every stored value.
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.values.lock().map_err(|_| StoreError::Poisoned)?.clear();
        Ok(())
    }
}

/// JSON file on disk. Survives restarts; written through a temp file and rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(values).map_err(|e| write_err(e.into()))?;
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, json.as_bytes()).map_err(write_err)?;
        // rename is atomic on the same filesystem, so readers never see a half-written file.
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// Writes `contents` to a file only the current user can read (0600 on unix).
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    // A leftover temp file would keep its old mode; start from scratch.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// The stored account identifier and the two API tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account: String,
    pub github_token: String,
    pub openai_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("github_token", &"<redacted>")
            .field("openai_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// `None` when either token is missing or empty.
    pub fn load(store: &dyn CredentialStore) -> Result<Option<Self>, StoreError> {
        let non_empty = |key: &str| -> Result<Option<String>, StoreError> {
            Ok(store.get(key)?.filter(|v| !v.is_empty()))
        };

        let (Some(github_token), Some(openai_token)) =
            (non_empty(GITHUB_TOKEN_KEY)?, non_empty(OPENAI_TOKEN_KEY)?)
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            account: store.get(ACCOUNT_KEY)?.unwrap_or_default(),
            github_token,
            openai_token,
        }))
    }

    pub fn save(&self, store: &dyn CredentialStore) -> Result<(), StoreError> {
        store.set(ACCOUNT_KEY, &self.account)?;
        store.set(GITHUB_TOKEN_KEY, &self.github_token)?;
        store.set(OPENAI_TOKEN_KEY, &self.openai_token)?;
        Ok(())
    }
}
