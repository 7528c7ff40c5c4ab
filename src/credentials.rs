// src/credentials.rs
use crate::error::CredentialError;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Key under which the bearer token is kept in key-value stores.
pub const TOKEN_KEY: &str = "token";

/// Source of the bearer token used by authenticated calls.
///
/// The token is read at call time, so a store shared between services sees
/// logins and logouts immediately.
pub trait CredentialStore: Send + Sync {
    fn get_token(&self) -> Result<Option<String>, CredentialError>;
    fn set_token(&self, token: &str) -> Result<(), CredentialError>;
    fn clear_token(&self) -> Result<(), CredentialError>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        MemoryCredentialStore {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_token(&self) -> Result<Option<String>, CredentialError> {
        let guard = self.token.read().map_err(|_| CredentialError::Poisoned)?;
        Ok(guard.clone())
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        let mut guard = self.token.write().map_err(|_| CredentialError::Poisoned)?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), CredentialError> {
        let mut guard = self.token.write().map_err(|_| CredentialError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Token persisted in a small JSON key-value file.
///
/// Other keys in the file are preserved across writes. A missing file means
/// no token.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentialStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`load`](Self::load), but an unparsable file reads as empty so a
    /// write can replace it.
    fn load_for_write(&self) -> Result<HashMap<String, String>, CredentialError> {
        match self.load() {
            Err(CredentialError::Corrupt(e)) => {
                warn!(
                    "Discarding unreadable credential file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    /// Writes through a sibling temp file and renames it over the target, so
    /// readers never see a half-written file.
    fn store(&self, entries: &HashMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.load()?.remove(TOKEN_KEY))
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().map_err(|_| CredentialError::Poisoned)?;
        let mut entries = self.load_for_write()?;
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.store(&entries)?;
        debug!("Stored token in {}", self.path.display());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().map_err(|_| CredentialError::Poisoned)?;
        let (mut entries, corrupt) = match self.load() {
            Ok(entries) => (entries, false),
            Err(CredentialError::Corrupt(_)) => (self.load_for_write()?, true),
            Err(e) => return Err(e),
        };
        if entries.remove(TOKEN_KEY).is_some() || corrupt {
            self.store(&entries)?;
            debug!("Cleared token in {}", self.path.display());
        }
        Ok(())
    }
}
