//! Credential storage
//!
//! Two interchangeable backends hold the access and refresh credentials:
//! a durable one written through to `credentials.json`, and a session one
//! that lives only in memory. The "remember me" flag picks which is active.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use crate::Result;

/// The two credentials a session holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialName {
    Access,
    Refresh,
}

impl CredentialName {
    pub const ALL: [CredentialName; 2] = [CredentialName::Access, CredentialName::Refresh];

    /// Storage key for this credential
    pub fn key(self) -> &'static str {
        match self {
            CredentialName::Access => "access_token",
            CredentialName::Refresh => "refresh_token",
        }
    }
}

/// Storage scope a credential lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Survives restarts
    Durable,
    /// Dropped with the session
    Session,
}

impl BackendKind {
    fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            BackendKind::Durable
        } else {
            BackendKind::Session
        }
    }

    fn other(self) -> Self {
        match self {
            BackendKind::Durable => BackendKind::Session,
            BackendKind::Session => BackendKind::Durable,
        }
    }
}

/// A key/value scope credentials can be written to
pub trait CredentialBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory backend, used for the session scope
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.values).insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        lock(&self.values).remove(key);
    }
}

/// File-backed backend, used for the durable scope
///
/// Values are loaded once on open and every mutation is written through.
/// A failed write is logged; the value stays readable for this process.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    /// Open the backend at `path`
    ///
    /// A missing, unreadable or corrupt file is an empty backend; the next
    /// write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            load_credentials_file(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable credentials file {:?}: {}", path, e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<String, String>) {
        if let Err(e) = write_credentials_file(&self.path, values) {
            tracing::warn!("Failed to persist credentials to {:?}: {}", self.path, e);
        }
    }
}

fn load_credentials_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_credentials_file(path: &Path, values: &HashMap<String, String>) -> Result<()> {
    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(values)?;
    std::fs::write(path, content)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    Ok(())
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.persist(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.persist(&values);
        }
    }
}

/// Credential store over a durable and a session backend
pub struct CredentialStore {
    active: RwLock<BackendKind>,
    durable: Box<dyn CredentialBackend>,
    session: Box<dyn CredentialBackend>,
}

impl CredentialStore {
    pub fn new(
        durable: Box<dyn CredentialBackend>,
        session: Box<dyn CredentialBackend>,
        remember_me: bool,
    ) -> Self {
        Self {
            active: RwLock::new(BackendKind::from_remember_me(remember_me)),
            durable,
            session,
        }
    }

    /// Store with a file-backed durable scope and an in-memory session scope
    pub fn open(credentials_path: impl Into<PathBuf>, remember_me: bool) -> Result<Self> {
        let durable = FileBackend::open(credentials_path)?;
        Ok(Self::new(
            Box::new(durable),
            Box::new(MemoryBackend::new()),
            remember_me,
        ))
    }

    /// Store with both scopes in memory
    pub fn in_memory(remember_me: bool) -> Self {
        Self::new(
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
            remember_me,
        )
    }

    pub fn active_backend(&self) -> BackendKind {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_active_backend(&self, kind: BackendKind) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = kind;
    }

    /// Whether the durable backend is active
    pub fn remember_login_state(&self) -> bool {
        self.active_backend() == BackendKind::Durable
    }

    /// Select the active backend; existing values are not migrated
    pub fn set_remember_login_state(&self, remember_me: bool) {
        self.set_active_backend(BackendKind::from_remember_me(remember_me));
    }

    fn backend(&self, kind: BackendKind) -> &dyn CredentialBackend {
        match kind {
            BackendKind::Durable => self.durable.as_ref(),
            BackendKind::Session => self.session.as_ref(),
        }
    }

    /// Write a credential into the active backend
    pub fn save(&self, name: CredentialName, value: &str) {
        let kind = self.active_backend();
        tracing::debug!("Saving {} to {:?} backend", name.key(), kind);
        self.backend(kind).set(name.key(), value);
    }

    /// Read a credential from the active backend
    ///
    /// With `allow_retry_other_backend`, a miss switches the active backend
    /// to the other scope and looks there once.
    pub fn get(&self, name: CredentialName, allow_retry_other_backend: bool) -> Option<String> {
        let kind = self.active_backend();
        let found = self.backend(kind).get(name.key()).filter(|v| !v.is_empty());
        if found.is_some() || !allow_retry_other_backend {
            return found;
        }

        let other = kind.other();
        tracing::debug!("{} not in {:?} backend, retrying {:?}", name.key(), kind, other);
        self.set_active_backend(other);
        self.backend(other).get(name.key()).filter(|v| !v.is_empty())
    }

    /// Remove both credentials from both backends
    pub fn clear(&self) {
        for kind in [BackendKind::Durable, BackendKind::Session] {
            let backend = self.backend(kind);
            for name in CredentialName::ALL {
                backend.remove(name.key());
            }
        }
    }
}
