// Session persistence backends

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AuthError, Result};

use super::types::{StoredSession, TokenPair};

/// Backing store for the token pair (cookie jar, file, keychain, ...)
pub trait TokenPersistence: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>>;
    fn save(&self, pair: &TokenPair) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Process-local persistence, lost on exit
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    inner: Mutex<Option<TokenPair>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<TokenPair>>> {
        self.inner
            .lock()
            .map_err(|_| AuthError::Storage("memory store poisoned".to_string()))
    }
}

impl TokenPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        *self.lock()? = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// JSON file persistence, written with owner-only permissions on Unix
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenPersistence for FilePersistence {
    fn load(&self) -> Result<Option<TokenPair>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let stored: StoredSession = serde_json::from_str(&data).map_err(|e| {
            AuthError::Storage(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(
            "Loaded session from {} (updated {})",
            self.path.display(),
            stored.updated_at.to_rfc3339()
        );

        Ok(Some(stored.into()))
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuthError::Storage(e.to_string()))?;
        }

        let data = serde_json::to_string_pretty(&StoredSession::from(pair))
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| {
            AuthError::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("ft-auth-test-{}", uuid::Uuid::new_v4()))
            .join("session.json")
    }

    #[test]
    fn test_memory_persistence() {
        let store = MemoryPersistence::new();
        assert_eq!(store.load().unwrap(), None);

        let pair = TokenPair::new("a1", "r1").unwrap();
        store.save(&pair).unwrap();
        assert_eq!(store.load().unwrap(), Some(pair));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_persistence_round_trip() {
        let path = temp_session_path();
        let store = FilePersistence::new(path.clone());

        // Missing file is an empty session, not an error
        assert_eq!(store.load().unwrap(), None);

        let pair = TokenPair::new("a1", "r1").unwrap();
        store.save(&pair).unwrap();
        assert!(path.exists());
        assert_eq!(store.load().unwrap(), Some(pair));

        store.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(store.load().unwrap(), None);

        // Clearing twice is fine
        store.clear().unwrap();

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_persistence_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_session_path();
        let store = FilePersistence::new(path.clone());
        store.save(&TokenPair::new("a1", "r1").unwrap()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_persistence_corrupt_file() {
        let path = temp_session_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = FilePersistence::new(path.clone());
        assert!(matches!(store.load(), Err(AuthError::Storage(_))));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
