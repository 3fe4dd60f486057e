//! Durable secret storage boundary.
//!
//! The platform keychain lives outside this crate; [`SecretStore`] is the
//! contract it fulfils. Two implementations ship here: an in-memory store for
//! tests and short-lived sessions, and a file-backed store used by the CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::SecretStoreError;

pub trait SecretStore: Send + Sync {
    fn save(&self, key: &str, secret: &[u8]) -> Result<(), SecretStoreError>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecretStoreError>;

    fn delete(&self, key: &str) -> Result<(), SecretStoreError>;

    fn keys(&self) -> Result<Vec<String>, SecretStoreError>;

    fn delete_all(&self) -> Result<(), SecretStoreError>;
}

impl std::fmt::Debug for dyn SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretStore")
    }
}

pub const TOKEN_KEY_PREFIX: &str = "access_token_";

pub fn token_key(provider_id: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{provider_id}")
}

pub fn client_secret_key(provider_id: &str) -> String {
    format!("{provider_id}_client_secret")
}

#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for InMemorySecretStore {
    fn save(&self, key: &str, secret: &[u8]) -> Result<(), SecretStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), secret.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecretStoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<(), SecretStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, SecretStoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    fn delete_all(&self) -> Result<(), SecretStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// JSON file of base64 values, written atomically and readable only by the
/// owner on unix.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SecretStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(error) => Err(error.into()),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), SecretStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, serde_json::to_vec_pretty(entries)?)?;
        restrict_permissions(&staging)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), SecretStoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), SecretStoreError> {
    Ok(())
}

impl SecretStore for FileSecretStore {
    fn save(&self, key: &str, secret: &[u8]) -> Result<(), SecretStoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        entries.insert(key.to_owned(), STANDARD.encode(secret));
        self.persist(&entries)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecretStoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = self.load()?;
        entries
            .get(key)
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map_err(|error| SecretStoreError::Encoding(error.to_string()))
            })
            .transpose()
    }

    fn delete(&self, key: &str) -> Result<(), SecretStoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, SecretStoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.into_keys().collect())
    }

    fn delete_all(&self) -> Result<(), SecretStoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.persist(&BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_persists_across_instances() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("secrets.json");

        let store = FileSecretStore::new(&path);
        store
            .save(&client_secret_key("bank-a"), b"s3cr3t")
            .expect("save");

        let reopened = FileSecretStore::new(&path);
        assert_eq!(
            reopened.get("bank-a_client_secret").expect("get"),
            Some(b"s3cr3t".to_vec())
        );

        assert_eq!(reopened.keys().expect("keys"), vec![String::from("bank-a_client_secret")]);

        reopened.delete("bank-a_client_secret").expect("delete");
        assert_eq!(reopened.get("bank-a_client_secret").expect("get"), None);
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_readable_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("secrets.json");
        FileSecretStore::new(&path).save("k", b"v").expect("save");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn in_memory_delete_all_clears_everything() {
        let store = InMemorySecretStore::new();
        store.save(&token_key("a"), b"1").expect("save");
        store.save(&token_key("b"), b"2").expect("save");
        store.delete_all().expect("delete all");
        assert!(store.is_empty());
    }
}
