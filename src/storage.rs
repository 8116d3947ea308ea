use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Error;
use crate::traits::CredentialStorage;

/// In-process storage. Clones share the same entries, so a clone handed to a
/// second [`AuthService`](crate::AuthService) behaves like a restarted process
/// reading the same disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

fn storage_error(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::Storage(format!("{action} {}: {e}", path.display()))
}

impl CredentialStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &path, &e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error("create", &self.dir, &e))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| storage_error("write", &tmp, &e))?;
        // Rename so a crash never leaves a half-written session behind.
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error("rename", &path, &e))
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();

        a.set("session", "value".into()).await.unwrap();
        assert_eq!(b.get("session").await.unwrap().as_deref(), Some("value"));

        b.remove("session").await.unwrap();
        assert!(a.get("session").await.unwrap().is_none());
        // Removing again is fine.
        a.remove("session").await.unwrap();
    }

    #[tokio::test]
    async fn file_storage_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStorage::new(dir.path().join("state"));
        first.set("casefile.session", "{\"a\":1}".into()).await.unwrap();

        let second = FileStorage::new(dir.path().join("state"));
        assert_eq!(
            second.get("casefile.session").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        second.remove("casefile.session").await.unwrap();
        assert!(first.get("casefile.session").await.unwrap().is_none());
        second.remove("casefile.session").await.unwrap();
    }

    #[tokio::test]
    async fn file_storage_missing_dir_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("never-created"));
        assert!(storage.get("anything").await.unwrap().is_none());
    }

    #[test]
    fn keys_cannot_escape_the_directory() {
        let storage = FileStorage::new("/tmp/casefile");
        let path = storage.path_for("../../etc/passwd");
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/casefile"));
        assert_eq!(path.file_name().unwrap(), ".._.._etc_passwd.json");
    }
}
