//! File-backed client storage.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use duka_cart::persistence::{ClientStorage, StorageError};
use tracing::trace;

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`, created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the entries live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid {
            return Err(StorageError::Invalid(format!("unusable storage key {key:?}")));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key)?;

        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        let tmp = path.with_extension("json.tmp");

        fs::create_dir_all(&self.dir)?;
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        trace!(path = %path.display(), bytes = value.len(), "wrote storage entry");

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn values_round_trip_through_disk() -> TestResult {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get("cart")?, None);

        storage.set("cart", "{\"items\":[]}")?;
        storage.set("cart", "{\"items\":[1]}")?;

        assert_eq!(storage.get("cart")?.as_deref(), Some("{\"items\":[1]}"));
        assert!(!dir.path().join("nested/cart.json.tmp").exists());

        Ok(())
    }

    #[test]
    fn removing_missing_key_is_fine() -> TestResult {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path());

        storage.remove("cart")?;
        storage.set("cart", "{}")?;
        storage.remove("cart")?;

        assert_eq!(storage.get("cart")?, None);

        Ok(())
    }

    #[test]
    fn keys_cannot_escape_the_directory() -> TestResult {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path());

        let result = storage.set("../cart", "{}");

        assert!(
            matches!(result, Err(StorageError::Invalid(_))),
            "expected Invalid, got {result:?}"
        );

        Ok(())
    }
}
