use std::path::PathBuf;

use anyhow::{Context, Result};

use super::KeyValueStore;

/// Directory-backed store: each key is a `<key>.json` file.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Keys are ours, but keep them from escaping the data directory anyway.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read stored value: {}", key))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .with_context(|| format!("Failed to write stored value: {}", key))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace stored value: {}", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stored value: {}", key))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested")).unwrap();

        assert!(store.get("shows.searchPrefs").unwrap().is_none());
        store.set("shows.searchPrefs", r#"{"radius":50}"#).unwrap();
        store.set("shows.searchPrefs", r#"{"radius":75}"#).unwrap();
        assert_eq!(
            store.get("shows.searchPrefs").unwrap().as_deref(),
            Some(r#"{"radius":75}"#)
        );
        assert!(dir.path().join("nested/shows.searchPrefs.json").exists());
        assert!(!dir.path().join("nested/shows.searchPrefs.json.tmp").exists());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        store.set("k", "1").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_keys_cannot_escape_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("data")).unwrap();
        store.set("../outside", "x").unwrap();
        assert!(!dir.path().join("outside.json").exists());
        assert_eq!(store.get("../outside").unwrap().as_deref(), Some("x"));
    }
}
