//! Credential storage.
//!
//! The flow treats storage as an opaque string key-value capability. Two
//! backends are provided: [`MemoryStore`] for process-local (session) use and
//! [`JsonFileStore`], a single JSON file with file locking.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use tracing::warn;

use crate::error::StoreError;

/// Default credential file, relative to the user's config directory.
const DEFAULT_STORE_FILE: &str = "llm-config/credentials.json";

/// Trait for credential storage backends.
pub trait CredentialStore {
    /// Returns the value stored under `key`, if any.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backend can't be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backend can't be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// In-memory storage that lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file-based credential storage.
///
/// The file holds one JSON object mapping storage keys to their string values.
/// Reads take a shared lock and writes an exclusive one (via `fs2`), so
/// concurrent processes never observe a half-written file. A write over a
/// corrupt file keeps the old contents in [`JsonFileStore::backup_path`].
///
/// ## Examples
///
/// ```no_run
/// use llm_config_lib::{CredentialStore, JsonFileStore};
///
/// let store = JsonFileStore::new("/tmp/credentials.json".into());
/// store.set("my-app", r#"{"baseUrl":"https://api.openai.com/v1","apiKey":""}"#).unwrap();
/// assert!(store.get("my-app").unwrap().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a new JSON file store at the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the default store path (`<config dir>/llm-config/credentials.json`).
    ///
    /// Falls back to the current directory when no config directory is known.
    pub fn default_location() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_STORE_FILE)
    }

    /// Creates a new JSON file store at [`JsonFileStore::default_location`].
    pub fn default_path() -> Self {
        Self::new(Self::default_location())
    }

    /// Returns the path to the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_error(&self) -> StoreError {
        StoreError::Lock(self.path.clone())
    }

    /// Returns where an unreadable credential file is copied before rewriting.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    fn parse_entries(contents: &[u8]) -> Result<BTreeMap<String, String>, StoreError> {
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(contents)?)
    }

    fn read_entries(file: &mut File) -> Result<BTreeMap<String, String>, StoreError> {
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Self::parse_entries(&contents)
    }

    /// Reads the entries for a write. A corrupt file is copied to
    /// [`JsonFileStore::backup_path`] and replaced by an empty map.
    fn read_entries_for_write(
        &self,
        file: &mut File,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        match Self::parse_entries(&contents) {
            Err(StoreError::Parse(e)) => {
                let backup = self.backup_path();
                private_options()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&backup)?
                    .write_all(&contents)?;
                warn!(
                    "Credential file {} is unreadable ({}); copied its contents to {}",
                    self.path.display(),
                    e,
                    backup.display()
                );
                Ok(BTreeMap::new())
            }
            result => result,
        }
    }

    fn open_for_write(&self) -> Result<File, StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        Ok(private_options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?)
    }
}

/// Open options that create files readable by the owner only.
fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

impl CredentialStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path)?;
        file.lock_shared().map_err(|_| self.lock_error())?;
        let entries = Self::read_entries(&mut file);
        file.unlock().map_err(|_| self.lock_error())?;

        Ok(entries?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut file = self.open_for_write()?;
        file.lock_exclusive().map_err(|_| self.lock_error())?;

        let result = (|| {
            let mut entries = self.read_entries_for_write(&mut file)?;
            entries.insert(key.to_string(), value.to_string());

            let json = serde_json::to_string_pretty(&entries)?;
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            Ok::<_, StoreError>(())
        })();

        file.unlock().map_err(|_| self.lock_error())?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonFileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("credentials.json");
        (JsonFileStore::new(path), temp_dir)
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn get_returns_none_for_nonexistent_file() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn set_creates_parent_directories() {
        let (store, _temp_dir) = create_test_store();
        store.set("app", "value").unwrap();
        assert!(store.path().exists());
        assert_eq!(store.get("app").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn keys_are_independent() {
        let (store, _temp_dir) = create_test_store();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.get("c").unwrap(), None);
    }

    #[test]
    fn shrinking_value_leaves_no_trailing_bytes() {
        let (store, _temp_dir) = create_test_store();
        store.set("a", &"x".repeat(256)).unwrap();
        store.set("a", "y").unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["a"], "y");
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let (store, _temp_dir) = create_test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.get("a"), Err(StoreError::Parse(_))));
    }

    #[test]
    fn write_over_corrupt_file_keeps_a_backup() {
        let (store, _temp_dir) = create_test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        store.set("a", "1").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(
            std::fs::read_to_string(store.backup_path()).unwrap(),
            "{ not json"
        );
    }

    #[test]
    fn backup_path_appends_suffix() {
        let store = JsonFileStore::new(PathBuf::from("/tmp/credentials.json"));
        assert_eq!(store.backup_path(), PathBuf::from("/tmp/credentials.json.bak"));
    }

    #[test]
    fn empty_file_reads_as_no_entries() {
        let (store, _temp_dir) = create_test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[cfg(unix)]
    #[test]
    fn new_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _temp_dir) = create_test_store();
        store.set("a", "1").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn default_location_ends_with_store_file() {
        assert!(
            JsonFileStore::default_location().ends_with(Path::new("llm-config").join("credentials.json"))
        );
    }
}
