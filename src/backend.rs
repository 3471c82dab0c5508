// Key-value persistence backends

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A string store addressed by key
pub trait KvBackend {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, fully replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Validate a storage key (used as a filename by the file backend)
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local backend
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    values: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Files
// ============================================================================

/// One `{key}.json` file per key inside a directory
pub struct FileBackend {
    base_path: PathBuf,
}

impl FileBackend {
    /// Open or create a file backend rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create data directory")?;
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        // Serialize writers across processes
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))
            .context("Failed to open lock file")?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        if let Err(e) = replace_file(&tmp_path, &path, value) {
            if tmp_path.exists() {
                if let Err(cleanup) = fs::remove_file(&tmp_path) {
                    warn!(file = ?tmp_path, error = ?cleanup, "Failed to remove temporary file");
                }
            }
            return Err(e);
        }
        debug!(file = ?path, bytes = value.len(), "Wrote value");

        // Lock is released when `lock` is dropped
        Ok(())
    }
}

/// Write `value` to `tmp_path`, flush it, then move it over `path`
fn replace_file(tmp_path: &Path, path: &Path, value: &str) -> Result<()> {
    let mut file = File::create(tmp_path).context("Failed to create temporary file")?;
    file.write_all(value.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp_path, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

// ============================================================================
// SQLite
// ============================================================================

/// `preferences` table in a SQLite database
pub struct SqliteBackend {
    db: Connection,
}

impl SqliteBackend {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let db = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;

        debug!("Creating preferences schema");
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { db })
    }
}

impl KvBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM preferences WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db
            .execute(
                "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )
            .context("Failed to write preference")?;
        Ok(())
    }
}
