// Entry store: the authoritative list of work entries and its persistence

use crate::backend::{KvBackend, validate_key};
use crate::codec;
use crate::entry::{EntryForm, WorkEntry};
use crate::id::{IdGenerator, UuidV7Ids};
use eyre::{Context, Result};
use tracing::{debug, info, warn};

/// Backend key the entry list is stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "work_entries";

/// In-memory list of work entries backed by a single blob in a key-value store
///
/// All mutations take `&mut self`; callers sharing a store between threads
/// must put the whole store behind one `Mutex`.
pub struct EntryStore {
    backend: Box<dyn KvBackend>,
    key: String,
    ids: Box<dyn IdGenerator>,
    entries: Vec<WorkEntry>,
}

impl EntryStore {
    /// Create a store over `backend`, storing the blob under `key`
    ///
    /// The store starts empty; call [`EntryStore::load`] to read persisted entries.
    pub fn new(backend: Box<dyn KvBackend>, key: impl Into<String>, ids: Box<dyn IdGenerator>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;

        Ok(Self {
            backend,
            key,
            ids,
            entries: Vec::new(),
        })
    }

    /// Create a store with the default key and UUIDv7 ids
    pub fn with_backend(backend: Box<dyn KvBackend>) -> Result<Self> {
        Self::new(backend, DEFAULT_STORAGE_KEY, Box::new(UuidV7Ids))
    }

    /// Get a reference to the persistence backend
    pub fn backend(&self) -> &dyn KvBackend {
        self.backend.as_ref()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Replace the in-memory list with the persisted one
    ///
    /// A missing, empty, unreadable or malformed blob yields an empty list.
    /// Entries are ordered most recent date first; entries sharing a date
    /// keep their stored order.
    pub fn load(&mut self) -> &[WorkEntry] {
        let blob = match self.backend.get(&self.key) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(key = %self.key, error = ?e, "Failed to read persisted entries, starting empty");
                None
            }
        };

        let mut entries = match blob {
            Some(blob) if !blob.trim().is_empty() => codec::from_persisted(&blob),
            _ => Vec::new(),
        };

        // Stable: equal dates keep stored order
        entries.sort_by(|a, b| b.date.cmp(&a.date));

        info!(key = %self.key, count = entries.len(), "Loaded work entries");
        self.entries = entries;
        &self.entries
    }

    /// Write the whole list to the backend, replacing the previous blob
    pub fn save(&mut self) -> Result<()> {
        let blob = codec::to_persisted(&self.entries)?;
        self.backend
            .set(&self.key, &blob)
            .wrap_err_with(|| format!("Failed to save work entries under '{}'", self.key))?;

        info!(key = %self.key, count = self.entries.len(), "Saved work entries");
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Replace the entry with the same id in place, or insert at the front.
    ///
    /// Entries are stored as given; no validation happens here.
    pub fn upsert(&mut self, entry: WorkEntry) {
        match self.entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => {
                debug!(id = %entry.id, "Replacing entry");
                *existing = entry;
            }
            None => {
                debug!(id = %entry.id, "Inserting entry");
                self.entries.insert(0, entry);
            }
        }
    }

    /// Validate a form, give it a fresh id and insert it
    pub fn create(&mut self, form: EntryForm) -> Result<WorkEntry> {
        let id = self.ids.next_id();
        let entry = form.into_entry(id).wrap_err("Invalid work entry")?;
        self.upsert(entry.clone());
        Ok(entry)
    }

    /// Remove the entry with `id`. Returns false if there was none.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);

        let removed = self.entries.len() != before;
        debug!(id, removed, "Delete entry");
        removed
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All entries in current order
    pub fn entries(&self) -> &[WorkEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&WorkEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring search over client, location, description
    /// and materials. An empty query returns every entry.
    pub fn search(&self, query: &str) -> Vec<WorkEntry> {
        if query.is_empty() {
            return self.entries.clone();
        }

        let needle = query.to_lowercase();

        self.entries
            .iter()
            .filter(|entry| entry.matches(&needle))
            .cloned()
            .collect()
    }

    /// Sum of hours over every entry, ignoring any search
    pub fn total_hours(&self) -> f64 {
        self.entries.iter().map(|entry| entry.hours).sum()
    }

    /// Sum of amounts over every entry, ignoring any search
    pub fn total_amount(&self) -> f64 {
        self.entries.iter().map(|entry| entry.amount).sum()
    }
}
