// WorkLedger - Client work entries kept as one JSON blob in a local key-value store

pub mod backend;
pub mod codec;
pub mod config;
pub mod entry;
pub mod id;
pub mod store;

// Re-export main types for convenience
pub use backend::{FileBackend, KvBackend, MemoryBackend, SqliteBackend};
pub use codec::{from_persisted, to_csv, to_persisted};
pub use config::{BackendKind, Config};
pub use entry::{EntryForm, WorkEntry, parse_decimal};
pub use id::{IdGenerator, SequentialIds, UuidV7Ids};
pub use store::{DEFAULT_STORAGE_KEY, EntryStore};
