// Identifier generation for new entries

use uuid::Uuid;

/// Source of fresh entry ids
pub trait IdGenerator {
    /// Produce an id that has not been handed out before
    fn next_id(&mut self) -> String;
}

/// Time-ordered UUIDv7 ids
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Ids;

impl IdGenerator for UuidV7Ids {
    fn next_id(&mut self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Deterministic counter ids ("1", "2", ...), mainly for tests
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = self.next;
        self.next += 1;
        id.to_string()
    }
}
