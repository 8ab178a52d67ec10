//! Client-side temporary identifiers for optimistic inserts.

#![allow(clippy::module_name_repetitions)]

use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix reserved for client-generated identifiers. Server IDs are UUIDs
/// and never start with this.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Issues identifiers unique within one store instance.
#[derive(Debug, Default)]
pub struct TempIdSource {
    next: AtomicU64,
}

impl TempIdSource {
    /// Next temporary identifier.
    #[must_use]
    pub fn mint(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{TEMP_ID_PREFIX}{n}")
    }
}

/// Whether an identifier is a client-side placeholder awaiting server
/// confirmation.
#[must_use]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
