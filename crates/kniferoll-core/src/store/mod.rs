//! Optimistic client-side stores.
//!
//! Each store owns a [`tokio::sync::watch`] channel and publishes a full
//! state snapshot after every change. Mutations apply locally first, then
//! confirm against the gateway; on rejection the saved snapshot is put
//! back and the gateway's message lands in the state's `error` field.

pub mod entry;
pub mod prep;

pub use entry::{AddItemRequest, PrepEntryState, PrepEntryStore};
pub use prep::{PrepState, PrepStore};
