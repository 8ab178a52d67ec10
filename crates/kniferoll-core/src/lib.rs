#![forbid(unsafe_code)]
//! kniferoll-core library.
//!
//! The optimistic local-state synchronization layer for kniferoll prep
//! checklists: the item cache ([`store::PrepStore`]), the suggestion store
//! ([`store::PrepEntryStore`]), and the gateway contract they speak to.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the gateway and store
//!   boundaries; `anyhow::Result` only at binary edges.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`,
//!   `trace!`).

pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod model;
pub mod store;
pub mod temp_id;

pub use config::StoreConfig;
pub use error::{GatewayError, StoreError};
pub use gateway::PrepGateway;
pub use model::{Context, PrepItem, Status, Suggestion};
pub use store::{PrepEntryStore, PrepStore};
