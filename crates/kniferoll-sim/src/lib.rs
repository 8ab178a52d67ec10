#![forbid(unsafe_code)]

//! Deterministic fault-injection harness for the kniferoll stores.
//!
//! Cook tasks hammer one shared [`PrepStore`](kniferoll_core::store::PrepStore)
//! through a [`FlakyGateway`] that fails a configured share of calls. A
//! seeded [`DeterministicRng`] decides every operation and every injected
//! failure, so a seed replays the same workload. When the cooks finish,
//! the gateway heals, the store reconciles once, and [`SyncOracle`]
//! verifies the snapshot against the gateway's table.
//!
//! # Conventions
//!
//! - **Errors**: scenario plumbing returns [`anyhow::Result`]; store and
//!   gateway errors are scenario data, counted rather than propagated.
//! - **Logging**: [`tracing`] macros, configured by the binary.

pub mod driver;
pub mod fault;
pub mod oracle;
pub mod rng;

pub use driver::{ScenarioConfig, ScenarioReport, run_scenario};
pub use fault::{FaultConfig, FlakyGateway};
pub use oracle::{InvariantViolation, OracleResult, SyncOracle};
pub use rng::DeterministicRng;
