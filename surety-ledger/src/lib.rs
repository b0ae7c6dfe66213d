//! FlightSurety Data Ledger
//!
//! Persistent ledger behind a flight-delay insurance application: airline and
//! flight registries, per-flight policies, the payout-crediting engine and
//! passenger withdrawals.
//!
//! # Architecture
//!
//! - **Single Writer**: One actor task owns the state; calls are serialized
//! - **Fail-fast**: A rejected call changes nothing and emits nothing
//! - **Audit log**: Every committed call appends hash-chained events
//! - **Persistence**: Events and the rows a call touched commit in one RocksDB batch
//! - **Rollback**: A failed call, nested calls included, is undone from its savepoint
//!
//! # Invariants
//!
//! - A policy is credited at most once
//! - A flight status leaves `UNKNOWN` at most once
//! - Pending balances never exceed the pool that backs them
//! - Withdrawal zeroes the balance before funds leave the ledger

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod access;
pub mod actor;
pub mod airlines;
pub mod config;
pub mod crypto;
pub mod error;
pub mod escrow;
pub mod events;
pub mod flights;
pub mod guards;
pub mod insurance;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod operational;
pub mod processing;
pub mod state;
pub mod storage;
pub mod types;

// Re-exports
pub use actor::{Command, CommandOutput, LedgerHandle};
pub use airlines::FundingGuard;
pub use config::Config;
pub use error::{Error, Result};
pub use escrow::{FundsTransfer, Wallets};
pub use events::{EventKind, LedgerEvent};
pub use journal::{Counters, Row, Savepoint, Settings};
pub use ledger::Ledger;
pub use operational::VoteOutcome;
pub use processing::{PayoutPolicy, StatusOutcome};
pub use state::SuretyData;
pub use storage::Storage;
pub use types::{Address, Airline, CallContext, Flight, FlightKey, FlightStatus, Policy};
