//! Undo journal and the persisted row model
//!
//! Ledger state is stored as one row per entity. While a savepoint is open,
//! every entry point records the prior value of each row it touches. Rolling
//! back replays those records newest first; committing writes only the rows
//! named in the journal.
//!
//! # Row keys
//!
//! State rows (column family `state`):
//!
//! - `s` - settings fixed at construction
//! - `n` - counters (pool, withdrawals, audit-log head)
//! - `a` - owner and authorized callers
//! - `o` - operational flag and vote round
//! - `A || address` - airline
//! - `F || flight key` - flight
//! - `P || flight key` - policies on a flight
//! - `W || address` - pending withdrawal balance
//!
//! Index rows (column family `indices`):
//!
//! - `A || position (u64 BE)` - airline registration order
//! - `F || position (u64 BE)` - flight registration order

use crate::access::AccessControl;
use crate::airlines::FundingGuard;
use crate::guards::RateLimit;
use crate::operational::OperationalControl;
use crate::processing::PayoutPolicy;
use crate::types::{Address, Airline, Flight, FlightKey, Policy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration captured when the ledger was created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Withdrawal gate
    pub rate_limit: RateLimit,
    /// Guard applied by `fund_airline`
    pub funding_guard: FundingGuard,
    /// Payout computation
    pub payout_policy: PayoutPolicy,
}

/// Scalar state rewritten by most calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    /// Value held by the ledger
    pub pool: Decimal,
    /// Withdrawals entered
    pub withdrawals: u64,
    /// Sequence the next audit event gets
    pub next_sequence: u64,
    /// Hash of the latest audit event
    pub head_hash: [u8; 32],
}

/// One persisted row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Row {
    /// Settings row
    Settings(Settings),
    /// Counters row
    Counters(Counters),
    /// Access-control row
    Access(AccessControl),
    /// Operational-control row
    Operational(OperationalControl),
    /// Airline record
    Airline { address: Address, airline: Airline },
    /// Flight record (registered or placeholder)
    Flight { key: FlightKey, flight: Flight },
    /// Policies on one flight, in purchase order
    Policies { key: FlightKey, policies: Vec<Policy> },
    /// Pending balance of one passenger
    Pending { passenger: Address, amount: Decimal },
    /// Airline registration order
    AirlineOrder { position: u64, address: Address },
    /// Flight registration order
    FlightOrder { position: u64, key: FlightKey },
}

impl Row {
    /// Storage key, unique within the row's column family
    pub fn key(&self) -> Vec<u8> {
        match self {
            Row::Settings(_) => vec![b's'],
            Row::Counters(_) => vec![b'n'],
            Row::Access(_) => vec![b'a'],
            Row::Operational(_) => vec![b'o'],
            Row::Airline { address, .. } => prefixed(b'A', address.as_bytes()),
            Row::Flight { key, .. } => prefixed(b'F', key.as_bytes()),
            Row::Policies { key, .. } => prefixed(b'P', key.as_bytes()),
            Row::Pending { passenger, .. } => prefixed(b'W', passenger.as_bytes()),
            Row::AirlineOrder { position, .. } => prefixed(b'A', &position.to_be_bytes()),
            Row::FlightOrder { position, .. } => prefixed(b'F', &position.to_be_bytes()),
        }
    }

    /// True for rows kept in the `indices` column family
    pub fn is_index(&self) -> bool {
        matches!(self, Row::AirlineOrder { .. } | Row::FlightOrder { .. })
    }
}

fn prefixed(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + bytes.len());
    key.push(tag);
    key.extend_from_slice(bytes);
    key
}

/// Prior value of a touched row
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    Access(AccessControl),
    Operational(OperationalControl),
    Airline(Address, Option<Airline>),
    Flight(FlightKey, Option<Flight>),
    PolicyAppended(FlightKey),
    Policies(FlightKey, Vec<Policy>),
    Pending(Address, Option<Decimal>),
}

/// A point the ledger can roll back to
///
/// Must be handed back through `rollback_to` or `release`.
#[must_use]
#[derive(Debug)]
pub struct Savepoint {
    pub(crate) undo_len: usize,
    pub(crate) counters: Counters,
    pub(crate) staged_events: usize,
    pub(crate) airlines: usize,
    pub(crate) flights: usize,
}

/// Undo records for the open savepoints
///
/// Nothing is recorded while no savepoint is open.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    entries: Vec<Undo>,
    depth: usize,
}

impl Journal {
    pub(crate) fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn open(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn record(&mut self, undo: Undo) {
        if self.is_open() {
            self.entries.push(undo);
        }
    }

    /// Records made since position `from`
    pub(crate) fn since(&self, from: usize) -> &[Undo] {
        self.entries.get(from..).unwrap_or(&[])
    }

    /// Remove and return records from position `from`, newest first
    pub(crate) fn unwind(&mut self, from: usize) -> Vec<Undo> {
        let from = from.min(self.entries.len());
        let mut undone = self.entries.split_off(from);
        undone.reverse();
        undone
    }

    /// Close one savepoint; the outermost close drops all records
    pub(crate) fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.entries.clear();
        }
    }
}
