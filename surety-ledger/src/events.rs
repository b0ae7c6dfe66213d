//! Append-only audit log
//!
//! One event per state transition. Events are hash-chained: each carries the
//! hash of its predecessor, so any rewrite of history changes every later hash.

use crate::crypto::{hash_event, merkle_root};
use crate::types::{Address, FlightKey, FlightStatus};
use crate::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Flight added to the registry
    FlightRegistered {
        /// Flight key
        flight_key: FlightKey,
        /// Operating airline
        airline: Address,
        /// Flight code
        flight_code: String,
        /// Scheduled timestamp
        timestamp: u64,
    },
    /// Status report processed (emitted even when stored status is unchanged)
    FlightStatusUpdated {
        /// Flight key
        flight_key: FlightKey,
        /// Reported status
        status: FlightStatus,
        /// Whether the stored status changed
        applied: bool,
    },
    /// Policy appended
    InsuranceBought {
        /// Flight key
        flight_key: FlightKey,
        /// Insured passenger
        passenger: Address,
        /// Premium
        amount: Decimal,
        /// Payout multiplier
        multiplier: Decimal,
    },
    /// Airline added to the registry
    AirlineRegistered {
        /// Airline address
        airline: Address,
        /// Airline name
        name: String,
    },
    /// Airline funding flag set
    AirlineFunded {
        /// Airline address
        airline: Address,
    },
    /// Policy credited to a passenger's pending balance
    InsureeCredited {
        /// Flight key
        flight_key: FlightKey,
        /// Passenger
        passenger: Address,
        /// Credited amount
        amount: Decimal,
    },
    /// Pending balance paid out
    AccountWithdrawn {
        /// Passenger
        passenger: Address,
        /// Amount transferred
        amount: Decimal,
    },
}

impl EventKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FlightRegistered { .. } => "flight_registered",
            EventKind::FlightStatusUpdated { .. } => "flight_status_updated",
            EventKind::InsuranceBought { .. } => "insurance_bought",
            EventKind::AirlineRegistered { .. } => "airline_registered",
            EventKind::AirlineFunded { .. } => "airline_funded",
            EventKind::InsureeCredited { .. } => "insuree_credited",
            EventKind::AccountWithdrawn { .. } => "account_withdrawn",
        }
    }
}

/// Audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Position in the log (0-based, gapless)
    pub sequence: u64,

    /// Wall-clock time of commit
    pub recorded_at: DateTime<Utc>,

    /// Payload
    pub kind: EventKind,

    /// Hash of the previous event (zeros for the first)
    pub previous_hash: [u8; 32],

    /// Hash of this event
    pub hash: [u8; 32],
}

/// Head of the log plus events not yet handed to the caller
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    next_sequence: u64,
    head_hash: [u8; 32],
    pending: Vec<LedgerEvent>,
}

impl EventLog {
    /// Continue a log whose head is already stored
    pub fn resume(next_sequence: u64, head_hash: [u8; 32]) -> Self {
        Self {
            next_sequence,
            head_hash,
            pending: Vec::new(),
        }
    }

    /// Events staged and not yet taken
    pub fn staged(&self) -> usize {
        self.pending.len()
    }

    /// Move the head back and drop staged events past `staged`
    pub(crate) fn rewind(&mut self, next_sequence: u64, head_hash: [u8; 32], staged: usize) {
        self.next_sequence = next_sequence;
        self.head_hash = head_hash;
        self.pending.truncate(staged);
    }

    /// Sequence number the next event will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Hash of the most recent event
    pub fn head_hash(&self) -> [u8; 32] {
        self.head_hash
    }

    /// Stage events produced by one entry point
    ///
    /// Hashes are computed for the whole batch before anything is appended,
    /// so a failure leaves the log untouched.
    pub(crate) fn append_all(&mut self, kinds: Vec<EventKind>) -> Result<()> {
        let mut staged = Vec::with_capacity(kinds.len());
        let mut sequence = self.next_sequence;
        let mut previous_hash = self.head_hash;

        for kind in kinds {
            let hash = hash_event(&previous_hash, sequence, &kind)?;
            tracing::debug!(sequence, event = kind.name(), "Event staged");
            staged.push(LedgerEvent {
                event_id: Uuid::now_v7(),
                sequence,
                recorded_at: Utc::now(),
                kind,
                previous_hash,
                hash,
            });
            previous_hash = hash;
            sequence += 1;
        }

        self.next_sequence = sequence;
        self.head_hash = previous_hash;
        self.pending.extend(staged);
        Ok(())
    }

    /// Drain events staged since the last call
    pub fn take(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Verify that `events` form an unbroken chain starting at `previous_hash`
pub fn verify_chain(previous_hash: [u8; 32], events: &[LedgerEvent]) -> Result<bool> {
    let mut expected_previous = previous_hash;
    for event in events {
        if event.previous_hash != expected_previous {
            return Ok(false);
        }
        if hash_event(&event.previous_hash, event.sequence, &event.kind)? != event.hash {
            return Ok(false);
        }
        expected_previous = event.hash;
    }
    Ok(true)
}

/// Merkle root over a run of events
pub fn audit_root(events: &[LedgerEvent]) -> [u8; 32] {
    let hashes: Vec<[u8; 32]> = events.iter().map(|e| e.hash).collect();
    merkle_root(&hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(n: u64) -> EventKind {
        EventKind::AirlineFunded {
            airline: Address::from_low_u64(n),
        }
    }

    #[test]
    fn test_append_assigns_gapless_sequences() {
        let mut log = EventLog::default();
        log.append_all(vec![funded(1), funded(2)]).unwrap();
        log.append_all(vec![funded(3)]).unwrap();

        let events = log.take();
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(log.next_sequence(), 3);
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_chain_verifies_and_detects_tampering() {
        let mut log = EventLog::default();
        log.append_all(vec![funded(1), funded(2), funded(3)]).unwrap();
        let mut events = log.take();

        assert!(verify_chain([0u8; 32], &events).unwrap());
        assert_eq!(log.head_hash(), events[2].hash);

        events[1].kind = funded(99);
        assert!(!verify_chain([0u8; 32], &events).unwrap());
    }

    #[test]
    fn test_rewind_drops_staged_events() {
        let mut log = EventLog::default();
        log.append_all(vec![funded(1)]).unwrap();
        let (sequence, head, staged) = (log.next_sequence(), log.head_hash(), log.staged());

        log.append_all(vec![funded(2), funded(3)]).unwrap();
        log.rewind(sequence, head, staged);

        assert_eq!(log.next_sequence(), 1);
        assert_eq!(log.head_hash(), head);
        assert_eq!(log.take().len(), 1);

        let resumed = EventLog::resume(5, [7u8; 32]);
        assert_eq!(resumed.next_sequence(), 5);
        assert_eq!(resumed.staged(), 0);
    }

    #[test]
    fn test_audit_root_changes_with_content() {
        let mut log = EventLog::default();
        log.append_all(vec![funded(1), funded(2)]).unwrap();
        let events = log.take();

        let root = audit_root(&events);
        assert_ne!(root, [0u8; 32]);
        assert_ne!(root, audit_root(&events[..1]));
    }
}
