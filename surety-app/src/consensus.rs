//! Multi-party airline admission
//!
//! The first `consensus_free_airlines` airlines are admitted on request.
//! Beyond that a candidate needs votes from `ceil(registered * ratio)`
//! distinct registered airlines.

use crate::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use surety_ledger::Address;

/// Result of an admission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionOutcome {
    /// Candidate registered in the ledger
    Registered,
    /// Vote recorded, more needed
    Pending {
        /// Votes so far
        votes: usize,
        /// Votes needed
        required: usize,
    },
}

/// Open admission rounds, one per candidate
#[derive(Debug, Clone, Default)]
pub struct AirlineAdmission {
    free_slots: usize,
    ratio: Decimal,
    votes: BTreeMap<Address, BTreeSet<Address>>,
}

impl AirlineAdmission {
    /// Create with the configured free slots and ratio
    pub fn new(free_slots: usize, ratio: Decimal) -> Self {
        Self {
            free_slots,
            ratio,
            votes: BTreeMap::new(),
        }
    }

    /// Votes needed with `registered` airlines; zero while slots are free
    pub fn required_votes(&self, registered: usize) -> usize {
        if registered < self.free_slots {
            return 0;
        }
        (Decimal::from(registered) * self.ratio)
            .ceil()
            .to_usize()
            .unwrap_or(registered)
            .max(1)
    }

    /// Votes recorded for `candidate`
    pub fn votes_for(&self, candidate: &Address) -> usize {
        self.votes.get(candidate).map_or(0, BTreeSet::len)
    }

    /// Check `voter` may vote; returns the vote count including it
    pub fn tally(&self, candidate: &Address, voter: &Address) -> Result<usize> {
        let votes = self.votes.get(candidate);
        if votes.is_some_and(|v| v.contains(voter)) {
            return Err(Error::AlreadyVoted {
                voter: *voter,
                candidate: *candidate,
            });
        }
        Ok(votes.map_or(0, BTreeSet::len) + 1)
    }

    /// Record a vote checked by `tally`
    pub fn record(&mut self, candidate: Address, voter: Address) {
        self.votes.entry(candidate).or_default().insert(voter);
    }

    /// Close the round for an admitted candidate
    pub fn close(&mut self, candidate: &Address) {
        self.votes.remove(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_required_votes() {
        let admission = AirlineAdmission::new(4, Decimal::new(5, 1));
        assert_eq!(admission.required_votes(1), 0);
        assert_eq!(admission.required_votes(3), 0);
        assert_eq!(admission.required_votes(4), 2);
        assert_eq!(admission.required_votes(5), 3);
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let mut admission = AirlineAdmission::new(0, Decimal::new(5, 1));
        let candidate = addr(9);

        assert_eq!(admission.tally(&candidate, &addr(1)).unwrap(), 1);
        admission.record(candidate, addr(1));
        assert!(matches!(
            admission.tally(&candidate, &addr(1)),
            Err(Error::AlreadyVoted { .. })
        ));
        assert_eq!(admission.tally(&candidate, &addr(2)).unwrap(), 2);

        admission.close(&candidate);
        assert_eq!(admission.votes_for(&candidate), 0);
    }
}
