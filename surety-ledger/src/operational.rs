//! Pause/resume gate with a per-round voter list

use crate::types::Address;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Outcome of one `setOperatingStatus` vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    /// Vote recorded; threshold not yet reached
    Recorded {
        /// Votes in the current round
        votes: usize,
        /// Votes needed
        required: usize,
    },
    /// Caller already voted this round; nothing changed
    Duplicate,
    /// Threshold reached; flag set and round cleared
    Switched {
        /// New value of the operational flag
        operational: bool,
    },
}

/// Operational flag and the consensus round that flips it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalControl {
    operational: bool,
    threshold: usize,
    voters: Vec<Address>,
}

impl OperationalControl {
    /// Start operational with the given vote threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            operational: true,
            threshold,
            voters: Vec::new(),
        }
    }

    /// Current flag
    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Fail with `NotOperational` while paused
    pub fn require_operational(&self) -> Result<()> {
        if self.operational {
            Ok(())
        } else {
            Err(Error::NotOperational)
        }
    }

    /// Voters in the current round
    pub fn voters(&self) -> &[Address] {
        &self.voters
    }

    /// Record a vote for `mode`; caller privileges are checked by the ledger
    pub(crate) fn vote(&mut self, voter: Address, mode: bool) -> VoteOutcome {
        if self.voters.contains(&voter) {
            tracing::debug!(voter = %voter, "Duplicate operating-status vote ignored");
            return VoteOutcome::Duplicate;
        }

        self.voters.push(voter);
        if self.voters.len() >= self.threshold {
            self.operational = mode;
            self.voters.clear();
            tracing::info!(operational = mode, "Operating status switched");
            return VoteOutcome::Switched { operational: mode };
        }

        VoteOutcome::Recorded {
            votes: self.voters.len(),
            required: self.threshold,
        }
    }
}
