//! Error types for the surety operator

use rust_decimal::Decimal;
use surety_ledger::Address;
use thiserror::Error;

/// Operator error
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected by the ledger
    #[error(transparent)]
    Ledger(#[from] surety_ledger::Error),

    /// Premium outside `(0, max_premium]`
    #[error("Premium {amount} outside (0, {max}]")]
    PremiumOutOfRange {
        /// Offered premium
        amount: Decimal,
        /// Configured cap
        max: Decimal,
    },

    /// Airline funding below the minimum
    #[error("Funding {amount} below minimum {minimum}")]
    InsufficientFunding {
        /// Offered funding
        amount: Decimal,
        /// Configured minimum
        minimum: Decimal,
    },

    /// Airline missing or not yet funded
    #[error("Airline not registered and funded: {0}")]
    NotFundedAirline(Address),

    /// Airline already voted for this candidate
    #[error("Airline {voter} already voted for {candidate}")]
    AlreadyVoted {
        /// Voting airline
        voter: Address,
        /// Candidate airline
        candidate: Address,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
