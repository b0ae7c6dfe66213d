//! Error types for the surety ledger

use crate::types::{Address, FlightKey};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every rejection is synchronous and atomic: when an entry point returns an
/// error, none of its state changes or events persist.
#[derive(Error, Debug)]
pub enum Error {
    /// Mutating call while the ledger is paused
    #[error("Contract is currently not operational")]
    NotOperational,

    /// Caller is not the contract owner
    #[error("Caller is not contract owner: {0}")]
    NotOwner(Address),

    /// Caller is not in the authorized-caller set
    #[error("Caller is not authorized: {0}")]
    NotAuthorized(Address),

    /// Zero address supplied where an address is required
    #[error("Invalid address: {0}")]
    InvalidAddress(Address),

    /// Airline already registered
    #[error("Airline already registered: {0}")]
    AlreadyRegistered(Address),

    /// Flight key already registered
    #[error("Flight already registered: {0}")]
    DuplicateFlight(FlightKey),

    /// Airline already funded
    #[error("Airline already funded: {0}")]
    AlreadyFunded(Address),

    /// Airline not funded (as-deployed funding guard)
    #[error("Airline not funded: {0}")]
    AirlineNotFunded(Address),

    /// Airline was never registered
    #[error("Unknown airline: {0}")]
    UnknownAirline(Address),

    /// Negative or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(rust_decimal::Decimal),

    /// Withdrawal with a zero pending balance
    #[error("No funds to withdraw for {0}")]
    NoFunds(Address),

    /// Withdrawal requested by someone other than the originating passenger
    #[error("Proxy withdrawal not allowed: origin {origin} is not passenger {passenger}")]
    ProxyNotAllowed {
        /// Originating identity of the call
        origin: Address,
        /// Passenger whose balance was requested
        passenger: Address,
    },

    /// Nested withdrawal while another is in flight
    #[error("Reentrant call rejected")]
    Reentrancy,

    /// Rate-limit gate not yet open
    #[error("Rate limited until {0}")]
    RateLimited(chrono::DateTime<chrono::Utc>),

    /// Escrow pool cannot cover the withdrawal
    #[error("Insufficient pool balance: required {required}, available {available}")]
    InsufficientPool {
        /// Amount requested
        required: rust_decimal::Decimal,
        /// Pool balance
        available: rust_decimal::Decimal,
    },

    /// External funds transfer refused
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Balance arithmetic overflow
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Audit event not found
    #[error("Event not found: {0}")]
    EventNotFound(u64),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Error::NotOperational => "not_operational",
            Error::NotOwner(_) => "not_owner",
            Error::NotAuthorized(_) => "not_authorized",
            Error::InvalidAddress(_) => "invalid_address",
            Error::AlreadyRegistered(_) => "already_registered",
            Error::DuplicateFlight(_) => "duplicate_flight",
            Error::AlreadyFunded(_) => "already_funded",
            Error::AirlineNotFunded(_) => "airline_not_funded",
            Error::UnknownAirline(_) => "unknown_airline",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::NoFunds(_) => "no_funds",
            Error::ProxyNotAllowed { .. } => "proxy_not_allowed",
            Error::Reentrancy => "reentrancy",
            Error::RateLimited(_) => "rate_limited",
            Error::InsufficientPool { .. } => "insufficient_pool",
            Error::TransferFailed(_) => "transfer_failed",
            Error::Overflow(_) => "overflow",
            Error::EventNotFound(_) => "event_not_found",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
