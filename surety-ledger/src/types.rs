//! Core types for the surety ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 20-byte account identity (airline, passenger, caller)
///
/// Serialized as raw bytes for bincode and as a `0x` hex string for
/// human-readable formats such as TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The null address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Deterministic address for fixtures and seeds: `n` in the low bytes
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the null address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits)
            .map_err(|e| crate::Error::Other(format!("Invalid address {}: {}", s, e)))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| crate::Error::Other(format!("Address must be 20 bytes: {}", s)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(serde::de::Error::custom)
        } else {
            <[u8; 20]>::deserialize(deserializer).map(Address)
        }
    }
}

/// Deterministic flight identifier: hash of `(airline, flight code, timestamp)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey([u8; 32]);

impl FlightKey {
    /// Derive the key for a flight triple
    pub fn derive(airline: &Address, flight_code: &str, timestamp: u64) -> Self {
        Self(crate::crypto::flight_key_digest(airline, flight_code, timestamp))
    }

    /// Create from digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Flight status reported by the oracle collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlightStatus {
    /// No status recorded yet
    #[default]
    Unknown = 0,
    /// On time
    OnTime = 10,
    /// Late, airline at fault (triggers payouts)
    LateAirline = 20,
    /// Late due to weather
    LateWeather = 30,
    /// Late due to a technical problem
    LateTechnical = 40,
    /// Late for another reason
    LateOther = 50,
}

impl FlightStatus {
    /// Numeric status code
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for FlightStatus {
    type Error = crate::Error;

    fn try_from(code: u8) -> crate::Result<Self> {
        match code {
            0 => Ok(FlightStatus::Unknown),
            10 => Ok(FlightStatus::OnTime),
            20 => Ok(FlightStatus::LateAirline),
            30 => Ok(FlightStatus::LateWeather),
            40 => Ok(FlightStatus::LateTechnical),
            50 => Ok(FlightStatus::LateOther),
            other => Err(crate::Error::Other(format!("Unknown status code: {}", other))),
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightStatus::Unknown => "UNKNOWN",
            FlightStatus::OnTime => "ON_TIME",
            FlightStatus::LateAirline => "LATE_AIRLINE",
            FlightStatus::LateWeather => "LATE_WEATHER",
            FlightStatus::LateTechnical => "LATE_TECHNICAL",
            FlightStatus::LateOther => "LATE_OTHER",
        };
        write!(f, "{}({})", name, self.code())
    }
}

/// Registered airline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    /// Display name
    pub name: String,
    /// Always true once stored
    pub is_registered: bool,
    /// Funding flag
    pub is_funded: bool,
}

/// Registered flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    /// Always true once stored
    pub is_registered: bool,
    /// Current status; leaves `Unknown` at most once
    pub status: FlightStatus,
    /// Scheduled timestamp (seconds since Unix epoch)
    pub updated_timestamp: u64,
    /// Operating airline
    pub airline: Address,
    /// Flight code, e.g. `ND1309`
    pub flight_code: String,
    /// Origin airport
    pub origin: String,
    /// Destination airport
    pub destination: String,
}

/// Insurance policy held by a passenger against one flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Insured passenger
    pub passenger: Address,
    /// Premium paid
    pub amount: Decimal,
    /// Payout multiplier recorded at purchase
    pub multiplier: Decimal,
    /// Set once by the crediting engine
    pub is_credited: bool,
}

/// Caller identities threaded through every entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Immediate caller (authorization checks)
    pub caller: Address,
    /// Originating identity of the call chain (anti-proxy check)
    pub origin: Address,
}

impl CallContext {
    /// Direct call: caller and origin are the same account
    pub fn direct(account: Address) -> Self {
        Self {
            caller: account,
            origin: account,
        }
    }

    /// Call relayed by `caller` on behalf of `origin`
    pub fn relayed(caller: Address, origin: Address) -> Self {
        Self { caller, origin }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr = Address::from_low_u64(0xfeed);
        let text = addr.to_string();
        assert_eq!(text, "0x000000000000000000000000000000000000feed");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_low_u64(1).is_zero());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(FlightStatus::Unknown.code(), 0);
        assert_eq!(FlightStatus::LateAirline.code(), 20);
        assert_eq!(FlightStatus::try_from(40).unwrap(), FlightStatus::LateTechnical);
        assert!(FlightStatus::try_from(15).is_err());
    }

    #[test]
    fn test_flight_key_is_deterministic() {
        let airline = Address::from_low_u64(7);
        let a = FlightKey::derive(&airline, "ND1309", 1_700_000_000);
        let b = FlightKey::derive(&airline, "ND1309", 1_700_000_000);
        let c = FlightKey::derive(&airline, "ND1309", 1_700_000_001);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
