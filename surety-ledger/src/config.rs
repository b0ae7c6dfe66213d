//! Configuration for the ledger

use crate::airlines::FundingGuard;
use crate::processing::PayoutPolicy;
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Contract owner (fixed for the lifetime of the ledger)
    pub owner: Address,

    /// Airline registered at construction
    pub seed_airline: SeedAirlineConfig,

    /// Actor mailbox capacity (bounded for backpressure)
    pub mailbox_capacity: usize,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Operating-status consensus
    pub operational: OperationalConfig,

    /// Guard used by `fundAirline`
    pub funding_guard: FundingGuard,

    /// How credited payouts are computed
    pub payout_policy: PayoutPolicy,

    /// Withdrawal rate gate
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "surety-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data/surety"),
            owner: Address::from_low_u64(1),
            seed_airline: SeedAirlineConfig::default(),
            mailbox_capacity: 1000,
            storage: StorageConfig::default(),
            operational: OperationalConfig::default(),
            funding_guard: FundingGuard::default(),
            payout_policy: PayoutPolicy::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Seed airline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedAirlineConfig {
    /// Airline name
    pub name: String,

    /// Airline address
    pub address: Address,

    /// Initial funding flag
    pub funded: bool,
}

impl Default for SeedAirlineConfig {
    fn default() -> Self {
        Self {
            name: "First Airline".to_string(),
            address: Address::from_low_u64(0xa1),
            funded: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persist to RocksDB; in-memory only when false
    pub enabled: bool,

    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Operating-status consensus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationalConfig {
    /// Votes needed to flip the flag
    pub vote_threshold: usize,
}

impl Default for OperationalConfig {
    fn default() -> Self {
        Self { vote_threshold: 1 }
    }
}

/// Withdrawal rate gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Seconds after construction before withdrawals open
    pub window_secs: u64,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("SURETY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(owner) = std::env::var("SURETY_OWNER") {
            config.owner = owner
                .parse()
                .map_err(|e| crate::Error::Config(format!("SURETY_OWNER: {}", e)))?;
        }

        if let Ok(enabled) = std::env::var("SURETY_STORAGE_ENABLED") {
            config.storage.enabled = enabled
                .parse()
                .map_err(|e| crate::Error::Config(format!("SURETY_STORAGE_ENABLED: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.owner.is_zero() {
            return Err(crate::Error::Config("owner must not be the zero address".into()));
        }
        if self.seed_airline.address.is_zero() {
            return Err(crate::Error::Config(
                "seed airline must not be the zero address".into(),
            ));
        }
        if self.operational.vote_threshold == 0 {
            return Err(crate::Error::Config("vote_threshold must be at least 1".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be at least 1".into()));
        }
        if self.operational.vote_threshold > 1 {
            // Only the owner votes, and only once per round
            tracing::warn!(
                threshold = self.operational.vote_threshold,
                "Operating status can never switch with a threshold above one"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "surety-ledger");
        assert_eq!(config.operational.vote_threshold, 1);
        assert_eq!(config.funding_guard, FundingGuard::RequireFunded);
        assert_eq!(config.payout_policy, PayoutPolicy::Amount);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
            owner = "0x00000000000000000000000000000000000000ff"
            funding_guard = "require_unfunded"
            payout_policy = "amount_times_multiplier"

            [seed_airline]
            name = "Aer Test"
            address = "0x00000000000000000000000000000000000000a2"
            funded = true

            [storage]
            enabled = false

            [rate_limit]
            window_secs = 30
        "#;

        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.owner, Address::from_low_u64(0xff));
        assert_eq!(config.seed_airline.name, "Aer Test");
        assert!(config.seed_airline.funded);
        assert!(!config.storage.enabled);
        assert_eq!(config.funding_guard, FundingGuard::RequireUnfunded);
        assert_eq!(config.payout_policy, PayoutPolicy::AmountTimesMultiplier);
        assert_eq!(config.rate_limit.window_secs, 30);
        assert_eq!(config.mailbox_capacity, 1000);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = Config::default();
        config.operational.vote_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_owner() {
        let mut config = Config::default();
        config.owner = Address::ZERO;
        assert!(config.validate().is_err());
    }
}
