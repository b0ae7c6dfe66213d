//! Operator configuration

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Operator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Largest premium a passenger may pay
    pub max_premium: Decimal,

    /// Smallest contribution that funds an airline
    pub min_airline_funding: Decimal,

    /// Multiplier recorded on every policy
    pub payout_multiplier: Decimal,

    /// Airlines admitted without a vote
    pub consensus_free_airlines: usize,

    /// Share of registered airlines whose votes admit a new one
    pub consensus_ratio: Decimal,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_premium: Decimal::ONE,
            min_airline_funding: Decimal::from(10),
            payout_multiplier: Decimal::new(15, 1), // 1.5
            consensus_free_airlines: 4,
            consensus_ratio: Decimal::new(5, 1), // 0.5
        }
    }
}

impl AppConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the operator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_premium <= Decimal::ZERO {
            return Err(Error::Config("max_premium must be positive".into()));
        }
        if self.min_airline_funding.is_sign_negative() {
            return Err(Error::Config("min_airline_funding must not be negative".into()));
        }
        if self.payout_multiplier.is_sign_negative() {
            return Err(Error::Config("payout_multiplier must not be negative".into()));
        }
        if self.consensus_ratio <= Decimal::ZERO || self.consensus_ratio > Decimal::ONE {
            return Err(Error::Config("consensus_ratio must be in (0, 1]".into()));
        }
        Ok(())
    }
}
