//! Premium and funding limit checking

use crate::{AppConfig, Error, Result};
use rust_decimal::Decimal;

/// Limit checker
#[derive(Debug, Clone)]
pub struct LimitChecker {
    max_premium: Decimal,
    min_airline_funding: Decimal,
}

impl LimitChecker {
    /// Create new limit checker
    pub fn new(config: &AppConfig) -> Self {
        Self {
            max_premium: config.max_premium,
            min_airline_funding: config.min_airline_funding,
        }
    }

    /// Premium must be positive and at most the cap
    pub fn check_premium(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO || amount > self.max_premium {
            return Err(Error::PremiumOutOfRange {
                amount,
                max: self.max_premium,
            });
        }
        Ok(())
    }

    /// Airline funding must reach the minimum
    pub fn check_airline_funding(&self, amount: Decimal) -> Result<()> {
        if amount < self.min_airline_funding {
            return Err(Error::InsufficientFunding {
                amount,
                minimum: self.min_airline_funding,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_limit() {
        let checker = LimitChecker::new(&AppConfig::default());

        assert!(checker.check_premium(Decimal::new(5, 1)).is_ok());
        assert!(checker.check_premium(Decimal::ONE).is_ok());
        assert!(checker.check_premium(Decimal::ZERO).is_err());
        assert!(checker.check_premium(Decimal::new(101, 2)).is_err());
    }

    #[test]
    fn test_funding_minimum() {
        let checker = LimitChecker::new(&AppConfig::default());

        assert!(checker.check_airline_funding(Decimal::from(10)).is_ok());
        assert!(matches!(
            checker.check_airline_funding(Decimal::new(999, 2)),
            Err(Error::InsufficientFunding { .. })
        ));
    }
}
