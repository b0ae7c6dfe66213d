//! Append-only policy sequences per flight key

use crate::types::{Address, FlightKey, Policy};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Policies by flight key, in purchase order
///
/// No existence, duplicate or cap checks at this layer; the authorized
/// operator decides who may buy what.
#[derive(Debug, Clone, Default)]
pub struct InsuranceLedger {
    policies: BTreeMap<FlightKey, Vec<Policy>>,
}

impl InsuranceLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored rows
    pub(crate) fn from_parts(policies: BTreeMap<FlightKey, Vec<Policy>>) -> Self {
        Self { policies }
    }

    /// Append an uncredited policy
    pub(crate) fn push(
        &mut self,
        key: FlightKey,
        passenger: Address,
        amount: Decimal,
        multiplier: Decimal,
    ) {
        self.policies.entry(key).or_default().push(Policy {
            passenger,
            amount,
            multiplier,
            is_credited: false,
        });
    }

    /// Drop the most recent policy on `key`
    pub(crate) fn pop(&mut self, key: &FlightKey) {
        if let Some(policies) = self.policies.get_mut(key) {
            policies.pop();
            if policies.is_empty() {
                self.policies.remove(key);
            }
        }
    }

    /// Replace the policies on `key`
    pub(crate) fn put(&mut self, key: FlightKey, policies: Vec<Policy>) {
        if policies.is_empty() {
            self.policies.remove(&key);
        } else {
            self.policies.insert(key, policies);
        }
    }

    /// Policies of every flight
    pub fn iter(&self) -> impl Iterator<Item = (&FlightKey, &Vec<Policy>)> {
        self.policies.iter()
    }

    /// Linear scan for a policy held by `passenger`
    pub fn is_insured(&self, key: &FlightKey, passenger: &Address) -> bool {
        self.policies(key).iter().any(|p| p.passenger == *passenger)
    }

    /// Policies for a flight (empty when none)
    pub fn policies(&self, key: &FlightKey) -> &[Policy] {
        self.policies.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn policies_mut(&mut self, key: &FlightKey) -> Option<&mut Vec<Policy>> {
        self.policies.get_mut(key)
    }

    /// Total number of policies across all flights
    pub fn policy_count(&self) -> usize {
        self.policies.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies_are_appended_without_dedup() {
        let mut ledger = InsuranceLedger::new();
        let key = FlightKey::from_bytes([7u8; 32]);
        let passenger = Address::from_low_u64(42);

        ledger.push(key, passenger, Decimal::ONE, Decimal::ONE);
        ledger.push(key, passenger, Decimal::from(2), Decimal::ONE);

        let policies = ledger.policies(&key);
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[1].amount, Decimal::from(2));
        assert!(policies.iter().all(|p| !p.is_credited));
        assert_eq!(ledger.policy_count(), 2);
    }

    #[test]
    fn test_pop_and_put_undo_changes() {
        let mut ledger = InsuranceLedger::new();
        let key = FlightKey::from_bytes([7u8; 32]);
        let passenger = Address::from_low_u64(42);

        ledger.push(key, passenger, Decimal::ONE, Decimal::ONE);
        let before = ledger.policies(&key).to_vec();
        ledger.push(key, passenger, Decimal::from(2), Decimal::ONE);
        ledger.pop(&key);
        assert_eq!(ledger.policies(&key), before.as_slice());

        ledger.pop(&key);
        assert_eq!(ledger.iter().count(), 0);

        ledger.put(key, before.clone());
        assert_eq!(ledger.policies(&key), before.as_slice());
    }

    #[test]
    fn test_is_insured() {
        let mut ledger = InsuranceLedger::new();
        let key = FlightKey::from_bytes([7u8; 32]);
        let other_key = FlightKey::from_bytes([8u8; 32]);
        let passenger = Address::from_low_u64(42);

        assert!(!ledger.is_insured(&key, &passenger));
        ledger.push(key, passenger, Decimal::ONE, Decimal::ONE);
        assert!(ledger.is_insured(&key, &passenger));
        assert!(!ledger.is_insured(&other_key, &passenger));
        assert!(!ledger.is_insured(&key, &Address::from_low_u64(43)));
    }
}
