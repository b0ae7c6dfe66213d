//! Airline registry

use crate::types::{Address, Airline};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guard applied by `fundAirline`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingGuard {
    /// As deployed: proceed only if the airline is already funded
    #[default]
    RequireFunded,
    /// Proceed only if the airline is not yet funded
    RequireUnfunded,
}

/// Registered airlines, keyed by address, plus registration order
#[derive(Debug, Clone, Default)]
pub struct AirlineRegistry {
    airlines: BTreeMap<Address, Airline>,
    order: Vec<Address>,
}

impl AirlineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored rows
    pub(crate) fn from_parts(airlines: BTreeMap<Address, Airline>, order: Vec<Address>) -> Self {
        Self { airlines, order }
    }

    /// Check that `address` can be registered
    pub fn check_register(&self, address: &Address) -> Result<()> {
        if self.is_airline(address) {
            return Err(Error::AlreadyRegistered(*address));
        }
        Ok(())
    }

    /// Insert a new airline; caller has run `check_register`
    pub(crate) fn insert(&mut self, name: String, address: Address, funded: bool) {
        self.airlines.insert(
            address,
            Airline {
                name,
                is_registered: true,
                is_funded: funded,
            },
        );
        self.order.push(address);
    }

    /// Check that `address` can be funded under `guard`
    pub fn check_fund(&self, address: &Address, guard: FundingGuard) -> Result<()> {
        let airline = self
            .airlines
            .get(address)
            .ok_or(Error::UnknownAirline(*address))?;

        match guard {
            FundingGuard::RequireFunded if !airline.is_funded => {
                Err(Error::AirlineNotFunded(*address))
            }
            FundingGuard::RequireUnfunded if airline.is_funded => {
                Err(Error::AlreadyFunded(*address))
            }
            _ => Ok(()),
        }
    }

    /// Set the funding flag; caller has run `check_fund`
    pub(crate) fn mark_funded(&mut self, address: &Address) {
        if let Some(airline) = self.airlines.get_mut(address) {
            airline.is_funded = true;
        }
    }

    /// Put back a prior record (`None` removes it)
    pub(crate) fn put(&mut self, address: Address, airline: Option<Airline>) {
        match airline {
            Some(airline) => self.airlines.insert(address, airline),
            None => self.airlines.remove(&address),
        };
    }

    /// Drop registrations past `len`
    pub(crate) fn truncate_order(&mut self, len: usize) {
        self.order.truncate(len);
    }

    /// All records, by address
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Airline)> {
        self.airlines.iter()
    }

    /// Airline record
    pub fn get(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    /// Airline name
    pub fn name(&self, address: &Address) -> Option<&str> {
        self.airlines.get(address).map(|a| a.name.as_str())
    }

    /// Is `address` a registered airline
    pub fn is_airline(&self, address: &Address) -> bool {
        self.airlines
            .get(address)
            .map(|a| a.is_registered)
            .unwrap_or(false)
    }

    /// Is `address` a funded airline
    pub fn is_funded(&self, address: &Address) -> bool {
        self.airlines
            .get(address)
            .map(|a| a.is_registered && a.is_funded)
            .unwrap_or(false)
    }

    /// Registered airlines in registration order
    pub fn registered(&self) -> &[Address] {
        &self.order
    }

    /// Number of registered airlines
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no airline is registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
