//! Flight registry keyed by the deterministic flight key

use crate::types::{Address, Flight, FlightKey, FlightStatus};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Flights by key plus registration order
///
/// A status report for a key that was never registered is stored on an
/// unregistered placeholder record, mirroring a default-initialised slot.
/// Registering that key later replaces the placeholder.
#[derive(Debug, Clone, Default)]
pub struct FlightRegistry {
    flights: BTreeMap<FlightKey, Flight>,
    order: Vec<FlightKey>,
}

impl FlightRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored rows
    pub(crate) fn from_parts(flights: BTreeMap<FlightKey, Flight>, order: Vec<FlightKey>) -> Self {
        Self { flights, order }
    }

    /// Check that `key` is not yet registered
    pub fn check_register(&self, key: &FlightKey) -> Result<()> {
        if self.is_flight(key) {
            return Err(Error::DuplicateFlight(*key));
        }
        Ok(())
    }

    /// Store a new flight with status `Unknown`; caller has run `check_register`
    pub(crate) fn insert(
        &mut self,
        key: FlightKey,
        airline: Address,
        flight_code: String,
        origin: String,
        destination: String,
        timestamp: u64,
    ) {
        self.flights.insert(
            key,
            Flight {
                is_registered: true,
                status: FlightStatus::Unknown,
                updated_timestamp: timestamp,
                airline,
                flight_code,
                origin,
                destination,
            },
        );
        self.order.push(key);
    }

    /// Write `status` only if the stored status is still `Unknown`
    ///
    /// Returns true when the stored status changed.
    pub(crate) fn set_status_if_unknown(&mut self, key: FlightKey, status: FlightStatus) -> bool {
        let flight = self.flights.entry(key).or_insert_with(|| Flight {
            is_registered: false,
            status: FlightStatus::Unknown,
            updated_timestamp: 0,
            airline: Address::ZERO,
            flight_code: String::new(),
            origin: String::new(),
            destination: String::new(),
        });

        if flight.status != FlightStatus::Unknown {
            return false;
        }
        flight.status = status;
        true
    }

    /// Put back a prior record (`None` removes it)
    pub(crate) fn put(&mut self, key: FlightKey, flight: Option<Flight>) {
        match flight {
            Some(flight) => self.flights.insert(key, flight),
            None => self.flights.remove(&key),
        };
    }

    /// Drop registrations past `len`
    pub(crate) fn truncate_order(&mut self, len: usize) {
        self.order.truncate(len);
    }

    /// All records, placeholders included
    pub fn iter(&self) -> impl Iterator<Item = (&FlightKey, &Flight)> {
        self.flights.iter()
    }

    /// Flight record (registered or placeholder)
    pub fn get(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    /// Is `key` a registered flight
    pub fn is_flight(&self, key: &FlightKey) -> bool {
        self.flights
            .get(key)
            .map(|f| f.is_registered)
            .unwrap_or(false)
    }

    /// Has a non-`Unknown` status been recorded
    pub fn is_landed(&self, key: &FlightKey) -> bool {
        self.status(key) != FlightStatus::Unknown
    }

    /// Stored status (`Unknown` for absent keys)
    pub fn status(&self, key: &FlightKey) -> FlightStatus {
        self.flights
            .get(key)
            .map(|f| f.status)
            .unwrap_or_default()
    }

    /// Registered keys in registration order
    pub fn registered(&self) -> &[FlightKey] {
        &self.order
    }
}
