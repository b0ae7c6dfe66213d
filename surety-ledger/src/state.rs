//! The ledger state object and its entry points
//!
//! `SuretyData` owns one instance of every component and composes them. Each
//! entry point checks all of its preconditions before it writes anything, so
//! a rejected call leaves state and the audit log exactly as they were.
//!
//! Guard order for mutating entry points:
//!
//! 1. operational flag (except the toggle and the authorization pair)
//! 2. caller privilege (owner or authorized caller)
//! 3. argument and registry checks
//! 4. effects, then events
//!
//! While a savepoint is open every effect is journalled, so a failure after
//! effects have started (a refused transfer, a failed commit) undoes the
//! call, nested calls included.

use crate::access::{require_valid_address, AccessControl};
use crate::airlines::{AirlineRegistry, FundingGuard};
use crate::escrow::{Escrow, FundsTransfer};
use crate::events::{EventKind, EventLog, LedgerEvent};
use crate::flights::FlightRegistry;
use crate::guards::{RateLimit, ReentrancyGuard};
use crate::insurance::InsuranceLedger;
use crate::journal::{Counters, Journal, Row, Savepoint, Settings, Undo};
use crate::operational::{OperationalControl, VoteOutcome};
use crate::processing::{process_status, PayoutPolicy, StatusOutcome};
use crate::types::{Address, Airline, CallContext, Flight, FlightKey, FlightStatus, Policy};
use crate::{Config, Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Rows touched since a savepoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Touched {
    Access,
    Operational,
    Airline(Address),
    Flight(FlightKey),
    Policies(FlightKey),
    Pending(Address),
}

/// Complete ledger state
#[derive(Debug, Clone)]
pub struct SuretyData {
    access: AccessControl,
    operational: OperationalControl,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    insurance: InsuranceLedger,
    escrow: Escrow,
    guard: ReentrancyGuard,
    rate_limit: RateLimit,
    funding_guard: FundingGuard,
    payout_policy: PayoutPolicy,
    log: EventLog,
    journal: Journal,
}

impl SuretyData {
    /// Construct with the configured owner and seed airline
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut data = Self {
            access: AccessControl::new(config.owner),
            operational: OperationalControl::new(config.operational.vote_threshold),
            airlines: AirlineRegistry::new(),
            flights: FlightRegistry::new(),
            insurance: InsuranceLedger::new(),
            escrow: Escrow::new(),
            guard: ReentrancyGuard::default(),
            rate_limit: RateLimit::new(Utc::now(), config.rate_limit.window_secs),
            funding_guard: config.funding_guard,
            payout_policy: config.payout_policy,
            log: EventLog::default(),
            journal: Journal::default(),
        };

        let seed = &config.seed_airline;
        data.log.append_all(vec![EventKind::AirlineRegistered {
            airline: seed.address,
            name: seed.name.clone(),
        }])?;
        data.airlines
            .insert(seed.name.clone(), seed.address, seed.funded);

        tracing::info!(
            owner = %config.owner,
            seed_airline = %seed.address,
            "Surety ledger initialised"
        );

        Ok(data)
    }

    /// Rebuild from stored rows
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Result<Self> {
        let mut settings = None;
        let mut counters = None;
        let mut access = None;
        let mut operational = None;
        let mut airlines = BTreeMap::new();
        let mut airline_order = BTreeMap::new();
        let mut flights = BTreeMap::new();
        let mut flight_order = BTreeMap::new();
        let mut policies = BTreeMap::new();
        let mut pending = BTreeMap::new();

        for row in rows {
            match row {
                Row::Settings(s) => settings = Some(s),
                Row::Counters(c) => counters = Some(c),
                Row::Access(a) => access = Some(a),
                Row::Operational(o) => operational = Some(o),
                Row::Airline { address, airline } => {
                    airlines.insert(address, airline);
                }
                Row::Flight { key, flight } => {
                    flights.insert(key, flight);
                }
                Row::Policies { key, policies: list } => {
                    policies.insert(key, list);
                }
                Row::Pending { passenger, amount } => {
                    pending.insert(passenger, amount);
                }
                Row::AirlineOrder { position, address } => {
                    airline_order.insert(position, address);
                }
                Row::FlightOrder { position, key } => {
                    flight_order.insert(position, key);
                }
            }
        }

        let settings: Settings = settings.ok_or_else(|| missing_row("settings"))?;
        let counters: Counters = counters.ok_or_else(|| missing_row("counters"))?;

        Ok(Self {
            access: access.ok_or_else(|| missing_row("access"))?,
            operational: operational.ok_or_else(|| missing_row("operational"))?,
            airlines: AirlineRegistry::from_parts(airlines, airline_order.into_values().collect()),
            flights: FlightRegistry::from_parts(flights, flight_order.into_values().collect()),
            insurance: InsuranceLedger::from_parts(policies),
            escrow: Escrow::from_parts(pending, counters.pool),
            guard: ReentrancyGuard::with_entries(counters.withdrawals),
            rate_limit: settings.rate_limit,
            funding_guard: settings.funding_guard,
            payout_policy: settings.payout_policy,
            log: EventLog::resume(counters.next_sequence, counters.head_hash),
            journal: Journal::default(),
        })
    }

    /// Every row of the current state
    pub fn rows(&self) -> Vec<Row> {
        let mut rows = vec![
            Row::Settings(self.settings()),
            Row::Counters(self.counters()),
            Row::Access(self.access.clone()),
            Row::Operational(self.operational.clone()),
        ];
        rows.extend(self.airlines.iter().map(|(address, airline)| Row::Airline {
            address: *address,
            airline: airline.clone(),
        }));
        rows.extend(self.flights.iter().map(|(key, flight)| Row::Flight {
            key: *key,
            flight: flight.clone(),
        }));
        rows.extend(self.insurance.iter().map(|(key, policies)| Row::Policies {
            key: *key,
            policies: policies.clone(),
        }));
        rows.extend(self.escrow.pending_entries().map(|(passenger, amount)| Row::Pending {
            passenger: *passenger,
            amount: *amount,
        }));
        self.push_order_rows(&mut rows, 0, 0);
        rows
    }

    /// Rows written since `savepoint`, each once, with current values
    pub fn changed_rows(&self, savepoint: &Savepoint) -> Vec<Row> {
        let touched: BTreeSet<Touched> = self
            .journal
            .since(savepoint.undo_len)
            .iter()
            .map(|undo| match undo {
                Undo::Access(_) => Touched::Access,
                Undo::Operational(_) => Touched::Operational,
                Undo::Airline(address, _) => Touched::Airline(*address),
                Undo::Flight(key, _) => Touched::Flight(*key),
                Undo::PolicyAppended(key) | Undo::Policies(key, _) => Touched::Policies(*key),
                Undo::Pending(passenger, _) => Touched::Pending(*passenger),
            })
            .collect();

        let mut rows = vec![Row::Counters(self.counters())];
        for entry in touched {
            let row = match entry {
                Touched::Access => Some(Row::Access(self.access.clone())),
                Touched::Operational => Some(Row::Operational(self.operational.clone())),
                Touched::Airline(address) => self.airlines.get(&address).map(|airline| Row::Airline {
                    address,
                    airline: airline.clone(),
                }),
                Touched::Flight(key) => self.flights.get(&key).map(|flight| Row::Flight {
                    key,
                    flight: flight.clone(),
                }),
                Touched::Policies(key) => Some(Row::Policies {
                    key,
                    policies: self.insurance.policies(&key).to_vec(),
                }),
                Touched::Pending(passenger) => Some(Row::Pending {
                    passenger,
                    amount: self.escrow.pending(&passenger),
                }),
            };
            rows.extend(row);
        }
        self.push_order_rows(&mut rows, savepoint.airlines, savepoint.flights);
        rows
    }

    fn push_order_rows(&self, rows: &mut Vec<Row>, airlines_from: usize, flights_from: usize) {
        let airlines = self.airlines.registered().iter().enumerate().skip(airlines_from);
        rows.extend(airlines.map(|(position, address)| Row::AirlineOrder {
            position: position as u64,
            address: *address,
        }));
        let flights = self.flights.registered().iter().enumerate().skip(flights_from);
        rows.extend(flights.map(|(position, key)| Row::FlightOrder {
            position: position as u64,
            key: *key,
        }));
    }

    fn settings(&self) -> Settings {
        Settings {
            rate_limit: self.rate_limit.clone(),
            funding_guard: self.funding_guard,
            payout_policy: self.payout_policy,
        }
    }

    fn counters(&self) -> Counters {
        Counters {
            pool: self.escrow.pool_balance(),
            withdrawals: self.guard.entries(),
            next_sequence: self.log.next_sequence(),
            head_hash: self.log.head_hash(),
        }
    }

    // Savepoints

    /// Open a savepoint; effects from here on are journalled
    pub fn savepoint(&mut self) -> Savepoint {
        self.journal.open();
        Savepoint {
            undo_len: self.journal.len(),
            counters: self.counters(),
            staged_events: self.log.staged(),
            airlines: self.airlines.len(),
            flights: self.flights.registered().len(),
        }
    }

    /// Undo every effect since `savepoint`, staged events included
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        for undo in self.journal.unwind(savepoint.undo_len) {
            match undo {
                Undo::Access(access) => self.access = access,
                Undo::Operational(operational) => self.operational = operational,
                Undo::Airline(address, prior) => self.airlines.put(address, prior),
                Undo::Flight(key, prior) => self.flights.put(key, prior),
                Undo::PolicyAppended(key) => self.insurance.pop(&key),
                Undo::Policies(key, prior) => self.insurance.put(key, prior),
                Undo::Pending(passenger, prior) => self.escrow.put_pending(passenger, prior),
            }
        }
        self.airlines.truncate_order(savepoint.airlines);
        self.flights.truncate_order(savepoint.flights);

        let counters = savepoint.counters;
        self.escrow.set_pool(counters.pool);
        self.guard.set_entries(counters.withdrawals);
        self.log
            .rewind(counters.next_sequence, counters.head_hash, savepoint.staged_events);
        self.journal.close();
    }

    /// Keep every effect since `savepoint`
    pub fn release(&mut self, _savepoint: Savepoint) {
        self.journal.close();
    }

    /// Run `f` under a savepoint; an error undoes everything `f` changed
    pub fn atomically<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let savepoint = self.savepoint();
        match f(self) {
            Ok(value) => {
                self.release(savepoint);
                Ok(value)
            }
            Err(e) => {
                self.rollback_to(savepoint);
                Err(e)
            }
        }
    }

    fn touch(&mut self, undo: impl FnOnce(&Self) -> Undo) {
        if self.journal.is_open() {
            let undo = undo(self);
            self.journal.record(undo);
        }
    }

    /// Drain events produced since the last call
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        self.log.take()
    }

    /// Audit-log head
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    // Operational control

    /// Owner vote on the operational flag
    pub fn set_operating_status(&mut self, ctx: &CallContext, mode: bool) -> Result<VoteOutcome> {
        self.access.require_owner(&ctx.caller)?;
        self.touch(|d| Undo::Operational(d.operational.clone()));
        Ok(self.operational.vote(ctx.caller, mode))
    }

    /// Current operational flag
    pub fn is_operational(&self) -> bool {
        self.operational.is_operational()
    }

    // Access control

    /// Add `addr` to the authorized-caller set; owner only, idempotent
    pub fn authorize_caller(&mut self, ctx: &CallContext, addr: Address) -> Result<bool> {
        self.access.require_owner(&ctx.caller)?;
        require_valid_address(&addr)?;

        self.touch(|d| Undo::Access(d.access.clone()));
        let added = self.access.authorize(addr);
        if added {
            tracing::info!(caller = %addr, "Caller authorized");
        }
        Ok(added)
    }

    /// Remove `addr` from the authorized-caller set; owner only, idempotent
    pub fn deauthorize_caller(&mut self, ctx: &CallContext, addr: Address) -> Result<bool> {
        self.access.require_owner(&ctx.caller)?;

        self.touch(|d| Undo::Access(d.access.clone()));
        let removed = self.access.deauthorize(&addr);
        if removed {
            tracing::info!(caller = %addr, "Caller deauthorized");
        }
        Ok(removed)
    }

    /// Contract owner
    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    /// Is `caller` the owner
    pub fn is_owner(&self, caller: &Address) -> bool {
        self.access.is_owner(caller)
    }

    /// Is `caller` authorized
    pub fn is_authorized(&self, caller: &Address) -> bool {
        self.access.is_authorized(caller)
    }

    // Airline registry

    /// Register an airline
    ///
    /// Carries no caller check beyond the operational flag; the calling
    /// collaborator decides who may register airlines.
    pub fn register_airline(&mut self, _ctx: &CallContext, name: &str, address: Address) -> Result<()> {
        self.operational.require_operational()?;
        require_valid_address(&address)?;
        self.airlines.check_register(&address)?;

        self.log.append_all(vec![EventKind::AirlineRegistered {
            airline: address,
            name: name.to_string(),
        }])?;
        self.touch(|d| Undo::Airline(address, d.airlines.get(&address).cloned()));
        self.airlines.insert(name.to_string(), address, false);

        tracing::info!(airline = %address, name, "Airline registered");
        Ok(())
    }

    /// Set an airline's funding flag under the configured guard
    pub fn fund_airline(&mut self, ctx: &CallContext, address: Address) -> Result<()> {
        self.operational.require_operational()?;
        self.access.require_authorized(&ctx.caller)?;
        self.airlines.check_fund(&address, self.funding_guard)?;

        self.log
            .append_all(vec![EventKind::AirlineFunded { airline: address }])?;
        self.touch(|d| Undo::Airline(address, d.airlines.get(&address).cloned()));
        self.airlines.mark_funded(&address);

        tracing::info!(airline = %address, "Airline funded");
        Ok(())
    }

    /// Airline name
    pub fn get_airline_name(&self, address: &Address) -> Option<&str> {
        self.airlines.name(address)
    }

    /// Airline record
    pub fn airline(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    /// Is `address` a registered airline
    pub fn is_airline(&self, address: &Address) -> bool {
        self.airlines.is_airline(address)
    }

    /// Is `address` a funded airline
    pub fn is_funded_airline(&self, address: &Address) -> bool {
        self.airlines.is_funded(address)
    }

    /// Registered airlines in registration order
    pub fn get_registered_airlines(&self) -> &[Address] {
        self.airlines.registered()
    }

    // Flight registry

    /// Register a flight; returns its key
    pub fn register_flight(
        &mut self,
        ctx: &CallContext,
        airline: Address,
        flight_code: &str,
        origin: &str,
        destination: &str,
        timestamp: u64,
    ) -> Result<FlightKey> {
        self.operational.require_operational()?;
        self.access.require_authorized(&ctx.caller)?;
        require_valid_address(&airline)?;

        let key = FlightKey::derive(&airline, flight_code, timestamp);
        self.flights.check_register(&key)?;

        self.log.append_all(vec![EventKind::FlightRegistered {
            flight_key: key,
            airline,
            flight_code: flight_code.to_string(),
            timestamp,
        }])?;
        self.touch(|d| Undo::Flight(key, d.flights.get(&key).cloned()));
        self.flights.insert(
            key,
            airline,
            flight_code.to_string(),
            origin.to_string(),
            destination.to_string(),
            timestamp,
        );

        tracing::info!(flight_key = %key, airline = %airline, flight_code, timestamp, "Flight registered");
        Ok(key)
    }

    /// Is the triple a registered flight
    pub fn is_flight(&self, airline: &Address, flight_code: &str, timestamp: u64) -> bool {
        self.flights
            .is_flight(&FlightKey::derive(airline, flight_code, timestamp))
    }

    /// Has a final status been recorded for the triple
    pub fn is_landed_flight(&self, airline: &Address, flight_code: &str, timestamp: u64) -> bool {
        self.flights
            .is_landed(&FlightKey::derive(airline, flight_code, timestamp))
    }

    /// Stored status for the triple
    pub fn get_flight_status_code(&self, airline: &Address, flight_code: &str, timestamp: u64) -> FlightStatus {
        self.flights
            .status(&FlightKey::derive(airline, flight_code, timestamp))
    }

    /// Flight record by key
    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    /// Registered flight keys in registration order
    pub fn registered_flights(&self) -> &[FlightKey] {
        self.flights.registered()
    }

    // Insurance ledger

    /// Append a policy for `passenger` on the triple; returns the flight key
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        ctx: &CallContext,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
        passenger: Address,
        amount: Decimal,
        multiplier: Decimal,
    ) -> Result<FlightKey> {
        self.operational.require_operational()?;
        self.access.require_authorized(&ctx.caller)?;
        require_valid_address(&passenger)?;
        if amount.is_sign_negative() {
            return Err(Error::InvalidAmount(amount));
        }
        if multiplier.is_sign_negative() {
            return Err(Error::InvalidAmount(multiplier));
        }

        let key = FlightKey::derive(&airline, flight_code, timestamp);

        self.log.append_all(vec![EventKind::InsuranceBought {
            flight_key: key,
            passenger,
            amount,
            multiplier,
        }])?;
        self.touch(|_| Undo::PolicyAppended(key));
        self.insurance.push(key, passenger, amount, multiplier);

        tracing::info!(flight_key = %key, passenger = %passenger, amount = %amount, "Insurance bought");
        Ok(key)
    }

    /// Does `passenger` hold a policy on the triple
    pub fn is_insured(&self, passenger: &Address, airline: &Address, flight_code: &str, timestamp: u64) -> bool {
        self.insurance
            .is_insured(&FlightKey::derive(airline, flight_code, timestamp), passenger)
    }

    /// Policies on a flight
    pub fn policies(&self, key: &FlightKey) -> &[Policy] {
        self.insurance.policies(key)
    }

    // Status processing

    /// Apply an oracle status report
    pub fn process_flight_status(
        &mut self,
        ctx: &CallContext,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
        status: FlightStatus,
    ) -> Result<StatusOutcome> {
        self.operational.require_operational()?;
        self.access.require_authorized(&ctx.caller)?;

        let key = FlightKey::derive(&airline, flight_code, timestamp);
        self.atomically(|data| data.apply_status(key, status))
    }

    fn apply_status(&mut self, key: FlightKey, status: FlightStatus) -> Result<StatusOutcome> {
        self.touch(|d| Undo::Flight(key, d.flights.get(&key).cloned()));
        if status == FlightStatus::LateAirline {
            self.touch(|d| Undo::Policies(key, d.insurance.policies(&key).to_vec()));
            let passengers: BTreeSet<Address> = self
                .insurance
                .policies(&key)
                .iter()
                .map(|p| p.passenger)
                .collect();
            for passenger in passengers {
                self.touch(|d| Undo::Pending(passenger, d.escrow.pending_entry(&passenger)));
            }
        }

        let outcome = process_status(
            &mut self.flights,
            &mut self.insurance,
            &mut self.escrow,
            key,
            status,
            self.payout_policy,
        )?;
        self.log.append_all(outcome.events.clone())?;

        Ok(outcome)
    }

    // Escrow

    /// Accept a contribution into the pool backing payouts
    pub fn fund(&mut self, ctx: &CallContext, amount: Decimal) -> Result<()> {
        self.operational.require_operational()?;
        self.escrow.deposit(amount)?;

        tracing::info!(contributor = %ctx.origin, amount = %amount, "Pool funded");
        Ok(())
    }

    /// Fallback for plain value transfers; routes to `fund`
    pub fn receive(&mut self, ctx: &CallContext, amount: Decimal) -> Result<()> {
        self.fund(ctx, amount)
    }

    /// Withdraw the passenger's whole pending balance
    ///
    /// The balance is zeroed and the pool debited before `transfer` runs. A
    /// failed transfer undoes the withdrawal together with anything the
    /// collaborator changed through nested calls.
    pub fn pay(
        &mut self,
        ctx: &CallContext,
        passenger: Address,
        transfer: &mut dyn FundsTransfer,
    ) -> Result<Decimal> {
        self.operational.require_operational()?;
        self.access.require_authorized(&ctx.caller)?;
        if ctx.origin != passenger {
            tracing::warn!(origin = %ctx.origin, passenger = %passenger, "Proxy withdrawal rejected");
            return Err(Error::ProxyNotAllowed {
                origin: ctx.origin,
                passenger,
            });
        }
        self.rate_limit.check(Utc::now())?;
        if self.escrow.pending(&passenger) <= Decimal::ZERO {
            return Err(Error::NoFunds(passenger));
        }

        self.atomically(|data| {
            data.guard.enter()?;
            let result = data.release_and_transfer(ctx, passenger, transfer);
            data.guard.exit();
            result
        })
    }

    fn release_and_transfer(
        &mut self,
        ctx: &CallContext,
        passenger: Address,
        transfer: &mut dyn FundsTransfer,
    ) -> Result<Decimal> {
        self.touch(|d| Undo::Pending(passenger, d.escrow.pending_entry(&passenger)));
        let amount = self.escrow.release(&passenger)?;

        if let Err(e) = transfer.transfer(self, ctx, passenger, amount) {
            tracing::warn!(passenger = %passenger, amount = %amount, error = %e, "Withdrawal transfer failed");
            return Err(e);
        }

        self.log.append_all(vec![EventKind::AccountWithdrawn { passenger, amount }])?;
        tracing::info!(passenger = %passenger, amount = %amount, "Account withdrawn");
        Ok(amount)
    }

    /// Amount owed to `passenger`
    pub fn get_pending_payment_amount(&self, passenger: &Address) -> Decimal {
        self.escrow.pending(passenger)
    }

    /// Value held by the ledger
    pub fn pool_balance(&self) -> Decimal {
        self.escrow.pool_balance()
    }

    /// Sum of all pending balances
    pub fn total_pending(&self) -> Decimal {
        self.escrow.total_pending()
    }

    /// Completed withdrawal entries
    pub fn withdrawal_entries(&self) -> u64 {
        self.guard.entries()
    }
}

fn missing_row(name: &str) -> Error {
    Error::Storage(format!("Stored state has no {} row", name))
}
