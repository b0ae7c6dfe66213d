//! Pending-balance accounting and fund release
//!
//! Withdrawal follows checks-effects-interactions: the passenger's balance is
//! zeroed and the pool debited before the external transfer is issued, so a
//! call that re-enters during the transfer already observes a zero balance.

use crate::state::SuretyData;
use crate::types::{Address, CallContext};
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// External collaborator that moves funds out of the ledger
///
/// The implementation receives the ledger itself so that a recipient which
/// calls back into the ledger mid-transfer can be modelled.
pub trait FundsTransfer {
    /// Send `amount` to `to`; an error aborts the withdrawal
    fn transfer(
        &mut self,
        ledger: &mut SuretyData,
        ctx: &CallContext,
        to: Address,
        amount: Decimal,
    ) -> Result<()>;
}

/// In-memory external balances
#[derive(Debug, Clone, Default)]
pub struct Wallets {
    balances: BTreeMap<Address, Decimal>,
}

impl Wallets {
    /// Empty wallet set
    pub fn new() -> Self {
        Self::default()
    }

    /// External balance of `account`
    pub fn balance(&self, account: &Address) -> Decimal {
        self.balances.get(account).copied().unwrap_or(Decimal::ZERO)
    }
}

impl FundsTransfer for Wallets {
    fn transfer(
        &mut self,
        _ledger: &mut SuretyData,
        _ctx: &CallContext,
        to: Address,
        amount: Decimal,
    ) -> Result<()> {
        let balance = self.balances.entry(to).or_insert(Decimal::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| Error::TransferFailed(format!("wallet overflow for {}", to)))?;
        Ok(())
    }
}

/// Shared collaborator, e.g. wallets inspected while the actor owns a clone
impl<T: FundsTransfer> FundsTransfer for Arc<Mutex<T>> {
    fn transfer(
        &mut self,
        ledger: &mut SuretyData,
        ctx: &CallContext,
        to: Address,
        amount: Decimal,
    ) -> Result<()> {
        let mut inner = self
            .lock()
            .map_err(|_| Error::Concurrency("transfer collaborator poisoned".to_string()))?;
        inner.transfer(ledger, ctx, to, amount)
    }
}

/// Pending balances and the pool backing them
#[derive(Debug, Clone, Default)]
pub struct Escrow {
    pending: BTreeMap<Address, Decimal>,
    pool: Decimal,
}

impl Escrow {
    /// Empty escrow
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored rows
    pub(crate) fn from_parts(pending: BTreeMap<Address, Decimal>, pool: Decimal) -> Self {
        Self { pending, pool }
    }

    /// Amount owed to `passenger`
    pub fn pending(&self, passenger: &Address) -> Decimal {
        self.pending.get(passenger).copied().unwrap_or(Decimal::ZERO)
    }

    /// Value held by the ledger
    pub fn pool_balance(&self) -> Decimal {
        self.pool
    }

    /// Stored balance entry, if the passenger has one
    pub(crate) fn pending_entry(&self, passenger: &Address) -> Option<Decimal> {
        self.pending.get(passenger).copied()
    }

    /// Every pending balance, by passenger
    pub fn pending_entries(&self) -> impl Iterator<Item = (&Address, &Decimal)> {
        self.pending.iter()
    }

    /// Sum of all pending balances
    pub fn total_pending(&self) -> Decimal {
        self.pending.values().copied().sum()
    }

    /// Accept a contribution into the pool
    pub(crate) fn deposit(&mut self, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidAmount(amount));
        }
        self.pool = self
            .pool
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow("pool balance".to_string()))?;
        Ok(())
    }

    /// New balance for `passenger` after adding `amount`, without applying it
    pub(crate) fn credited_balance(&self, passenger: &Address, amount: Decimal) -> Result<Decimal> {
        self.pending(passenger)
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow(format!("pending balance of {}", passenger)))
    }

    pub(crate) fn set_pending(&mut self, passenger: Address, balance: Decimal) {
        self.pending.insert(passenger, balance);
    }

    /// Zero the passenger's balance and debit the pool; returns the amount released
    pub(crate) fn release(&mut self, passenger: &Address) -> Result<Decimal> {
        let amount = self.pending(passenger);
        if amount <= Decimal::ZERO {
            return Err(Error::NoFunds(*passenger));
        }
        if self.pool < amount {
            return Err(Error::InsufficientPool {
                required: amount,
                available: self.pool,
            });
        }

        self.pending.insert(*passenger, Decimal::ZERO);
        self.pool -= amount;
        Ok(amount)
    }

    /// Put back a prior balance (`None` removes the entry)
    pub(crate) fn put_pending(&mut self, passenger: Address, balance: Option<Decimal>) {
        match balance {
            Some(balance) => self.pending.insert(passenger, balance),
            None => self.pending.remove(&passenger),
        };
    }

    pub(crate) fn set_pool(&mut self, pool: Decimal) {
        self.pool = pool;
    }
}
