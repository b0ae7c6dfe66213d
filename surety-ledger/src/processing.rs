//! Flight-status state machine and the payout-crediting engine
//!
//! ```text
//! UNKNOWN(0) ──► ON_TIME(10) | LATE_AIRLINE(20) | LATE_WEATHER(30)
//!                | LATE_TECHNICAL(40) | LATE_OTHER(50)
//! ```
//!
//! The first non-`UNKNOWN` report is final. Later reports are accepted and
//! still produce a status event, but leave the stored status untouched.
//! Accepting `LATE_AIRLINE` credits every uncredited policy on the flight.
//!
//! Credits are planned against current balances before anything is written,
//! so an overflow rejects the whole report instead of crediting part of it.

use crate::escrow::Escrow;
use crate::events::EventKind;
use crate::flights::FlightRegistry;
use crate::insurance::InsuranceLedger;
use crate::types::{Address, FlightKey, FlightStatus, Policy};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a credited policy's payout is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutPolicy {
    /// As deployed: the premium amount, multiplier ignored
    #[default]
    Amount,
    /// Premium times the recorded multiplier
    AmountTimesMultiplier,
}

impl PayoutPolicy {
    /// Payout for one policy
    pub fn payout(&self, policy: &Policy) -> Result<Decimal> {
        match self {
            PayoutPolicy::Amount => Ok(policy.amount),
            PayoutPolicy::AmountTimesMultiplier => policy
                .amount
                .checked_mul(policy.multiplier)
                .ok_or_else(|| Error::Overflow(format!("payout for {}", policy.passenger))),
        }
    }
}

/// Result of one status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOutcome {
    /// Stored status changed
    pub applied: bool,
    /// Policies credited by this report
    pub credited: usize,
    /// Events to append
    pub events: Vec<EventKind>,
}

/// Credits to apply, computed without mutation
#[derive(Debug, Default)]
pub(crate) struct CreditPlan {
    /// (policy index, passenger, amount)
    credits: Vec<(usize, Address, Decimal)>,
    /// Final pending balance per passenger
    balances: BTreeMap<Address, Decimal>,
}

/// Plan credits for every uncredited policy on `key`
pub(crate) fn plan_credits(
    insurance: &InsuranceLedger,
    escrow: &Escrow,
    key: &FlightKey,
    payout: PayoutPolicy,
) -> Result<CreditPlan> {
    let mut plan = CreditPlan::default();

    for (index, policy) in insurance.policies(key).iter().enumerate() {
        if policy.is_credited {
            continue;
        }

        let amount = payout.payout(policy)?;
        let current = match plan.balances.get(&policy.passenger) {
            Some(balance) => *balance,
            None => escrow.pending(&policy.passenger),
        };
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow(format!("pending balance of {}", policy.passenger)))?;

        plan.balances.insert(policy.passenger, updated);
        plan.credits.push((index, policy.passenger, amount));
    }

    Ok(plan)
}

/// Apply a plan: flag each policy credited once and raise pending balances
pub(crate) fn apply_credits(
    insurance: &mut InsuranceLedger,
    escrow: &mut Escrow,
    key: &FlightKey,
    plan: CreditPlan,
) -> Vec<EventKind> {
    let mut events = Vec::with_capacity(plan.credits.len());

    if let Some(policies) = insurance.policies_mut(key) {
        for (index, passenger, amount) in plan.credits {
            let policy = &mut policies[index];
            if policy.is_credited {
                continue;
            }
            policy.is_credited = true;
            events.push(EventKind::InsureeCredited {
                flight_key: *key,
                passenger,
                amount,
            });
        }
    }

    for (passenger, balance) in plan.balances {
        escrow.set_pending(passenger, balance);
    }

    events
}

/// Run one status report through the state machine
pub(crate) fn process_status(
    flights: &mut FlightRegistry,
    insurance: &mut InsuranceLedger,
    escrow: &mut Escrow,
    key: FlightKey,
    status: FlightStatus,
    payout: PayoutPolicy,
) -> Result<StatusOutcome> {
    let accepts = status != FlightStatus::Unknown && flights.status(&key) == FlightStatus::Unknown;

    let plan = if accepts && status == FlightStatus::LateAirline {
        Some(plan_credits(insurance, escrow, &key, payout)?)
    } else {
        None
    };

    let applied = accepts && flights.set_status_if_unknown(key, status);

    let mut events = Vec::new();
    if let Some(plan) = plan {
        events = apply_credits(insurance, escrow, &key, plan);
    }
    let credited = events.len();

    if applied {
        tracing::info!(flight_key = %key, status = %status, credited, "Flight status recorded");
    } else {
        tracing::debug!(
            flight_key = %key,
            status = %status,
            stored = %flights.status(&key),
            "Flight status report not applied"
        );
    }

    events.push(EventKind::FlightStatusUpdated {
        flight_key: key,
        status,
        applied,
    });

    Ok(StatusOutcome {
        applied,
        credited,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        flights: FlightRegistry,
        insurance: InsuranceLedger,
        escrow: Escrow,
        key: FlightKey,
    }

    fn fixture() -> Fixture {
        let airline = Address::from_low_u64(1);
        let key = FlightKey::derive(&airline, "ND1309", 1_000);
        let mut flights = FlightRegistry::new();
        flights.insert(key, airline, "ND1309".into(), "DUB".into(), "LHR".into(), 1_000);

        let mut insurance = InsuranceLedger::new();
        insurance.push(key, Address::from_low_u64(10), Decimal::from(1), Decimal::new(15, 1));
        insurance.push(key, Address::from_low_u64(11), Decimal::from(2), Decimal::new(15, 1));
        insurance.push(key, Address::from_low_u64(10), Decimal::from(3), Decimal::new(15, 1));

        Fixture {
            flights,
            insurance,
            escrow: Escrow::new(),
            key,
        }
    }

    #[test]
    fn test_late_airline_credits_every_policy() {
        let mut f = fixture();
        let outcome = process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::LateAirline,
            PayoutPolicy::Amount,
        )
        .unwrap();

        assert!(outcome.applied);
        assert_eq!(outcome.credited, 3);
        assert_eq!(outcome.events.len(), 4);
        assert_eq!(f.escrow.pending(&Address::from_low_u64(10)), Decimal::from(4));
        assert_eq!(f.escrow.pending(&Address::from_low_u64(11)), Decimal::from(2));
        assert!(f.insurance.policies(&f.key).iter().all(|p| p.is_credited));
    }

    #[test]
    fn test_crediting_twice_is_idempotent() {
        let mut f = fixture();
        for _ in 0..2 {
            let plan = plan_credits(&f.insurance, &f.escrow, &f.key, PayoutPolicy::Amount).unwrap();
            apply_credits(&mut f.insurance, &mut f.escrow, &f.key, plan);
        }
        assert_eq!(f.escrow.pending(&Address::from_low_u64(10)), Decimal::from(4));
        assert_eq!(f.escrow.total_pending(), Decimal::from(6));
    }

    #[test]
    fn test_status_is_final() {
        let mut f = fixture();
        let first = process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::OnTime,
            PayoutPolicy::Amount,
        )
        .unwrap();
        assert!(first.applied);

        let second = process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::LateAirline,
            PayoutPolicy::Amount,
        )
        .unwrap();

        assert!(!second.applied);
        assert_eq!(second.credited, 0);
        assert_eq!(
            second.events,
            vec![EventKind::FlightStatusUpdated {
                flight_key: f.key,
                status: FlightStatus::LateAirline,
                applied: false,
            }]
        );
        assert_eq!(f.flights.status(&f.key), FlightStatus::OnTime);
        assert_eq!(f.escrow.total_pending(), Decimal::ZERO);
    }

    #[test]
    fn test_other_late_codes_do_not_credit() {
        let mut f = fixture();
        let outcome = process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::LateWeather,
            PayoutPolicy::Amount,
        )
        .unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.credited, 0);
        assert_eq!(f.escrow.total_pending(), Decimal::ZERO);
    }

    #[test]
    fn test_unknown_report_changes_nothing() {
        let mut f = fixture();
        let outcome = process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::Unknown,
            PayoutPolicy::Amount,
        )
        .unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.events.len(), 1);
        assert!(!f.flights.is_landed(&f.key));
    }

    #[test]
    fn test_multiplier_payout() {
        let mut f = fixture();
        process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::LateAirline,
            PayoutPolicy::AmountTimesMultiplier,
        )
        .unwrap();
        // (1 + 3) * 1.5
        assert_eq!(f.escrow.pending(&Address::from_low_u64(10)), Decimal::from(6));
        assert_eq!(f.escrow.pending(&Address::from_low_u64(11)), Decimal::from(3));
    }

    #[test]
    fn test_overflow_rejects_whole_report() {
        let mut f = fixture();
        f.escrow.set_pending(Address::from_low_u64(11), Decimal::MAX);

        let result = process_status(
            &mut f.flights,
            &mut f.insurance,
            &mut f.escrow,
            f.key,
            FlightStatus::LateAirline,
            PayoutPolicy::Amount,
        );

        assert!(matches!(result, Err(Error::Overflow(_))));
        assert_eq!(f.flights.status(&f.key), FlightStatus::Unknown);
        assert!(f.insurance.policies(&f.key).iter().all(|p| !p.is_credited));
        assert_eq!(f.escrow.pending(&Address::from_low_u64(10)), Decimal::ZERO);
    }
}
