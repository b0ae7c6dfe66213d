//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify:
//! - Registry uniqueness: one entry per distinct airline or flight key
//! - Crediting idempotency: each policy credited at most once
//! - Conservation: credited policy amounts == pending balance + withdrawals
//! - Status immutability: the first final status sticks

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use surety_ledger::{
    Address, CallContext, Config, Error, FlightStatus, Ledger, SuretyData, Wallets,
};

const OWNER: u64 = 1;
const APP: u64 = 2;
const SEED: u64 = 0xa1;
const TS: u64 = 1_700_000_000;

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

fn app_for(origin: Address) -> CallContext {
    CallContext::relayed(addr(APP), origin)
}

/// Ledger with the operator authorized
fn test_data() -> SuretyData {
    let mut data = SuretyData::new(&Config::default()).unwrap();
    data.authorize_caller(&CallContext::direct(addr(OWNER)), addr(APP))
        .unwrap();
    data
}

/// Strategy for premiums (positive, two decimal places)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for flight statuses
fn status_strategy() -> impl Strategy<Value = FlightStatus> {
    prop_oneof![
        Just(FlightStatus::Unknown),
        Just(FlightStatus::OnTime),
        Just(FlightStatus::LateAirline),
        Just(FlightStatus::LateWeather),
        Just(FlightStatus::LateTechnical),
        Just(FlightStatus::LateOther),
    ]
}

/// Ledger operations for the conservation property
#[derive(Debug, Clone)]
enum Op {
    Fund(Decimal),
    Buy {
        flight: u8,
        passenger: u8,
        amount: Decimal,
    },
    Report {
        flight: u8,
        status: FlightStatus,
    },
    Pay {
        passenger: u8,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        amount_strategy().prop_map(Op::Fund),
        (0u8..3, 0u8..4, amount_strategy()).prop_map(|(flight, passenger, amount)| Op::Buy {
            flight,
            passenger,
            amount
        }),
        (0u8..3, status_strategy()).prop_map(|(flight, status)| Op::Report { flight, status }),
        (0u8..4).prop_map(|passenger| Op::Pay { passenger }),
    ]
}

fn flight_code(flight: u8) -> String {
    format!("ND{}", 1300 + flight as u32)
}

fn passenger(n: u8) -> Address {
    addr(100 + n as u64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: registry length grows by one per distinct airline
    #[test]
    fn prop_airline_registry_unique(ids in prop::collection::vec(0x100u64..0x110, 1..30)) {
        let mut data = test_data();
        let mut seen = BTreeSet::new();

        for id in ids {
            let before = data.get_registered_airlines().len();
            let result = data.register_airline(&app_for(addr(id)), "Airline", addr(id));

            if seen.insert(id) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(data.get_registered_airlines().len(), before + 1);
            } else {
                prop_assert!(matches!(result, Err(Error::AlreadyRegistered(_))));
                prop_assert_eq!(data.get_registered_airlines().len(), before);
            }
        }

        let listed: BTreeSet<_> = data.get_registered_airlines().iter().copied().collect();
        prop_assert_eq!(listed.len(), data.get_registered_airlines().len());
    }

    /// Property: a flight triple registers at most once
    #[test]
    fn prop_flight_key_unique(timestamps in prop::collection::vec(0u64..8, 1..20)) {
        let mut data = test_data();
        let mut seen = BTreeSet::new();

        for ts in timestamps {
            let result = data.register_flight(&app_for(addr(APP)), addr(SEED), "ND1309", "DUB", "LHR", ts);
            if seen.insert(ts) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(result, Err(Error::DuplicateFlight(_))));
            }
        }

        prop_assert_eq!(data.registered_flights().len(), seen.len());
    }

    /// Property: repeated LATE_AIRLINE reports credit each policy once
    #[test]
    fn prop_crediting_idempotent(
        policies in prop::collection::vec((0u8..4, amount_strategy()), 1..10),
        reports in 1usize..5,
    ) {
        let mut data = test_data();
        let mut expected: BTreeMap<Address, Decimal> = BTreeMap::new();

        for (p, amount) in &policies {
            data.buy(&app_for(passenger(*p)), addr(SEED), "ND1309", TS, passenger(*p), *amount, Decimal::ONE)
                .unwrap();
            *expected.entry(passenger(*p)).or_default() += *amount;
        }

        for _ in 0..reports {
            data.process_flight_status(&app_for(addr(APP)), addr(SEED), "ND1309", TS, FlightStatus::LateAirline)
                .unwrap();
        }

        for (p, amount) in expected {
            prop_assert_eq!(data.get_pending_payment_amount(&p), amount);
        }
    }

    /// Property: the first non-UNKNOWN status is never overwritten
    #[test]
    fn prop_status_immutable(statuses in prop::collection::vec(status_strategy(), 1..10)) {
        let mut data = test_data();
        let mut first_final = None;

        for status in statuses {
            data.process_flight_status(&app_for(addr(APP)), addr(SEED), "ND1309", TS, status)
                .unwrap();
            if first_final.is_none() && status != FlightStatus::Unknown {
                first_final = Some(status);
            }

            let stored = data.get_flight_status_code(&addr(SEED), "ND1309", TS);
            prop_assert_eq!(stored, first_final.unwrap_or(FlightStatus::Unknown));
        }
    }

    /// Property: for every passenger, credited policy amounts equal the
    /// pending balance plus everything withdrawn
    #[test]
    fn prop_pending_balance_conservation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut data = test_data();
        let mut wallets = Wallets::new();

        for op in ops {
            // Rejections are fine; they must simply leave no trace
            let _ = match op {
                Op::Fund(amount) => data.fund(&app_for(addr(APP)), amount),
                Op::Buy { flight, passenger: p, amount } => data
                    .buy(&app_for(passenger(p)), addr(SEED), &flight_code(flight), TS, passenger(p), amount, Decimal::ONE)
                    .map(|_| ()),
                Op::Report { flight, status } => data
                    .process_flight_status(&app_for(addr(APP)), addr(SEED), &flight_code(flight), TS, status)
                    .map(|_| ()),
                Op::Pay { passenger: p } => data
                    .pay(&app_for(passenger(p)), passenger(p), &mut wallets)
                    .map(|_| ()),
            };

            prop_assert!(data.total_pending() >= Decimal::ZERO);
            prop_assert!(data.pool_balance() >= Decimal::ZERO);
        }

        for p in 0u8..4 {
            let mut credited = Decimal::ZERO;
            for flight in 0u8..3 {
                let key = surety_ledger::FlightKey::derive(&addr(SEED), &flight_code(flight), TS);
                credited += data
                    .policies(&key)
                    .iter()
                    .filter(|policy| policy.passenger == passenger(p) && policy.is_credited)
                    .map(|policy| policy.amount)
                    .sum::<Decimal>();
            }

            let accounted = data.get_pending_payment_amount(&passenger(p)) + wallets.balance(&passenger(p));
            prop_assert_eq!(credited, accounted);
        }
    }

    /// Property: mutations are rejected while paused
    #[test]
    fn prop_paused_rejects_mutations(op in op_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut config = Config::default();
            config.storage.enabled = false;
            let ledger = Ledger::open(config).await.unwrap();
            let owner = CallContext::direct(addr(OWNER));
            ledger.authorize_caller(owner, addr(APP)).await.unwrap();
            ledger.set_operating_status(owner, false).await.unwrap();

            let result = match op {
                Op::Fund(amount) => ledger.fund(app_for(addr(APP)), amount).await,
                Op::Buy { flight, passenger: p, amount } => ledger
                    .buy(app_for(passenger(p)), addr(SEED), &flight_code(flight), TS, passenger(p), amount, Decimal::ONE)
                    .await
                    .map(|_| ()),
                Op::Report { flight, status } => ledger
                    .process_flight_status(app_for(addr(APP)), addr(SEED), &flight_code(flight), TS, status)
                    .await
                    .map(|_| ()),
                Op::Pay { passenger: p } => ledger
                    .pay(app_for(passenger(p)), passenger(p))
                    .await
                    .map(|_| ()),
            };
            prop_assert!(matches!(result, Err(Error::NotOperational)));

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}
