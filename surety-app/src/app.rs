//! The authorized operator in front of the ledger
//!
//! Every ledger call goes out with the operator as immediate caller and the
//! end user as originating identity. The operator must be authorized in the
//! ledger before any mutating call succeeds.
//!
//! Calls that both record something and move value (`fund_airline`, `buy`)
//! go to the ledger as one batch, so a failed deposit leaves no record.

use crate::consensus::{AdmissionOutcome, AirlineAdmission};
use crate::limits::LimitChecker;
use crate::{AppConfig, Error, Result};
use rust_decimal::Decimal;
use surety_ledger::{
    Address, CallContext, Command, CommandOutput, FlightKey, FlightStatus, Ledger, StatusOutcome,
};
use tokio::sync::Mutex;

/// Operator front end
#[derive(Debug)]
pub struct SuretyApp {
    ledger: Ledger,
    config: AppConfig,
    operator: Address,
    limits: LimitChecker,
    admission: Mutex<AirlineAdmission>,
}

impl SuretyApp {
    /// Wrap `ledger`, calling it as `operator`
    pub fn new(ledger: Ledger, config: AppConfig, operator: Address) -> Result<Self> {
        config.validate()?;
        let limits = LimitChecker::new(&config);
        let admission =
            AirlineAdmission::new(config.consensus_free_airlines, config.consensus_ratio);

        Ok(Self {
            ledger,
            config,
            operator,
            limits,
            admission: Mutex::new(admission),
        })
    }

    /// Underlying ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Operator configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn relay(&self, ctx: &CallContext) -> CallContext {
        CallContext::relayed(self.operator, ctx.origin)
    }

    async fn require_funded_airline(&self, airline: Address) -> Result<()> {
        if self.ledger.is_funded_airline(airline).await? {
            Ok(())
        } else {
            Err(Error::NotFundedAirline(airline))
        }
    }

    /// Request admission of `address`, on behalf of the airline in `ctx.origin`
    pub async fn register_airline(
        &self,
        ctx: CallContext,
        name: &str,
        address: Address,
    ) -> Result<AdmissionOutcome> {
        self.require_funded_airline(ctx.origin).await?;
        if self.ledger.is_airline(address).await? {
            return Err(surety_ledger::Error::AlreadyRegistered(address).into());
        }

        // Held across the ledger call so concurrent votes are counted once
        let mut admission = self.admission.lock().await;
        let registered = self.ledger.get_registered_airlines().await?.len();
        let required = admission.required_votes(registered);

        let votes = if required == 0 {
            0
        } else {
            admission.tally(&address, &ctx.origin)?
        };

        if votes < required {
            admission.record(address, ctx.origin);
            tracing::info!(candidate = %address, voter = %ctx.origin, votes, required, "Admission vote recorded");
            return Ok(AdmissionOutcome::Pending { votes, required });
        }

        self.ledger
            .register_airline(self.relay(&ctx), name, address)
            .await?;
        admission.close(&address);

        tracing::info!(airline = %address, votes, "Airline admitted");
        Ok(AdmissionOutcome::Registered)
    }

    /// Fund `airline` with `amount`
    pub async fn fund_airline(&self, ctx: CallContext, airline: Address, amount: Decimal) -> Result<()> {
        self.limits.check_airline_funding(amount)?;

        let commands = vec![Command::FundAirline { address: airline }, Command::Fund { amount }];
        self.ledger.batch(self.relay(&ctx), commands).await?;

        tracing::info!(airline = %airline, amount = %amount, "Airline funding accepted");
        Ok(())
    }

    /// Register a flight operated by `airline`
    pub async fn register_flight(
        &self,
        ctx: CallContext,
        airline: Address,
        flight_code: &str,
        origin: &str,
        destination: &str,
        timestamp: u64,
    ) -> Result<FlightKey> {
        Ok(self
            .ledger
            .register_flight(self.relay(&ctx), airline, flight_code, origin, destination, timestamp)
            .await?)
    }

    /// Insure `ctx.origin` on a flight for `amount`
    pub async fn buy(
        &self,
        ctx: CallContext,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
        amount: Decimal,
    ) -> Result<FlightKey> {
        self.limits.check_premium(amount)?;
        self.require_funded_airline(airline).await?;

        let commands = vec![
            Command::Buy {
                airline,
                flight_code: flight_code.to_string(),
                timestamp,
                passenger: ctx.origin,
                amount,
                multiplier: self.config.payout_multiplier,
            },
            Command::Fund { amount },
        ];
        match self.ledger.batch(self.relay(&ctx), commands).await?.first() {
            Some(CommandOutput::Flight(key)) => Ok(*key),
            other => {
                let message = format!("Unexpected buy output: {:?}", other);
                Err(surety_ledger::Error::Other(message).into())
            }
        }
    }

    /// Forward an oracle status report
    pub async fn process_flight_status(
        &self,
        ctx: CallContext,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
        status: FlightStatus,
    ) -> Result<StatusOutcome> {
        Ok(self
            .ledger
            .process_flight_status(self.relay(&ctx), airline, flight_code, timestamp, status)
            .await?)
    }

    /// Withdraw the caller's pending balance
    pub async fn withdraw(&self, ctx: CallContext) -> Result<Decimal> {
        Ok(self.ledger.pay(self.relay(&ctx), ctx.origin).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surety_ledger::{Config, FundingGuard};

    const OWNER: u64 = 1;
    const OPERATOR: u64 = 2;
    const SEED: u64 = 0xa1;
    const TS: u64 = 1_700_000_000;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    async fn test_app() -> SuretyApp {
        let mut config = Config::default();
        config.storage.enabled = false;
        config.funding_guard = FundingGuard::RequireUnfunded;

        let ledger = Ledger::open(config).await.unwrap();
        ledger
            .authorize_caller(CallContext::direct(addr(OWNER)), addr(OPERATOR))
            .await
            .unwrap();
        SuretyApp::new(ledger, AppConfig::default(), addr(OPERATOR)).unwrap()
    }

    fn from(n: u64) -> CallContext {
        CallContext::direct(addr(n))
    }

    #[tokio::test]
    async fn test_fund_airline_minimum() {
        let app = test_app().await;

        let result = app.fund_airline(from(SEED), addr(SEED), Decimal::from(5)).await;
        assert!(matches!(result, Err(Error::InsufficientFunding { .. })));

        app.fund_airline(from(SEED), addr(SEED), Decimal::from(10))
            .await
            .unwrap();
        assert!(app.ledger().is_funded_airline(addr(SEED)).await.unwrap());
        assert_eq!(app.ledger().pool_balance().await.unwrap(), Decimal::from(10));
    }

    #[tokio::test]
    async fn test_unfunded_airline_cannot_sponsor() {
        let app = test_app().await;
        let result = app.register_airline(from(SEED), "Beta Air", addr(0xb2)).await;
        assert!(matches!(result, Err(Error::NotFundedAirline(_))));
    }

    #[tokio::test]
    async fn test_buy_limits() {
        let app = test_app().await;
        let passenger = from(100);

        let result = app.buy(passenger, addr(SEED), "ND1309", TS, Decimal::ONE).await;
        assert!(matches!(result, Err(Error::NotFundedAirline(_))));

        app.fund_airline(from(SEED), addr(SEED), Decimal::from(10))
            .await
            .unwrap();

        let result = app.buy(passenger, addr(SEED), "ND1309", TS, Decimal::from(2)).await;
        assert!(matches!(result, Err(Error::PremiumOutOfRange { .. })));

        app.buy(passenger, addr(SEED), "ND1309", TS, Decimal::ONE)
            .await
            .unwrap();
        assert!(app
            .ledger()
            .is_insured(addr(100), addr(SEED), "ND1309", TS)
            .await
            .unwrap());
        assert_eq!(app.ledger().pool_balance().await.unwrap(), Decimal::from(11));
    }

    #[tokio::test]
    async fn test_buy_is_atomic_with_deposit() {
        let app = test_app().await;
        app.fund_airline(from(SEED), addr(SEED), Decimal::from(10))
            .await
            .unwrap();
        // Fill the pool so the premium deposit cannot fit
        app.ledger()
            .fund(app.relay(&from(OWNER)), Decimal::MAX - Decimal::from(10))
            .await
            .unwrap();

        let result = app.buy(from(100), addr(SEED), "ND1309", TS, Decimal::ONE).await;
        assert!(matches!(result, Err(Error::Ledger(surety_ledger::Error::Overflow(_)))));
        assert!(!app
            .ledger()
            .is_insured(addr(100), addr(SEED), "ND1309", TS)
            .await
            .unwrap());
        assert_eq!(app.ledger().pool_balance().await.unwrap(), Decimal::MAX);
    }

    #[tokio::test]
    async fn test_fund_airline_is_atomic_with_deposit() {
        let app = test_app().await;
        app.ledger()
            .fund(app.relay(&from(OWNER)), Decimal::MAX)
            .await
            .unwrap();

        let result = app.fund_airline(from(SEED), addr(SEED), Decimal::from(10)).await;
        assert!(matches!(result, Err(Error::Ledger(surety_ledger::Error::Overflow(_)))));
        assert!(!app.ledger().is_funded_airline(addr(SEED)).await.unwrap());
        assert_eq!(app.ledger().pool_balance().await.unwrap(), Decimal::MAX);
    }
}
