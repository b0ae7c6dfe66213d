//! Main ledger orchestration layer
//!
//! Ties together state, storage, metrics and the actor into an async API.
//!
//! # Example
//!
//! ```no_run
//! use surety_ledger::{CallContext, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> surety_ledger::Result<()> {
//!     let config = Config::default();
//!     let owner = CallContext::direct(config.owner);
//!     let ledger = Ledger::open(config).await?;
//!
//!     ledger.set_operating_status(owner, false).await?;
//!     assert!(!ledger.is_operational().await?);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, Command, CommandOutput, LedgerHandle},
    escrow::{FundsTransfer, Wallets},
    events::{audit_root, verify_chain, LedgerEvent},
    metrics::Metrics,
    operational::VoteOutcome,
    processing::StatusOutcome,
    state::SuretyData,
    storage::Storage,
    types::{Address, CallContext, FlightKey, FlightStatus},
    Config, Error, Result,
};
use rust_decimal::Decimal;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for async operations
    handle: LedgerHandle,

    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration; withdrawals go to in-memory wallets
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with_transfer(config, Box::new(Wallets::new())).await
    }

    /// Open ledger with a custom funds-transfer collaborator
    pub async fn open_with_transfer(
        config: Config,
        transfer: Box<dyn FundsTransfer + Send>,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;

        let (data, storage, history) = if config.storage.enabled {
            let storage = Storage::open(&config)?;
            let rows = storage.load_rows()?;
            let data = if rows.is_empty() {
                let mut data = SuretyData::new(&config)?;
                let events = data.take_events();
                storage.commit(&data.rows(), &events)?;
                data
            } else {
                let data = SuretyData::from_rows(rows)?;
                tracing::info!(
                    next_sequence = data.event_log().next_sequence(),
                    "Ledger restored from stored rows"
                );
                if data.owner() != config.owner {
                    tracing::warn!(
                        stored = %data.owner(),
                        configured = %config.owner,
                        "Configured owner ignored; owner is fixed at construction"
                    );
                }
                data
            };
            (data, Some(storage), Vec::new())
        } else {
            let mut data = SuretyData::new(&config)?;
            let history = data.take_events();
            (data, None, history)
        };

        let handle = spawn_ledger_actor(
            data,
            storage,
            history,
            transfer,
            metrics.clone(),
            config.mailbox_capacity,
        );

        Ok(Self {
            handle,
            metrics,
            config,
        })
    }

    /// Actor handle, for issuing raw commands
    pub fn handle(&self) -> &LedgerHandle {
        &self.handle
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }

    // Mutating calls

    /// Owner vote on the operational flag
    pub async fn set_operating_status(&self, ctx: CallContext, mode: bool) -> Result<VoteOutcome> {
        match self
            .handle
            .execute(ctx, Command::SetOperatingStatus { mode })
            .await?
        {
            CommandOutput::Vote(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    /// Add an authorized caller
    pub async fn authorize_caller(&self, ctx: CallContext, address: Address) -> Result<bool> {
        match self
            .handle
            .execute(ctx, Command::AuthorizeCaller { address })
            .await?
        {
            CommandOutput::Changed(changed) => Ok(changed),
            other => Err(unexpected(other)),
        }
    }

    /// Remove an authorized caller
    pub async fn deauthorize_caller(&self, ctx: CallContext, address: Address) -> Result<bool> {
        match self
            .handle
            .execute(ctx, Command::DeauthorizeCaller { address })
            .await?
        {
            CommandOutput::Changed(changed) => Ok(changed),
            other => Err(unexpected(other)),
        }
    }

    /// Register an airline
    pub async fn register_airline(&self, ctx: CallContext, name: &str, address: Address) -> Result<()> {
        self.handle
            .execute(
                ctx,
                Command::RegisterAirline {
                    name: name.to_string(),
                    address,
                },
            )
            .await
            .map(|_| ())
    }

    /// Set an airline's funding flag
    pub async fn fund_airline(&self, ctx: CallContext, address: Address) -> Result<()> {
        self.handle
            .execute(ctx, Command::FundAirline { address })
            .await
            .map(|_| ())
    }

    /// Register a flight
    pub async fn register_flight(
        &self,
        ctx: CallContext,
        airline: Address,
        flight_code: &str,
        origin: &str,
        destination: &str,
        timestamp: u64,
    ) -> Result<FlightKey> {
        let command = Command::RegisterFlight {
            airline,
            flight_code: flight_code.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            timestamp,
        };
        match self.handle.execute(ctx, command).await? {
            CommandOutput::Flight(key) => Ok(key),
            other => Err(unexpected(other)),
        }
    }

    /// Record a policy
    #[allow(clippy::too_many_arguments)]
    pub async fn buy(
        &self,
        ctx: CallContext,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
        passenger: Address,
        amount: Decimal,
        multiplier: Decimal,
    ) -> Result<FlightKey> {
        let command = Command::Buy {
            airline,
            flight_code: flight_code.to_string(),
            timestamp,
            passenger,
            amount,
            multiplier,
        };
        match self.handle.execute(ctx, command).await? {
            CommandOutput::Flight(key) => Ok(key),
            other => Err(unexpected(other)),
        }
    }

    /// Apply an oracle status report
    pub async fn process_flight_status(
        &self,
        ctx: CallContext,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
        status: FlightStatus,
    ) -> Result<StatusOutcome> {
        let command = Command::ProcessFlightStatus {
            airline,
            flight_code: flight_code.to_string(),
            timestamp,
            status,
        };
        match self.handle.execute(ctx, command).await? {
            CommandOutput::Status(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    /// Withdraw a passenger's pending balance
    pub async fn pay(&self, ctx: CallContext, passenger: Address) -> Result<Decimal> {
        match self.handle.execute(ctx, Command::Pay { passenger }).await? {
            CommandOutput::Paid(amount) => Ok(amount),
            other => Err(unexpected(other)),
        }
    }

    /// Contribute to the pool
    pub async fn fund(&self, ctx: CallContext, amount: Decimal) -> Result<()> {
        self.handle
            .execute(ctx, Command::Fund { amount })
            .await
            .map(|_| ())
    }

    /// Run several commands as one call; any failure rejects them all
    pub async fn batch(&self, ctx: CallContext, commands: Vec<Command>) -> Result<Vec<CommandOutput>> {
        match self.handle.execute(ctx, Command::Batch { commands }).await? {
            CommandOutput::Batch(outputs) => Ok(outputs),
            other => Err(unexpected(other)),
        }
    }

    /// Plain value transfer into the pool
    pub async fn receive(&self, ctx: CallContext, amount: Decimal) -> Result<()> {
        self.handle
            .execute(ctx, Command::Receive { amount })
            .await
            .map(|_| ())
    }

    // Reads

    /// Current operational flag
    pub async fn is_operational(&self) -> Result<bool> {
        self.handle.read(|d| d.is_operational()).await
    }

    /// Is `address` authorized
    pub async fn is_authorized(&self, address: Address) -> Result<bool> {
        self.handle.read(move |d| d.is_authorized(&address)).await
    }

    /// Contract owner
    pub async fn owner(&self) -> Result<Address> {
        self.handle.read(|d| d.owner()).await
    }

    /// Airline name
    pub async fn get_airline_name(&self, address: Address) -> Result<Option<String>> {
        self.handle
            .read(move |d| d.get_airline_name(&address).map(str::to_string))
            .await
    }

    /// Is `address` a registered airline
    pub async fn is_airline(&self, address: Address) -> Result<bool> {
        self.handle.read(move |d| d.is_airline(&address)).await
    }

    /// Is `address` a funded airline
    pub async fn is_funded_airline(&self, address: Address) -> Result<bool> {
        self.handle.read(move |d| d.is_funded_airline(&address)).await
    }

    /// Registered airlines in registration order
    pub async fn get_registered_airlines(&self) -> Result<Vec<Address>> {
        self.handle
            .read(|d| d.get_registered_airlines().to_vec())
            .await
    }

    /// Stored status for the triple
    pub async fn get_flight_status_code(
        &self,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
    ) -> Result<FlightStatus> {
        let code = flight_code.to_string();
        self.handle
            .read(move |d| d.get_flight_status_code(&airline, &code, timestamp))
            .await
    }

    /// Is the triple a registered flight
    pub async fn is_flight(&self, airline: Address, flight_code: &str, timestamp: u64) -> Result<bool> {
        let code = flight_code.to_string();
        self.handle
            .read(move |d| d.is_flight(&airline, &code, timestamp))
            .await
    }

    /// Has a final status been recorded for the triple
    pub async fn is_landed_flight(&self, airline: Address, flight_code: &str, timestamp: u64) -> Result<bool> {
        let code = flight_code.to_string();
        self.handle
            .read(move |d| d.is_landed_flight(&airline, &code, timestamp))
            .await
    }

    /// Does `passenger` hold a policy on the triple
    pub async fn is_insured(
        &self,
        passenger: Address,
        airline: Address,
        flight_code: &str,
        timestamp: u64,
    ) -> Result<bool> {
        let code = flight_code.to_string();
        self.handle
            .read(move |d| d.is_insured(&passenger, &airline, &code, timestamp))
            .await
    }

    /// Amount owed to `passenger`
    pub async fn get_pending_payment_amount(&self, passenger: Address) -> Result<Decimal> {
        self.handle
            .read(move |d| d.get_pending_payment_amount(&passenger))
            .await
    }

    /// Value held by the ledger
    pub async fn pool_balance(&self) -> Result<Decimal> {
        self.handle.read(|d| d.pool_balance()).await
    }

    // Audit

    /// Audit events with `from <= sequence < to`
    pub async fn events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        self.handle.get_events(from, to).await
    }

    /// Merkle root over the audit events in a range
    pub async fn audit_root(&self, from: u64, to: u64) -> Result<[u8; 32]> {
        Ok(audit_root(&self.events(from, to).await?))
    }

    /// Check the full audit log hash chain
    pub async fn verify_audit_log(&self) -> Result<bool> {
        let events = self.events(0, u64::MAX).await?;
        verify_chain([0u8; 32], &events)
    }
}

fn unexpected(output: CommandOutput) -> Error {
    Error::Other(format!("Unexpected command output: {:?}", output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        (config, temp_dir)
    }

    fn owner() -> CallContext {
        CallContext::direct(Address::from_low_u64(1))
    }

    #[tokio::test]
    async fn test_ledger_open() {
        let (config, _temp) = test_config();
        let ledger = Ledger::open(config).await.unwrap();

        assert!(ledger.is_operational().await.unwrap());
        assert_eq!(ledger.get_registered_airlines().await.unwrap().len(), 1);
        assert!(ledger.verify_audit_log().await.unwrap());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ledger_restores_after_reopen() {
        let (config, _temp) = test_config();
        let app = Address::from_low_u64(2);

        let ledger = Ledger::open(config.clone()).await.unwrap();
        ledger.authorize_caller(owner(), app).await.unwrap();
        ledger
            .register_airline(owner(), "Beta Air", Address::from_low_u64(0xb2))
            .await
            .unwrap();
        ledger.shutdown().await.unwrap();
        // Let the actor release the database lock
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let reopened = Ledger::open(config).await.unwrap();
        assert!(reopened.is_authorized(app).await.unwrap());
        assert_eq!(
            reopened.get_airline_name(Address::from_low_u64(0xb2)).await.unwrap(),
            Some("Beta Air".to_string())
        );
        let airlines = reopened.get_registered_airlines().await.unwrap();
        assert_eq!(airlines.len(), 2);
        assert_eq!(airlines[1], Address::from_low_u64(0xb2));
        let events = reopened.events(0, u64::MAX).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(reopened.verify_audit_log().await.unwrap());

        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_ledger() {
        let (mut config, _temp) = test_config();
        config.storage.enabled = false;

        let ledger = Ledger::open(config).await.unwrap();
        let root = ledger.audit_root(0, u64::MAX).await.unwrap();
        assert_ne!(root, [0u8; 32]);

        ledger.shutdown().await.unwrap();
    }
}
