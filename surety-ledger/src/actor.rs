//! Actor-based concurrency for the ledger
//!
//! The single-writer pattern using a Tokio actor: one task owns the
//! `SuretyData`, so every call is serialized and sees the effects of the
//! calls before it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   SuretyData ─► touched rows + events ─► commit()     │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Each command runs under a savepoint. A rejected command or a failed commit
//! rolls the state back to it, so only successful calls leave a trace.

use crate::escrow::FundsTransfer;
use crate::events::LedgerEvent;
use crate::journal::Savepoint;
use crate::metrics::Metrics;
use crate::operational::VoteOutcome;
use crate::processing::StatusOutcome;
use crate::state::SuretyData;
use crate::storage::Storage;
use crate::types::{Address, CallContext, FlightKey, FlightStatus};
use crate::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Mutating ledger call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Owner vote on the operational flag
    SetOperatingStatus { mode: bool },
    /// Add an authorized caller
    AuthorizeCaller { address: Address },
    /// Remove an authorized caller
    DeauthorizeCaller { address: Address },
    /// Register an airline
    RegisterAirline { name: String, address: Address },
    /// Set an airline's funding flag
    FundAirline { address: Address },
    /// Register a flight
    RegisterFlight {
        airline: Address,
        flight_code: String,
        origin: String,
        destination: String,
        timestamp: u64,
    },
    /// Record a policy
    Buy {
        airline: Address,
        flight_code: String,
        timestamp: u64,
        passenger: Address,
        amount: Decimal,
        multiplier: Decimal,
    },
    /// Apply an oracle status report
    ProcessFlightStatus {
        airline: Address,
        flight_code: String,
        timestamp: u64,
        status: FlightStatus,
    },
    /// Withdraw a passenger's pending balance
    Pay { passenger: Address },
    /// Contribute to the pool
    Fund { amount: Decimal },
    /// Plain value transfer
    Receive { amount: Decimal },
    /// Run commands in order as one call; any failure undoes all of them
    Batch { commands: Vec<Command> },
}

impl Command {
    /// Operation name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetOperatingStatus { .. } => "set_operating_status",
            Command::AuthorizeCaller { .. } => "authorize_caller",
            Command::DeauthorizeCaller { .. } => "deauthorize_caller",
            Command::RegisterAirline { .. } => "register_airline",
            Command::FundAirline { .. } => "fund_airline",
            Command::RegisterFlight { .. } => "register_flight",
            Command::Buy { .. } => "buy",
            Command::ProcessFlightStatus { .. } => "process_flight_status",
            Command::Pay { .. } => "pay",
            Command::Fund { .. } => "fund",
            Command::Receive { .. } => "receive",
            Command::Batch { .. } => "batch",
        }
    }

    /// Run against `data`
    pub fn apply(
        self,
        data: &mut SuretyData,
        ctx: &CallContext,
        transfer: &mut dyn FundsTransfer,
    ) -> Result<CommandOutput> {
        let output = match self {
            Command::SetOperatingStatus { mode } => {
                CommandOutput::Vote(data.set_operating_status(ctx, mode)?)
            }
            Command::AuthorizeCaller { address } => {
                CommandOutput::Changed(data.authorize_caller(ctx, address)?)
            }
            Command::DeauthorizeCaller { address } => {
                CommandOutput::Changed(data.deauthorize_caller(ctx, address)?)
            }
            Command::RegisterAirline { name, address } => {
                data.register_airline(ctx, &name, address)?;
                CommandOutput::Done
            }
            Command::FundAirline { address } => {
                data.fund_airline(ctx, address)?;
                CommandOutput::Done
            }
            Command::RegisterFlight {
                airline,
                flight_code,
                origin,
                destination,
                timestamp,
            } => CommandOutput::Flight(data.register_flight(
                ctx,
                airline,
                &flight_code,
                &origin,
                &destination,
                timestamp,
            )?),
            Command::Buy {
                airline,
                flight_code,
                timestamp,
                passenger,
                amount,
                multiplier,
            } => CommandOutput::Flight(data.buy(
                ctx,
                airline,
                &flight_code,
                timestamp,
                passenger,
                amount,
                multiplier,
            )?),
            Command::ProcessFlightStatus {
                airline,
                flight_code,
                timestamp,
                status,
            } => CommandOutput::Status(data.process_flight_status(
                ctx,
                airline,
                &flight_code,
                timestamp,
                status,
            )?),
            Command::Pay { passenger } => CommandOutput::Paid(data.pay(ctx, passenger, transfer)?),
            Command::Fund { amount } => {
                data.fund(ctx, amount)?;
                CommandOutput::Done
            }
            Command::Receive { amount } => {
                data.receive(ctx, amount)?;
                CommandOutput::Done
            }
            Command::Batch { commands } => CommandOutput::Batch(data.atomically(|data| {
                let mut outputs = Vec::with_capacity(commands.len());
                for command in commands {
                    outputs.push(command.apply(data, ctx, &mut *transfer)?);
                }
                Ok(outputs)
            })?),
        };
        Ok(output)
    }
}

/// Value returned by a committed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutput {
    /// No return value
    Done,
    /// Operating-status vote result
    Vote(VoteOutcome),
    /// Whether an idempotent set operation changed anything
    Changed(bool),
    /// Key of the flight touched
    Flight(FlightKey),
    /// Status-report result
    Status(StatusOutcome),
    /// Amount withdrawn
    Paid(Decimal),
    /// Outputs of a batch, in order
    Batch(Vec<CommandOutput>),
}

type ReadFn = Box<dyn FnOnce(&SuretyData) + Send>;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Run a mutating command
    Execute {
        ctx: CallContext,
        command: Command,
        response: oneshot::Sender<Result<CommandOutput>>,
    },

    /// Run a read against current state
    Read { read: ReadFn },

    /// Audit events with `from <= sequence < to`
    GetEvents {
        from: u64,
        to: u64,
        response: oneshot::Sender<Result<Vec<LedgerEvent>>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the ledger state
pub struct LedgerActor {
    data: SuretyData,

    /// `None` when persistence is disabled
    storage: Option<Storage>,

    /// In-memory audit history when persistence is disabled
    history: Vec<LedgerEvent>,

    transfer: Box<dyn FundsTransfer + Send>,

    metrics: Metrics,

    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        data: SuretyData,
        storage: Option<Storage>,
        history: Vec<LedgerEvent>,
        transfer: Box<dyn FundsTransfer + Send>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            data,
            storage,
            history,
            transfer,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Execute {
                    ctx,
                    command,
                    response,
                } => {
                    let result = self.execute(ctx, command);
                    let _ = response.send(result);
                }
                LedgerMessage::Read { read } => read(&self.data),
                LedgerMessage::GetEvents { from, to, response } => {
                    let _ = response.send(self.events(from, to));
                }
                LedgerMessage::Shutdown => break,
            }
        }

        if let Some(storage) = self.storage.take() {
            if let Err(e) = storage.close() {
                tracing::error!("Error closing storage: {}", e);
            }
        }
        tracing::info!("Ledger actor stopped");
    }

    /// Run one command and persist its effects
    fn execute(&mut self, ctx: CallContext, command: Command) -> Result<CommandOutput> {
        let started = Instant::now();
        let operation = command.name();
        let savepoint = self.data.savepoint();

        let result = match command.apply(&mut self.data, &ctx, self.transfer.as_mut()) {
            Ok(output) => match self.commit(&savepoint) {
                Ok(events) => {
                    self.data.release(savepoint);
                    self.metrics.record_command(operation, events);
                    Ok(output)
                }
                Err(e) => {
                    tracing::error!(operation, error = %e, "Commit failed, rolling back");
                    self.data.rollback_to(savepoint);
                    Err(e)
                }
            },
            Err(e) => {
                self.data.rollback_to(savepoint);
                tracing::warn!(operation, caller = %ctx.caller, error = %e, "Command rejected");
                Err(e)
            }
        };

        match &result {
            Ok(output) => self.metrics.record_credits(credited(output)),
            Err(e) => self.metrics.record_rejection(e.label()),
        }

        self.metrics
            .set_pool_balance(self.data.pool_balance().to_f64().unwrap_or(0.0));
        self.metrics
            .record_commit_duration(started.elapsed().as_secs_f64());

        result
    }

    /// Persist the rows touched since `savepoint` and the staged events;
    /// returns the number of events
    fn commit(&mut self, savepoint: &Savepoint) -> Result<usize> {
        let events = self.data.take_events();
        match &self.storage {
            Some(storage) => storage.commit(&self.data.changed_rows(savepoint), &events)?,
            None => self.history.extend_from_slice(&events),
        }
        Ok(events.len())
    }

    fn events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        match &self.storage {
            Some(storage) => storage.get_events(from, to),
            None => Ok(self
                .history
                .iter()
                .filter(|e| e.sequence >= from && e.sequence < to)
                .cloned()
                .collect()),
        }
    }
}

fn credited(output: &CommandOutput) -> usize {
    match output {
        CommandOutput::Status(outcome) => outcome.credited,
        CommandOutput::Batch(outputs) => outputs.iter().map(credited).sum(),
        _ => 0,
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn send(&self, msg: LedgerMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }

    /// Execute a command
    pub async fn execute(&self, ctx: CallContext, command: Command) -> Result<CommandOutput> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::Execute {
            ctx,
            command,
            response: tx,
        })
        .await?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Evaluate `f` against current state
    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&SuretyData) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::Read {
            read: Box::new(move |data| {
                let _ = tx.send(f(data));
            }),
        })
        .await?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Audit events in a sequence range
    pub async fn get_events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::GetEvents {
            from,
            to,
            response: tx,
        })
        .await?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.send(LedgerMessage::Shutdown).await
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    data: SuretyData,
    storage: Option<Storage>,
    history: Vec<LedgerEvent>,
    transfer: Box<dyn FundsTransfer + Send>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(data, storage, history, transfer, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
