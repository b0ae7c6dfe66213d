//! FlightSurety operator
//!
//! The authorized caller in front of the surety ledger. Adds the admission
//! rules the ledger leaves to its callers: premium caps, the airline funding
//! minimum and multi-party airline admission.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod consensus;
pub mod error;
pub mod limits;

pub use app::SuretyApp;
pub use config::AppConfig;
pub use consensus::AdmissionOutcome;
pub use error::{Error, Result};
pub use limits::LimitChecker;
