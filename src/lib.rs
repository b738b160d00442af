//! Batch tracking for sample-processing labs.
//!
//! Assemblies are split into child batches with derived identifiers
//! ([`assembly`]), jobs walk them through chains of state machines
//! ([`state_machine`]), and the [`orchestrator`] commits the results through
//! a versioned [`repository`].

pub mod assembly;
pub mod carrier;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod parameter;
pub mod repository;
pub mod state_machine;
pub mod ui;

pub use error::KcbError;
