//! scb_rental - Bicycle-Share Loan Engine
//!
//! Tracks stations, docks, bicycles and riders, and opens and closes rental
//! loans while keeping them mutually consistent.
//!
//! # Modules
//!
//! - [`core_types`] - Id aliases (RiderId, DockId, etc.)
//! - [`resources`] - Riders, stations, docks and bicycles with their own state transitions
//! - [`fee`] - Initial and overtime fee schedule
//! - [`loan`] - Loan engine, resource stores, payment and notification collaborators
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`db`] - PostgreSQL connection pool

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod fee;
pub mod loan;
pub mod logging;
pub mod resources;

// Convenient re-exports at crate root
pub use core_types::{BicycleId, CardId, DockId, RiderId, StationId};
pub use fee::FeePolicy;
pub use loan::{ClosedLoan, LoanEngine, LoanError, LoanView};
