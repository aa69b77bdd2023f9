//! Resource Store
//!
//! Persistent records for riders, docks, bicycles and loans. Stores own no
//! business rules; the engine drives every mutation through a [`UnitOfWork`]
//! which holds the store's concurrency control for its whole lifetime.
//!
//! Dropping a unit of work without calling [`UnitOfWork::commit`] discards
//! everything written through it.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, MemoryTables};
pub use postgres::PgResourceStore;

use async_trait::async_trait;

use super::error::LoanError;
use super::types::{Loan, LoanId};
use crate::core_types::{BicycleId, DockId, RiderId};
use crate::resources::{Bicycle, Dock, Rider};

/// One atomic unit of work per engine operation
///
/// Reads made through a unit of work lock what they return until commit or
/// drop, so two units of work touching the same rider, dock or bicycle are
/// serialized.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Resolve a rider by identity document, domestic documents first
    async fn find_rider(&mut self, identifier: &str) -> Result<Option<Rider>, LoanError>;

    async fn find_active_loan(&mut self, rider_id: RiderId) -> Result<Option<Loan>, LoanError>;

    async fn get_dock(&mut self, dock_id: DockId) -> Result<Option<Dock>, LoanError>;

    async fn get_bicycle(&mut self, bicycle_id: BicycleId) -> Result<Option<Bicycle>, LoanError>;

    /// Fails with `LoanAlreadyActive` if the rider already has an IN_PROGRESS loan
    async fn insert_loan(&mut self, loan: &Loan) -> Result<(), LoanError>;

    /// CAS: only an IN_PROGRESS loan may be overwritten
    async fn update_loan(&mut self, loan: &Loan) -> Result<(), LoanError>;

    async fn save_dock(&mut self, dock: &Dock) -> Result<(), LoanError>;

    async fn save_bicycle(&mut self, bicycle: &Bicycle) -> Result<(), LoanError>;

    async fn commit(self: Box<Self>) -> Result<(), LoanError>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get store name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LoanError>;

    // Read-only queries, no locks held past the call

    async fn find_rider(&self, identifier: &str) -> Result<Option<Rider>, LoanError>;

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>, LoanError>;

    async fn active_loan(&self, rider_id: RiderId) -> Result<Option<Loan>, LoanError>;

    /// All loans of a rider, most recent first
    async fn loan_history(&self, rider_id: RiderId) -> Result<Vec<Loan>, LoanError>;
}
