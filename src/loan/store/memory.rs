//! In-memory Resource Store
//!
//! All tables sit behind one `tokio::sync::Mutex`. A unit of work takes the
//! lock when it begins and keeps it until commit or drop, so units of work run
//! one at a time. Writes go to a staged copy that replaces the live tables only
//! on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{ResourceStore, UnitOfWork};
use crate::core_types::{BicycleId, DockId, RiderId, StationId};
use crate::loan::error::LoanError;
use crate::loan::types::{Loan, LoanId};
use crate::resources::{Bicycle, Dock, DocumentKind, Rider, Station};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTables {
    pub stations: BTreeMap<StationId, Station>,
    pub docks: BTreeMap<DockId, Dock>,
    pub bicycles: BTreeMap<BicycleId, Bicycle>,
    pub riders: BTreeMap<RiderId, Rider>,
    pub loans: BTreeMap<LoanId, Loan>,
}

impl MemoryTables {
    fn find_rider(&self, identifier: &str) -> Option<Rider> {
        [DocumentKind::Domestic, DocumentKind::Foreign]
            .into_iter()
            .find_map(|kind| {
                self.riders
                    .values()
                    .find(|r| r.document.kind == kind && r.is_identified_by(identifier))
            })
            .cloned()
    }

    fn active_loan(&self, rider_id: RiderId) -> Option<Loan> {
        self.loans
            .values()
            .find(|l| l.rider_id == rider_id && l.is_active())
            .cloned()
    }
}

/// Resource store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed tables
    pub async fn snapshot(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }

    pub async fn add_station(&self, station: Station) -> Result<(), LoanError> {
        if station.dock_ids.len() > station.capacity as usize {
            return Err(LoanError::StationFull(station.station_id));
        }
        self.tables
            .lock()
            .await
            .stations
            .insert(station.station_id, station);
        Ok(())
    }

    /// Register a dock and attach it to its station
    pub async fn add_dock(&self, dock: Dock) -> Result<(), LoanError> {
        if !dock.is_consistent() {
            return Err(LoanError::InvalidStateTransition(format!(
                "dock {} is {} with bicycle {:?}",
                dock.dock_id, dock.status, dock.bicycle_id
            )));
        }

        let mut tables = self.tables.lock().await;
        let station = tables.stations.get_mut(&dock.station_id).ok_or_else(|| {
            LoanError::SystemError(format!("station {} does not exist", dock.station_id))
        })?;
        if !station.dock_ids.contains(&dock.dock_id) {
            station.attach_dock(dock.dock_id)?;
        }
        tables.docks.insert(dock.dock_id, dock);
        Ok(())
    }

    pub async fn add_bicycle(&self, bicycle: Bicycle) {
        self.tables
            .lock()
            .await
            .bicycles
            .insert(bicycle.bicycle_id, bicycle);
    }

    pub async fn add_rider(&self, rider: Rider) {
        self.tables.lock().await.riders.insert(rider.rider_id, rider);
    }
}

struct MemoryUnitOfWork {
    live: OwnedMutexGuard<MemoryTables>,
    staged: MemoryTables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_rider(&mut self, identifier: &str) -> Result<Option<Rider>, LoanError> {
        Ok(self.staged.find_rider(identifier))
    }

    async fn find_active_loan(&mut self, rider_id: RiderId) -> Result<Option<Loan>, LoanError> {
        Ok(self.staged.active_loan(rider_id))
    }

    async fn get_dock(&mut self, dock_id: DockId) -> Result<Option<Dock>, LoanError> {
        Ok(self.staged.docks.get(&dock_id).cloned())
    }

    async fn get_bicycle(&mut self, bicycle_id: BicycleId) -> Result<Option<Bicycle>, LoanError> {
        Ok(self.staged.bicycles.get(&bicycle_id).cloned())
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<(), LoanError> {
        if self.staged.active_loan(loan.rider_id).is_some() {
            return Err(LoanError::LoanAlreadyActive(loan.rider_id));
        }
        self.staged.loans.insert(loan.loan_id, loan.clone());
        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<(), LoanError> {
        let current = self
            .staged
            .loans
            .get_mut(&loan.loan_id)
            .ok_or_else(|| LoanError::LoanNotFound(loan.loan_id.to_string()))?;
        if !current.is_active() {
            return Err(LoanError::InvalidStateTransition(format!(
                "loan {} is already {}",
                loan.loan_id, current.state
            )));
        }
        *current = loan.clone();
        Ok(())
    }

    async fn save_dock(&mut self, dock: &Dock) -> Result<(), LoanError> {
        if !dock.is_consistent() {
            return Err(LoanError::InvalidStateTransition(format!(
                "dock {} is {} with bicycle {:?}",
                dock.dock_id, dock.status, dock.bicycle_id
            )));
        }
        let current = self
            .staged
            .docks
            .get_mut(&dock.dock_id)
            .ok_or(LoanError::DockNotFound(dock.dock_id))?;
        *current = dock.clone();
        Ok(())
    }

    async fn save_bicycle(&mut self, bicycle: &Bicycle) -> Result<(), LoanError> {
        let current = self
            .staged
            .bicycles
            .get_mut(&bicycle.bicycle_id)
            .ok_or_else(|| LoanError::BicycleMissing(format!("bicycle {}", bicycle.bicycle_id)))?;
        *current = bicycle.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LoanError> {
        let MemoryUnitOfWork { mut live, staged } = *self;
        *live = staged;
        debug!("memory unit of work committed");
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LoanError> {
        let live = self.tables.clone().lock_owned().await;
        let staged = live.clone();
        Ok(Box::new(MemoryUnitOfWork { live, staged }))
    }

    async fn find_rider(&self, identifier: &str) -> Result<Option<Rider>, LoanError> {
        Ok(self.tables.lock().await.find_rider(identifier))
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>, LoanError> {
        Ok(self.tables.lock().await.loans.get(&loan_id).cloned())
    }

    async fn active_loan(&self, rider_id: RiderId) -> Result<Option<Loan>, LoanError> {
        Ok(self.tables.lock().await.active_loan(rider_id))
    }

    async fn loan_history(&self, rider_id: RiderId) -> Result<Vec<Loan>, LoanError> {
        let tables = self.tables.lock().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| l.rider_id == rider_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.loan_id.cmp(&a.loan_id))
        });
        Ok(loans)
    }
}
