//! Stations and docks
//!
//! A station owns an ordered list of dock ids; each dock points back at its
//! station through `station_id`. A dock holds a bicycle exactly when it is
//! OCCUPIED.

use std::fmt;

use crate::core_types::{BicycleId, DockId, StationId};
use crate::loan::LoanError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub station_id: StationId,
    pub location: String,
    pub description: Option<String>,
    /// Maximum number of docks the station can hold
    pub capacity: u32,
    pub dock_ids: Vec<DockId>,
}

impl Station {
    pub fn new(station_id: StationId, location: impl Into<String>, capacity: u32) -> Self {
        Self {
            station_id,
            location: location.into(),
            description: None,
            capacity,
            dock_ids: Vec::new(),
        }
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.dock_ids.len() < self.capacity as usize
    }

    /// Register a dock with this station, refusing once capacity is reached
    pub fn attach_dock(&mut self, dock_id: DockId) -> Result<(), LoanError> {
        if !self.has_room() {
            return Err(LoanError::StationFull(self.station_id));
        }
        self.dock_ids.push(dock_id);
        Ok(())
    }
}

/// Dock status, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum DockStatus {
    Free = 0,
    Occupied = 1,
    Maintenance = 2,
}

impl DockStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(DockStatus::Free),
            1 => Some(DockStatus::Occupied),
            2 => Some(DockStatus::Maintenance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DockStatus::Free => "FREE",
            DockStatus::Occupied => "OCCUPIED",
            DockStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for DockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dock {
    pub dock_id: DockId,
    /// Number painted on the dock, unique within its station
    pub number: i32,
    pub station_id: StationId,
    pub status: DockStatus,
    pub bicycle_id: Option<BicycleId>,
}

impl Dock {
    pub fn free(dock_id: DockId, number: i32, station_id: StationId) -> Self {
        Self {
            dock_id,
            number,
            station_id,
            status: DockStatus::Free,
            bicycle_id: None,
        }
    }

    pub fn occupied(
        dock_id: DockId,
        number: i32,
        station_id: StationId,
        bicycle_id: BicycleId,
    ) -> Self {
        Self {
            dock_id,
            number,
            station_id,
            status: DockStatus::Occupied,
            bicycle_id: Some(bicycle_id),
        }
    }

    /// `bicycle present <=> OCCUPIED`
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.bicycle_id.is_some() == (self.status == DockStatus::Occupied)
    }

    /// The bicycle this dock would hand out, without touching the dock
    pub fn parked_bicycle(&self) -> Result<BicycleId, LoanError> {
        if self.status != DockStatus::Occupied {
            return Err(LoanError::DockEmpty(self.dock_id));
        }
        self.bicycle_id
            .ok_or(LoanError::BicycleMissing(format!("dock {} has no bicycle", self.dock_id)))
    }

    /// OCCUPIED -> FREE, handing out the parked bicycle
    pub fn release(&mut self) -> Result<BicycleId, LoanError> {
        let bicycle_id = self.parked_bicycle()?;
        self.bicycle_id = None;
        self.status = DockStatus::Free;
        Ok(bicycle_id)
    }

    /// FREE -> OCCUPIED
    pub fn park(&mut self, bicycle_id: BicycleId) -> Result<(), LoanError> {
        if self.status != DockStatus::Free {
            return Err(LoanError::DockOccupied(self.dock_id));
        }
        self.bicycle_id = Some(bicycle_id);
        self.status = DockStatus::Occupied;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dock_status_ids() {
        for status in [DockStatus::Free, DockStatus::Occupied, DockStatus::Maintenance] {
            assert_eq!(DockStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(DockStatus::from_id(9), None);
        assert_eq!(DockStatus::Occupied.to_string(), "OCCUPIED");
    }

    #[test]
    fn test_station_capacity() {
        let mut station = Station::new(1, "Praca XV", 2);
        station.attach_dock(10).unwrap();
        station.attach_dock(11).unwrap();
        assert!(!station.has_room());

        let err = station.attach_dock(12).unwrap_err();
        assert!(matches!(err, LoanError::StationFull(1)));
        assert_eq!(station.dock_ids, vec![10, 11]);
    }

    #[test]
    fn test_release_then_park() {
        let mut dock = Dock::occupied(10, 1, 1, 100);
        assert_eq!(dock.release().unwrap(), 100);
        assert_eq!(dock.status, DockStatus::Free);
        assert!(dock.bicycle_id.is_none());
        assert!(dock.is_consistent());

        dock.park(200).unwrap();
        assert_eq!(dock.status, DockStatus::Occupied);
        assert_eq!(dock.bicycle_id, Some(200));
        assert!(dock.is_consistent());
    }

    #[test]
    fn test_release_free_dock_is_empty() {
        let mut dock = Dock::free(10, 1, 1);
        assert!(matches!(dock.release(), Err(LoanError::DockEmpty(10))));
        assert_eq!(dock, Dock::free(10, 1, 1));
    }

    #[test]
    fn test_release_maintenance_dock_is_empty() {
        let mut dock = Dock::free(10, 1, 1);
        dock.status = DockStatus::Maintenance;
        assert!(matches!(dock.release(), Err(LoanError::DockEmpty(10))));
    }

    #[test]
    fn test_release_occupied_without_bicycle() {
        let mut dock = Dock::occupied(10, 1, 1, 100);
        dock.bicycle_id = None;
        assert!(!dock.is_consistent());
        assert!(matches!(dock.release(), Err(LoanError::BicycleMissing(_))));
        assert_eq!(dock.status, DockStatus::Occupied);
    }

    #[test]
    fn test_park_into_occupied_dock() {
        let mut dock = Dock::occupied(10, 1, 1, 100);
        assert!(matches!(dock.park(200), Err(LoanError::DockOccupied(10))));
        assert_eq!(dock.bicycle_id, Some(100));
    }

    #[test]
    fn test_park_into_maintenance_dock() {
        let mut dock = Dock::free(10, 1, 1);
        dock.status = DockStatus::Maintenance;
        assert!(matches!(dock.park(200), Err(LoanError::DockOccupied(10))));
    }
}
