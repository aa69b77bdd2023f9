use std::fmt;

use crate::core_types::BicycleId;
use crate::loan::LoanError;

/// Bicycle status, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum BicycleStatus {
    Available = 0,
    InUse = 1,
    Maintenance = 2,
}

impl BicycleStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(BicycleStatus::Available),
            1 => Some(BicycleStatus::InUse),
            2 => Some(BicycleStatus::Maintenance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BicycleStatus::Available => "AVAILABLE",
            BicycleStatus::InUse => "IN_USE",
            BicycleStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for BicycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bicycle {
    pub bicycle_id: BicycleId,
    pub model: String,
    pub brand: String,
    pub year: i32,
    pub number: i32,
    pub status: BicycleStatus,
}

impl Bicycle {
    /// AVAILABLE -> IN_USE
    pub fn check_out(&mut self) -> Result<(), LoanError> {
        self.transition(BicycleStatus::Available, BicycleStatus::InUse)
    }

    /// IN_USE -> AVAILABLE
    pub fn check_in(&mut self) -> Result<(), LoanError> {
        self.transition(BicycleStatus::InUse, BicycleStatus::Available)
    }

    fn transition(&mut self, from: BicycleStatus, to: BicycleStatus) -> Result<(), LoanError> {
        if self.status != from {
            return Err(LoanError::InvalidStateTransition(format!(
                "bicycle {}: {} -> {}",
                self.bicycle_id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bicycle(status: BicycleStatus) -> Bicycle {
        Bicycle {
            bicycle_id: 7,
            model: "Urbana".to_string(),
            brand: "Caloi".to_string(),
            year: 2022,
            number: 42,
            status,
        }
    }

    #[test]
    fn test_status_ids() {
        for status in [
            BicycleStatus::Available,
            BicycleStatus::InUse,
            BicycleStatus::Maintenance,
        ] {
            assert_eq!(BicycleStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(BicycleStatus::InUse.as_str(), "IN_USE");
    }

    #[test]
    fn test_check_out_and_in() {
        let mut b = bicycle(BicycleStatus::Available);
        b.check_out().unwrap();
        assert_eq!(b.status, BicycleStatus::InUse);
        b.check_in().unwrap();
        assert_eq!(b.status, BicycleStatus::Available);
    }

    #[test]
    fn test_invalid_transitions_leave_status() {
        let mut b = bicycle(BicycleStatus::Maintenance);
        assert!(matches!(
            b.check_out(),
            Err(LoanError::InvalidStateTransition(_))
        ));
        assert!(b.check_in().is_err());
        assert_eq!(b.status, BicycleStatus::Maintenance);

        let mut b = bicycle(BicycleStatus::InUse);
        assert!(b.check_out().is_err());
        assert_eq!(b.status, BicycleStatus::InUse);
    }
}
