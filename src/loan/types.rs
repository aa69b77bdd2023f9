//! Loan Core Types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::LoanError;
use super::state::LoanState;
use crate::core_types::{BicycleId, DockId, RiderId, StationId};
use crate::resources::Dock;

/// Loan ID - ULID based, sortable by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoanId(ulid::Ulid);

impl LoanId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LoanId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Persisted loan record
///
/// Destination, end time and overtime fee stay `None` until the loan completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub loan_id: LoanId,
    pub rider_id: RiderId,
    pub bicycle_id: BicycleId,
    pub origin_dock_id: DockId,
    pub origin_station_id: StationId,
    pub started_at: DateTime<Utc>,
    pub initial_fee: Decimal,
    pub state: LoanState,
    pub destination_dock_id: Option<DockId>,
    pub destination_station_id: Option<StationId>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Present only when overtime accrued
    pub overtime_fee: Option<Decimal>,
}

impl Loan {
    /// New IN_PROGRESS loan for a bicycle taken from `origin`
    pub fn open(
        rider_id: RiderId,
        bicycle_id: BicycleId,
        origin: &Dock,
        initial_fee: Decimal,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            loan_id: LoanId::new(),
            rider_id,
            bicycle_id,
            origin_dock_id: origin.dock_id,
            origin_station_id: origin.station_id,
            started_at,
            initial_fee,
            state: LoanState::InProgress,
            destination_dock_id: None,
            destination_station_id: None,
            ended_at: None,
            overtime_fee: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LoanState::InProgress
    }

    /// IN_PROGRESS -> COMPLETED at `destination`
    pub fn complete(
        &mut self,
        destination: &Dock,
        ended_at: DateTime<Utc>,
        overtime_fee: Option<Decimal>,
    ) -> Result<(), LoanError> {
        if self.state != LoanState::InProgress {
            return Err(LoanError::InvalidStateTransition(format!(
                "loan {}: {} -> {}",
                self.loan_id,
                self.state,
                LoanState::Completed
            )));
        }
        self.destination_dock_id = Some(destination.dock_id);
        self.destination_station_id = Some(destination.station_id);
        self.ended_at = Some(ended_at);
        self.overtime_fee = overtime_fee;
        self.state = LoanState::Completed;
        Ok(())
    }
}

/// Read projection of a loan returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanView {
    pub loan_id: String,
    pub rider_id: RiderId,
    pub bicycle_id: BicycleId,
    pub origin_dock_id: DockId,
    pub origin_station_id: StationId,
    pub started_at: DateTime<Utc>,
    pub initial_fee: Decimal,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_dock_id: Option<DockId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_station_id: Option<StationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overtime_fee: Option<Decimal>,
}

impl From<&Loan> for LoanView {
    fn from(loan: &Loan) -> Self {
        Self {
            loan_id: loan.loan_id.to_string(),
            rider_id: loan.rider_id,
            bicycle_id: loan.bicycle_id,
            origin_dock_id: loan.origin_dock_id,
            origin_station_id: loan.origin_station_id,
            started_at: loan.started_at,
            initial_fee: loan.initial_fee,
            status: loan.state.as_str(),
            destination_dock_id: loan.destination_dock_id,
            destination_station_id: loan.destination_station_id,
            ended_at: loan.ended_at,
            overtime_fee: loan.overtime_fee,
        }
    }
}

/// Result of a successful return
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedLoan {
    pub loan: LoanView,
    /// Set when the overtime charge failed and the return went through anyway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_warning: Option<String>,
}

/// Outcome of a payment gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeResult {
    Approved,
    Declined(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanEventKind {
    Opened,
    Closed,
}

impl LoanEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanEventKind::Opened => "LOAN_OPENED",
            LoanEventKind::Closed => "LOAN_CLOSED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn origin() -> Dock {
        Dock::occupied(10, 1, 3, 100)
    }

    #[test]
    fn test_loan_id_parse() {
        let id = LoanId::new();
        let parsed: LoanId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<LoanId>().is_err());
    }

    #[test]
    fn test_open_takes_origin_from_dock() {
        let now = Utc::now();
        let loan = Loan::open(1, 100, &origin(), Decimal::new(10, 0), now);
        assert_eq!(loan.state, LoanState::InProgress);
        assert_eq!(loan.origin_dock_id, 10);
        assert_eq!(loan.origin_station_id, 3);
        assert!(loan.destination_dock_id.is_none());
        assert!(loan.ended_at.is_none());
        assert!(loan.overtime_fee.is_none());
    }

    #[test]
    fn test_complete_only_once() {
        let now = Utc::now();
        let mut loan = Loan::open(1, 100, &origin(), Decimal::new(10, 0), now);
        let dest = Dock::free(20, 4, 5);

        loan.complete(&dest, now + Duration::hours(3), Some(Decimal::new(5, 0)))
            .unwrap();
        assert_eq!(loan.state, LoanState::Completed);
        assert_eq!(loan.destination_dock_id, Some(20));
        assert_eq!(loan.destination_station_id, Some(5));
        assert_eq!(loan.overtime_fee, Some(Decimal::new(5, 0)));

        let before = loan.clone();
        assert!(matches!(
            loan.complete(&dest, now + Duration::hours(4), None),
            Err(LoanError::InvalidStateTransition(_))
        ));
        assert_eq!(loan, before);
    }

    #[test]
    fn test_view_serialization() {
        let now = Utc::now();
        let loan = Loan::open(1, 100, &origin(), Decimal::new(1000, 2), now);
        let json = serde_json::to_value(LoanView::from(&loan)).unwrap();

        assert_eq!(json["status"], "IN_PROGRESS");
        assert_eq!(json["initial_fee"], "10.00");
        assert_eq!(json["loan_id"], loan.loan_id.to_string());
        assert!(json.get("overtime_fee").is_none());
        assert!(json.get("destination_dock_id").is_none());
    }
}
