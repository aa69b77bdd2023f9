//! Loan Error Types

use thiserror::Error;

use crate::core_types::{DockId, RiderId, StationId};

/// Loan engine error types
///
/// Precondition failures abort the operation before anything is written and
/// are surfaced to callers unchanged.
#[derive(Error, Debug, Clone)]
pub enum LoanError {
    // === Lookup Errors ===
    #[error("Rider not found: {0}")]
    RiderNotFound(String),

    #[error("Dock not found: {0}")]
    DockNotFound(DockId),

    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    // === State Conflicts ===
    #[error("Dock {0} holds no bicycle")]
    DockEmpty(DockId),

    #[error("Dock {0} is not free")]
    DockOccupied(DockId),

    #[error("Bicycle missing: {0}")]
    BicycleMissing(String),

    #[error("Rider {0} already has a loan in progress")]
    LoanAlreadyActive(RiderId),

    #[error("Rider {0} has no loan in progress")]
    NoActiveLoan(RiderId),

    #[error("Station {0} is at dock capacity")]
    StationFull(StationId),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // === Payment ===
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl LoanError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LoanError::RiderNotFound(_) => "RIDER_NOT_FOUND",
            LoanError::DockNotFound(_) => "DOCK_NOT_FOUND",
            LoanError::LoanNotFound(_) => "LOAN_NOT_FOUND",
            LoanError::DockEmpty(_) => "DOCK_EMPTY",
            LoanError::DockOccupied(_) => "DOCK_OCCUPIED",
            LoanError::BicycleMissing(_) => "BICYCLE_MISSING",
            LoanError::LoanAlreadyActive(_) => "LOAN_ALREADY_ACTIVE",
            LoanError::NoActiveLoan(_) => "NO_ACTIVE_LOAN",
            LoanError::StationFull(_) => "STATION_FULL",
            LoanError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            LoanError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            LoanError::DatabaseError(_) => "DATABASE_ERROR",
            LoanError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LoanError::RiderNotFound(_)
            | LoanError::DockNotFound(_)
            | LoanError::LoanNotFound(_) => 404,
            LoanError::DockEmpty(_)
            | LoanError::DockOccupied(_)
            | LoanError::BicycleMissing(_)
            | LoanError::LoanAlreadyActive(_)
            | LoanError::NoActiveLoan(_)
            | LoanError::StationFull(_) => 409,
            LoanError::PaymentDeclined(_) => 402,
            LoanError::InvalidStateTransition(_) | LoanError::SystemError(_) => 500,
            LoanError::DatabaseError(_) => 503,
        }
    }
}

impl From<sqlx::Error> for LoanError {
    fn from(e: sqlx::Error) -> Self {
        LoanError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LoanError::DockEmpty(1).code(), "DOCK_EMPTY");
        assert_eq!(LoanError::LoanAlreadyActive(1).code(), "LOAN_ALREADY_ACTIVE");
        assert_eq!(
            LoanError::PaymentDeclined("no card".into()).code(),
            "PAYMENT_DECLINED"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(LoanError::RiderNotFound("x".into()).http_status(), 404);
        assert_eq!(LoanError::DockOccupied(3).http_status(), 409);
        assert_eq!(LoanError::NoActiveLoan(1).http_status(), 409);
        assert_eq!(LoanError::PaymentDeclined("x".into()).http_status(), 402);
        assert_eq!(LoanError::SystemError("x".into()).http_status(), 500);
        assert_eq!(LoanError::DatabaseError("x".into()).http_status(), 503);
    }

    #[test]
    fn test_display() {
        assert_eq!(LoanError::DockEmpty(12).to_string(), "Dock 12 holds no bicycle");
    }

    #[test]
    fn test_from_sqlx() {
        let err: LoanError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
