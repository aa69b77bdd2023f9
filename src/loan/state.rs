//! Loan State Definitions
//!
//! State IDs are stored in PostgreSQL as SMALLINT.

use std::fmt;

/// Loan states
///
/// `IN_PROGRESS -> COMPLETED`, COMPLETED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum LoanState {
    /// Bicycle is out with the rider
    InProgress = 10,

    /// Terminal: bicycle returned to a dock
    Completed = 40,
}

impl LoanState {
    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            10 => Some(LoanState::InProgress),
            40 => Some(LoanState::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::InProgress => "IN_PROGRESS",
            LoanState::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_id_roundtrip() {
        for state in [LoanState::InProgress, LoanState::Completed] {
            assert_eq!(LoanState::from_id(state.id()), Some(state));
        }
        assert_eq!(LoanState::from_id(0), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(LoanState::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(LoanState::Completed.to_string(), "COMPLETED");
    }
}
