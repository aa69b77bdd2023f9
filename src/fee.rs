//! Loan fee calculation
//!
//! A loan is charged a flat initial fee when it opens. The fee covers a base
//! allowance of whole hours; every *full* hour beyond the allowance is charged
//! a fixed surcharge when the loan closes. Partial hours are never billed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Default initial fee (10.00)
pub const DEFAULT_INITIAL_FEE: Decimal = Decimal::from_parts(1000, 0, 0, false, 2);

/// Default allowance covered by the initial fee, in hours
pub const DEFAULT_ALLOWANCE_HOURS: u32 = 2;

/// Default surcharge per full overtime hour (5.00)
pub const DEFAULT_OVERTIME_PER_HOUR: Decimal = Decimal::from_parts(500, 0, 0, false, 2);

/// Fee schedule applied by the loan engine.
///
/// Pure value type: no state, no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    initial_fee: Decimal,
    allowance_hours: u32,
    overtime_per_hour: Decimal,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_INITIAL_FEE,
            DEFAULT_ALLOWANCE_HOURS,
            DEFAULT_OVERTIME_PER_HOUR,
        )
    }
}

impl FeePolicy {
    pub fn new(initial_fee: Decimal, allowance_hours: u32, overtime_per_hour: Decimal) -> Self {
        Self {
            initial_fee,
            allowance_hours,
            overtime_per_hour,
        }
    }

    /// Fee charged when a loan opens
    #[inline]
    pub fn initial_fee(&self) -> Decimal {
        self.initial_fee
    }

    #[inline]
    pub fn allowance_hours(&self) -> u32 {
        self.allowance_hours
    }

    #[inline]
    pub fn overtime_per_hour(&self) -> Decimal {
        self.overtime_per_hour
    }

    /// Overtime surcharge for a loan that ran from `start` to `end`.
    ///
    /// Returns `None` (not zero) when no full hour beyond the allowance has
    /// elapsed, including when `end` precedes `start`.
    ///
    /// # Example
    /// ```
    /// use chrono::{Duration, Utc};
    /// use rust_decimal::Decimal;
    /// use scb_rental::fee::FeePolicy;
    ///
    /// let fees = FeePolicy::default();
    /// let start = Utc::now();
    /// // 3h30m: one full hour past the 2h allowance
    /// let end = start + Duration::minutes(210);
    /// assert_eq!(fees.overtime_fee(start, end), Some(Decimal::new(500, 2)));
    /// assert_eq!(fees.overtime_fee(start, start + Duration::minutes(119)), None);
    /// ```
    pub fn overtime_fee(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Decimal> {
        let elapsed_hours = (end - start).num_hours();
        let excess_hours = elapsed_hours - i64::from(self.allowance_hours);
        if excess_hours <= 0 {
            return None;
        }
        Some(Decimal::from(excess_hours) * self.overtime_per_hour)
    }
}
