//! Loan Engine
//!
//! Opens and closes loans while keeping rider, bicycle, dock and station
//! consistent. Every operation runs inside one unit of work:
//!
//! ```text
//! resolve rider -> check active loan -> resolve dock -> check dock
//!     -> charge -> write loan/bicycle/dock -> commit -> notify
//! ```
//!
//! State transitions are applied to local copies first, so a failed
//! precondition or a declined charge returns before anything is written and
//! the dropped unit of work leaves the store untouched.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::error::LoanError;
use super::notify::{LoanNotification, NotificationSender};
use super::payment::PaymentGateway;
use super::store::{ResourceStore, UnitOfWork};
use super::types::{ChargeResult, ClosedLoan, Loan, LoanEventKind, LoanId, LoanView};
use crate::core_types::DockId;
use crate::fee::FeePolicy;
use crate::resources::{Bicycle, Dock, Rider};

/// What a declined overtime charge does to a return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvertimeFailurePolicy {
    /// Complete the return and report the unpaid fee as a billing warning
    #[default]
    Tolerate,
    /// Refuse the return with `PaymentDeclined`
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound for one payment gateway call, a timeout counts as a decline
    pub payment_timeout: Duration,
    pub overtime_failure: OvertimeFailurePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            payment_timeout: Duration::from_secs(3),
            overtime_failure: OvertimeFailurePolicy::default(),
        }
    }
}

pub struct LoanEngine {
    store: Arc<dyn ResourceStore>,
    fees: FeePolicy,
    payment: Arc<dyn PaymentGateway>,
    notifications: NotificationSender,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl LoanEngine {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        fees: FeePolicy,
        payment: Arc<dyn PaymentGateway>,
        notifications: NotificationSender,
        settings: EngineSettings,
    ) -> Self {
        info!(
            store = store.name(),
            payment = payment.name(),
            initial_fee = %fees.initial_fee(),
            allowance_hours = fees.allowance_hours(),
            overtime_per_hour = %fees.overtime_per_hour(),
            "Loan engine created"
        );
        Self {
            store,
            fees,
            payment,
            notifications,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // Open
    // ========================================================================

    /// Hand the bicycle parked at `dock_id` to the rider
    pub async fn open_loan(
        &self,
        rider_identifier: &str,
        dock_id: DockId,
    ) -> Result<LoanView, LoanError> {
        let result = self.try_open(rider_identifier, dock_id).await;
        if let Err(e) = &result {
            info!(
                rider = rider_identifier,
                dock_id,
                code = e.code(),
                error = %e,
                "Open loan rejected"
            );
        }
        result
    }

    async fn try_open(
        &self,
        rider_identifier: &str,
        dock_id: DockId,
    ) -> Result<LoanView, LoanError> {
        let mut uow = self.store.begin().await?;

        let rider = uow
            .find_rider(rider_identifier)
            .await?
            .ok_or_else(|| LoanError::RiderNotFound(rider_identifier.to_string()))?;
        debug!(rider_id = rider.rider_id, "Rider resolved");

        if let Some(active) = uow.find_active_loan(rider.rider_id).await? {
            debug!(rider_id = rider.rider_id, loan_id = %active.loan_id, "Rider already riding");
            return Err(LoanError::LoanAlreadyActive(rider.rider_id));
        }

        let mut dock = uow
            .get_dock(dock_id)
            .await?
            .ok_or(LoanError::DockNotFound(dock_id))?;
        let bicycle_id = dock.release()?;

        let mut bicycle = uow.get_bicycle(bicycle_id).await?.ok_or_else(|| {
            LoanError::BicycleMissing(format!("bicycle {bicycle_id} parked at dock {dock_id}"))
        })?;
        bicycle.check_out()?;

        let loan = Loan::open(
            rider.rider_id,
            bicycle_id,
            &dock,
            self.fees.initial_fee(),
            self.clock.now(),
        );

        if let ChargeResult::Declined(reason) = self.charge(&rider, loan.initial_fee).await {
            warn!(
                rider_id = rider.rider_id,
                amount = %loan.initial_fee,
                reason = %reason,
                "Initial fee declined"
            );
            return Err(LoanError::PaymentDeclined(reason));
        }

        if let Err(e) = Self::persist(uow, &loan, &bicycle, &dock, true).await {
            error!(
                rider_id = rider.rider_id,
                loan_id = %loan.loan_id,
                amount = %loan.initial_fee,
                error = %e,
                "Initial fee charged but loan was not recorded"
            );
            return Err(e);
        }

        info!(
            loan_id = %loan.loan_id,
            rider_id = rider.rider_id,
            bicycle_id,
            dock_id,
            station_id = loan.origin_station_id,
            "Loan opened"
        );

        let view = LoanView::from(&loan);
        self.notifications.publish(LoanNotification::new(
            LoanEventKind::Opened,
            view.clone(),
            &rider,
        ));
        Ok(view)
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Return the rider's bicycle into `dock_id`, billing overtime if any
    pub async fn close_loan(
        &self,
        rider_identifier: &str,
        dock_id: DockId,
    ) -> Result<ClosedLoan, LoanError> {
        let result = self.try_close(rider_identifier, dock_id).await;
        if let Err(e) = &result {
            info!(
                rider = rider_identifier,
                dock_id,
                code = e.code(),
                error = %e,
                "Close loan rejected"
            );
        }
        result
    }

    async fn try_close(
        &self,
        rider_identifier: &str,
        dock_id: DockId,
    ) -> Result<ClosedLoan, LoanError> {
        let mut uow = self.store.begin().await?;

        let rider = uow
            .find_rider(rider_identifier)
            .await?
            .ok_or_else(|| LoanError::RiderNotFound(rider_identifier.to_string()))?;

        let mut loan = uow
            .find_active_loan(rider.rider_id)
            .await?
            .ok_or(LoanError::NoActiveLoan(rider.rider_id))?;
        debug!(rider_id = rider.rider_id, loan_id = %loan.loan_id, "Active loan found");

        let mut dock = uow
            .get_dock(dock_id)
            .await?
            .ok_or(LoanError::DockNotFound(dock_id))?;
        dock.park(loan.bicycle_id)?;

        let mut bicycle = uow.get_bicycle(loan.bicycle_id).await?.ok_or_else(|| {
            LoanError::BicycleMissing(format!(
                "bicycle {} of loan {}",
                loan.bicycle_id, loan.loan_id
            ))
        })?;
        bicycle.check_in()?;

        let now = self.clock.now();
        let overtime = self.fees.overtime_fee(loan.started_at, now);
        loan.complete(&dock, now, overtime)?;

        let billing_warning = match overtime {
            Some(amount) => self.charge_overtime(&rider, &loan, amount).await?,
            None => None,
        };

        if let Err(e) = Self::persist(uow, &loan, &bicycle, &dock, false).await {
            if overtime.is_some() && billing_warning.is_none() {
                error!(
                    rider_id = rider.rider_id,
                    loan_id = %loan.loan_id,
                    amount = ?loan.overtime_fee,
                    error = %e,
                    "Overtime fee charged but return was not recorded"
                );
            }
            return Err(e);
        }

        info!(
            loan_id = %loan.loan_id,
            rider_id = rider.rider_id,
            bicycle_id = loan.bicycle_id,
            dock_id,
            station_id = dock.station_id,
            overtime_fee = ?loan.overtime_fee,
            "Loan closed"
        );

        let view = LoanView::from(&loan);
        self.notifications.publish(LoanNotification::new(
            LoanEventKind::Closed,
            view.clone(),
            &rider,
        ));
        Ok(ClosedLoan {
            loan: view,
            billing_warning,
        })
    }

    /// `Ok(Some(warning))` when the charge failed and policy lets the return through
    async fn charge_overtime(
        &self,
        rider: &Rider,
        loan: &Loan,
        amount: Decimal,
    ) -> Result<Option<String>, LoanError> {
        let ChargeResult::Declined(reason) = self.charge(rider, amount).await else {
            return Ok(None);
        };

        match self.settings.overtime_failure {
            OvertimeFailurePolicy::Reject => {
                warn!(
                    loan_id = %loan.loan_id,
                    amount = %amount,
                    reason = %reason,
                    "Overtime fee declined, return refused"
                );
                Err(LoanError::PaymentDeclined(reason))
            }
            OvertimeFailurePolicy::Tolerate => {
                warn!(
                    loan_id = %loan.loan_id,
                    amount = %amount,
                    reason = %reason,
                    "Overtime fee declined, completing return"
                );
                Ok(Some(format!("overtime fee {amount} not charged: {reason}")))
            }
        }
    }

    async fn charge(&self, rider: &Rider, amount: Decimal) -> ChargeResult {
        match tokio::time::timeout(
            self.settings.payment_timeout,
            self.payment.charge(rider, amount),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => ChargeResult::Declined(format!(
                "{} timed out after {}ms",
                self.payment.name(),
                self.settings.payment_timeout.as_millis()
            )),
        }
    }

    async fn persist(
        mut uow: Box<dyn UnitOfWork>,
        loan: &Loan,
        bicycle: &Bicycle,
        dock: &Dock,
        new_loan: bool,
    ) -> Result<(), LoanError> {
        if new_loan {
            uow.insert_loan(loan).await?;
        } else {
            uow.update_loan(loan).await?;
        }
        uow.save_bicycle(bicycle).await?;
        uow.save_dock(dock).await?;
        uow.commit().await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All loans of a rider, most recent first
    pub async fn loan_history(&self, rider_identifier: &str) -> Result<Vec<LoanView>, LoanError> {
        let rider = self.resolve_rider(rider_identifier).await?;
        let loans = self.store.loan_history(rider.rider_id).await?;
        Ok(loans.iter().map(LoanView::from).collect())
    }

    /// The rider's loan in progress, if any
    pub async fn active_loan(&self, rider_identifier: &str) -> Result<Option<LoanView>, LoanError> {
        let rider = self.resolve_rider(rider_identifier).await?;
        let loan = self.store.active_loan(rider.rider_id).await?;
        Ok(loan.as_ref().map(LoanView::from))
    }

    pub async fn get_loan(&self, loan_id: &str) -> Result<LoanView, LoanError> {
        let id: LoanId = loan_id
            .parse()
            .map_err(|_| LoanError::LoanNotFound(loan_id.to_string()))?;
        self.store
            .get_loan(id)
            .await?
            .as_ref()
            .map(LoanView::from)
            .ok_or_else(|| LoanError::LoanNotFound(loan_id.to_string()))
    }

    async fn resolve_rider(&self, rider_identifier: &str) -> Result<Rider, LoanError> {
        self.store
            .find_rider(rider_identifier)
            .await?
            .ok_or_else(|| LoanError::RiderNotFound(rider_identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overtime_policy_serde() {
        let policy: OvertimeFailurePolicy = serde_yaml::from_str("reject").unwrap();
        assert_eq!(policy, OvertimeFailurePolicy::Reject);
        assert_eq!(
            serde_yaml::to_string(&OvertimeFailurePolicy::Tolerate)
                .unwrap()
                .trim(),
            "tolerate"
        );
        assert!(serde_yaml::from_str::<OvertimeFailurePolicy>("ignore").is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.payment_timeout, Duration::from_secs(3));
        assert_eq!(settings.overtime_failure, OvertimeFailurePolicy::Tolerate);
    }
}
