//! Payment collaborator
//!
//! The engine charges riders through a [`PaymentGateway`]. Gateways report
//! outcomes as values; timeouts are imposed by the caller.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use super::types::ChargeResult;
use crate::resources::Rider;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Get gateway name for logging
    fn name(&self) -> &'static str;

    /// Charge `amount` against the rider's primary card
    async fn charge(&self, rider: &Rider, amount: Decimal) -> ChargeResult;
}

/// Card gateway stand-in: approves any rider holding a primary card
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedCardGateway;

#[async_trait]
impl PaymentGateway for SimulatedCardGateway {
    fn name(&self) -> &'static str {
        "simulated-card"
    }

    async fn charge(&self, rider: &Rider, amount: Decimal) -> ChargeResult {
        match rider.primary_card() {
            Some(card) => {
                info!(
                    rider_id = rider.rider_id,
                    card_id = card.card_id,
                    last4 = %card.last4,
                    amount = %amount,
                    "Card charged"
                );
                ChargeResult::Approved
            }
            None => ChargeResult::Declined(format!(
                "rider {} has no primary card",
                rider.rider_id
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{PaymentCard, RiderDocument, RiderStatus};
    use chrono::Utc;

    fn rider(cards: Vec<PaymentCard>) -> Rider {
        Rider {
            rider_id: 9,
            name: "Bia".to_string(),
            email: "bia@example.com".to_string(),
            phone: "0".to_string(),
            document: RiderDocument::foreign("P9", "CL"),
            cards,
            status: RiderStatus::Active,
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway_needs_primary_card() {
        let gateway = SimulatedCardGateway;
        let amount = Decimal::new(10, 0);

        assert!(matches!(
            gateway.charge(&rider(vec![]), amount).await,
            ChargeResult::Declined(_)
        ));

        let card = PaymentCard {
            card_id: 1,
            holder_name: "BIA".to_string(),
            last4: "0005".to_string(),
            expiry: "01/30".to_string(),
            primary: true,
        };
        assert_eq!(
            gateway.charge(&rider(vec![card]), amount).await,
            ChargeResult::Approved
        );
    }
}
