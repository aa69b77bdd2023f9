use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use scb_rental::config::AppConfig;
use scb_rental::loan::{
    LogNotifier, LoanEngine, LoanError, ManualClock, MemoryStore, NotificationWorker,
    OvertimeFailurePolicy, SimulatedCardGateway, notification_channel,
};
use scb_rental::resources::{
    Bicycle, BicycleStatus, Dock, DockStatus, PaymentCard, Rider, RiderDocument, RiderStatus,
    Station,
};

fn rider(rider_id: i64, document: RiderDocument, with_card: bool) -> Rider {
    let cards = if with_card {
        vec![PaymentCard {
            card_id: rider_id,
            holder_name: "TEST".to_string(),
            last4: "1111".to_string(),
            expiry: "10/31".to_string(),
            primary: true,
        }]
    } else {
        vec![]
    };
    Rider {
        rider_id,
        name: format!("Rider {rider_id}"),
        email: format!("rider{rider_id}@example.com"),
        phone: "0".to_string(),
        document,
        cards,
        status: RiderStatus::Active,
        registered_at: Utc::now(),
    }
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_station(Station::new(1, "Central", 3)).await.unwrap();
    store.add_station(Station::new(2, "Harbour", 1)).await.unwrap();
    store.add_dock(Dock::occupied(1, 1, 1, 7)).await.unwrap();
    store.add_dock(Dock::occupied(2, 2, 1, 8)).await.unwrap();
    store.add_dock(Dock::free(3, 1, 2)).await.unwrap();
    for bicycle_id in [7, 8] {
        store
            .add_bicycle(Bicycle {
                bicycle_id,
                model: "City".to_string(),
                brand: "Acme".to_string(),
                year: 2024,
                number: bicycle_id as i32,
                status: BicycleStatus::Available,
            })
            .await;
    }
    store
        .add_rider(rider(1, RiderDocument::domestic("52998224725"), true))
        .await;
    store
        .add_rider(rider(2, RiderDocument::foreign("FX123456", "PT"), false))
        .await;
    store
}

#[tokio::test]
async fn ride_across_stations_with_simulated_card() {
    let store = seeded_store().await;
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(t0));
    let (tx, rx) = notification_channel(16);
    let worker = tokio::spawn(NotificationWorker::new(rx, Arc::new(LogNotifier)).run());

    let config = AppConfig::load("dev").unwrap();
    let engine = LoanEngine::new(
        Arc::new(store.clone()),
        config.loans.fee_policy(),
        Arc::new(SimulatedCardGateway),
        tx,
        config.loans.engine_settings(),
    )
    .with_clock(clock.clone());

    let opened = engine.open_loan("52998224725", 1).await.unwrap();
    assert_eq!(opened.initial_fee, Decimal::new(10, 0));

    clock.advance(Duration::hours(6) + Duration::minutes(59));
    let closed = engine.close_loan("52998224725", 3).await.unwrap();
    // 6 full hours, 2 covered by the initial fee
    assert_eq!(closed.loan.overtime_fee, Some(Decimal::new(20, 0)));
    assert_eq!(closed.loan.destination_station_id, Some(2));
    assert!(closed.billing_warning.is_none());

    let json = serde_json::to_value(&closed).unwrap();
    assert_eq!(json["loan"]["status"], "COMPLETED");
    assert!(json.get("billing_warning").is_none());

    let tables = store.snapshot().await;
    assert_eq!(tables.docks[&1].status, DockStatus::Free);
    assert_eq!(tables.docks[&3].bicycle_id, Some(7));
    assert_eq!(tables.bicycles[&7].status, BicycleStatus::Available);

    drop(engine);
    assert_eq!(worker.await.unwrap(), 2);
}

#[tokio::test]
async fn rider_without_card_cannot_ride() {
    let store = seeded_store().await;
    let (tx, _rx) = notification_channel(16);
    let engine = LoanEngine::new(
        Arc::new(store.clone()),
        Default::default(),
        Arc::new(SimulatedCardGateway),
        tx,
        Default::default(),
    );
    let before = store.snapshot().await;

    let err = engine.open_loan("FX123456", 2).await.unwrap_err();
    assert!(matches!(err, LoanError::PaymentDeclined(_)));
    assert_eq!(err.code(), "PAYMENT_DECLINED");
    assert_eq!(store.snapshot().await, before);
    assert!(engine.active_loan("FX123456").await.unwrap().is_none());
}

#[test]
fn dev_config_matches_default_schedule() {
    let config = AppConfig::load("dev").unwrap();
    let fees = config.loans.fee_policy();
    assert_eq!(fees, scb_rental::FeePolicy::default());
    assert_eq!(
        config.loans.overtime_failure_policy,
        OvertimeFailurePolicy::Tolerate
    );
    assert!(config.postgres_url.is_some());
}

#[test]
fn missing_config_file_is_an_error() {
    assert!(AppConfig::load("does-not-exist").is_err());
}
