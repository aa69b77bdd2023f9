//! Resource records the loan engine keeps consistent
//!
//! Riders, stations, docks and bicycles. The types here only know their own
//! state transitions; cross-resource rules live in [`crate::loan`].

pub mod bicycle;
pub mod rider;
pub mod station;

pub use bicycle::{Bicycle, BicycleStatus};
pub use rider::{DocumentKind, PaymentCard, Rider, RiderDocument, RiderStatus};
pub use station::{Dock, DockStatus, Station};
