//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Rider ID - surrogate key of a registered rider.
///
/// # Usage:
/// - Primary key of `riders`
/// - Foreign key of `loans` and `payment_cards`
///
/// Riders are addressed by callers through their identity document, never
/// through this key.
pub type RiderId = i64;

/// Station ID - identifies a totem (a group of docks at one location).
pub type StationId = i64;

/// Dock ID - unique within the whole system, not only within a station.
pub type DockId = i64;

/// Bicycle ID - unique within the system
pub type BicycleId = i64;

/// Payment card ID - unique within the system
pub type CardId = i64;
