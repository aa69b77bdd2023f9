//! Rider records
//!
//! A rider is identified towards callers by an identity document: a domestic
//! tax ID for nationals, a passport (plus nationality) for foreigners.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::core_types::{CardId, RiderId};

/// Kind of identity document a rider registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i16)]
pub enum DocumentKind {
    /// National tax ID
    Domestic = 1,
    /// Passport
    Foreign = 2,
}

impl DocumentKind {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(DocumentKind::Domestic),
            2 => Some(DocumentKind::Foreign),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Domestic => "DOMESTIC",
            DocumentKind::Foreign => "FOREIGN",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity document of a rider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiderDocument {
    pub kind: DocumentKind,
    pub value: String,
    /// Only meaningful for foreign documents
    pub nationality: Option<String>,
}

impl RiderDocument {
    pub fn domestic(tax_id: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::Domestic,
            value: tax_id.into(),
            nationality: None,
        }
    }

    pub fn foreign(passport: impl Into<String>, nationality: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::Foreign,
            value: passport.into(),
            nationality: Some(nationality.into()),
        }
    }
}

/// Rider lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum RiderStatus {
    Suspended = 0,
    Active = 1,
}

impl RiderStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(RiderStatus::Suspended),
            1 => Some(RiderStatus::Active),
            _ => None,
        }
    }
}

/// Payment instrument on file for a rider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCard {
    pub card_id: CardId,
    pub holder_name: String,
    /// Last digits only, the full number never enters this crate
    pub last4: String,
    /// `MM/YY`
    pub expiry: String,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rider {
    pub rider_id: RiderId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document: RiderDocument,
    pub cards: Vec<PaymentCard>,
    pub status: RiderStatus,
    pub registered_at: DateTime<Utc>,
}

impl Rider {
    /// The card charged for loans, if the rider flagged one
    pub fn primary_card(&self) -> Option<&PaymentCard> {
        self.cards.iter().find(|c| c.primary)
    }

    /// Whether `identifier` is this rider's document number
    pub fn is_identified_by(&self, identifier: &str) -> bool {
        self.document.value == identifier
    }
}
