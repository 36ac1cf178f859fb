//! Push notification union.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::entities::{Invoice, LegacyTransaction, Transaction};
use crate::profile::DateMode;
use crate::timestamp::ResolveDates;

/// A decoded push notification.
///
/// Each variant carries exactly one payload. The serialized form mirrors the
/// server's `{"type": ..., "transaction" | "invoice": ...}` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A payment arrived into a static wallet.
    Transaction(Transaction),
    /// An invoice changed state.
    Invoice(Invoice),
    /// An invoice expired without being paid in full.
    Expired(Invoice),
    /// A bare transaction record from the SSE API.
    LegacyTransaction(LegacyTransaction),
}

impl Notification {
    /// The wire `type` tag of this notification.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Transaction(_) | Self::LegacyTransaction(_) => "transaction",
            Self::Invoice(_) => "invoice",
            Self::Expired(_) => "expired",
        }
    }

    /// Returns `true` for invoice-carrying notifications, expired ones included.
    #[must_use]
    pub const fn is_invoice(&self) -> bool {
        matches!(self, Self::Invoice(_) | Self::Expired(_))
    }

    /// Returns `true` for transaction-carrying notifications.
    #[must_use]
    pub const fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_) | Self::LegacyTransaction(_))
    }

    /// The invoice payload, if any.
    #[must_use]
    pub const fn invoice(&self) -> Option<&Invoice> {
        match self {
            Self::Invoice(invoice) | Self::Expired(invoice) => Some(invoice),
            _ => None,
        }
    }
}

impl ResolveDates for Notification {
    fn resolve_dates(&mut self, mode: DateMode) {
        match self {
            Self::Transaction(tx) => tx.resolve_dates(mode),
            Self::Invoice(invoice) | Self::Expired(invoice) => invoice.resolve_dates(mode),
            Self::LegacyTransaction(_) => {}
        }
    }
}

impl Serialize for Notification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.type_tag())?;
        match self {
            Self::Transaction(tx) => map.serialize_entry("transaction", tx)?,
            Self::LegacyTransaction(tx) => map.serialize_entry("transaction", tx)?,
            Self::Invoice(invoice) | Self::Expired(invoice) => {
                map.serialize_entry("invoice", invoice)?;
            }
        }
        map.end()
    }
}
