//! Parameters of the HTTP operations.
//!
//! Query strings are built from these by explicit per-operation mappings
//! rather than by reflecting over the struct; see `chiefpay_http::params`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to create a static wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWallet {
    /// The merchant's own reference to link the wallet to.
    pub order_id: String,
}

impl CreateWallet {
    /// Creates a wallet request for `order_id`.
    #[must_use]
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
        }
    }
}

/// How to look up a static wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletLookup {
    /// By wallet UUID.
    Id(String),
    /// By the merchant's own reference.
    OrderId(String),
}

/// How to look up an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceLookup {
    /// By invoice UUID.
    Id(String),
    /// By the merchant's own order reference.
    OrderId(String),
}

/// Request to create an invoice.
///
/// `order_id` is sent under the profile's invoice linking key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    /// The merchant's own order reference.
    pub order_id: String,
    /// Text shown on the payment page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Amount to charge; omit to accept any amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Currency of `amount` (defaults to USD server-side).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Whether the commission is added on top of `amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_included: Option<bool>,
    /// Allowed relative inaccuracy of the paid amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<String>,
    /// Discount (positive) or markup (negative).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<String>,
}

impl CreateInvoice {
    /// Creates an invoice request with only the order reference set.
    #[must_use]
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            ..Self::default()
        }
    }

    /// Sets the amount.
    #[must_use]
    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    /// Sets the currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets whether the fee is included.
    #[must_use]
    pub const fn with_fee_included(mut self, fee_included: bool) -> Self {
        self.fee_included = Some(fee_included);
        self
    }
}

/// Time window for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Inclusive lower bound.
    pub from_date: DateTime<Utc>,
    /// Upper bound; open-ended when `None`.
    pub to_date: Option<DateTime<Utc>>,
    /// Maximum number of records.
    pub limit: Option<u32>,
}

impl HistoryQuery {
    /// Everything since `from_date`.
    #[must_use]
    pub const fn since(from_date: DateTime<Utc>) -> Self {
        Self {
            from_date,
            to_date: None,
            limit: None,
        }
    }

    /// Sets the upper bound.
    #[must_use]
    pub const fn until(mut self, to_date: DateTime<Utc>) -> Self {
        self.to_date = Some(to_date);
        self
    }

    /// Sets the record limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
