//! Entities produced by the merchant backend.
//!
//! The client never mutates these beyond resolving their timestamp fields.

use serde::{Deserialize, Serialize};

use crate::profile::DateMode;
use crate::timestamp::{ResolveDates, Timestamp};

/// A deposit address on one chain/token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainToken {
    /// Chain identifier (e.g. `"TRON"`, `"BSC"`).
    pub chain: String,
    /// Token symbol (e.g. `"USDT"`).
    pub token: String,
    /// Deposit address.
    pub address: String,
    /// Token rate at the time the address was issued.
    #[serde(default)]
    pub token_rate: String,
}

/// Fiat payment details attached to an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatDetails {
    /// Payment method name.
    pub name: String,
    /// Amount due in fiat.
    pub amount: String,
    /// Amount paid so far.
    pub payed_amount: String,
    /// Fee rate applied.
    pub fee_rate: String,
    /// Bank name.
    pub bank: String,
    /// Transfer requisites.
    pub requisites: String,
    /// Card holder name.
    pub card_owner: String,
}

/// A permanently assigned deposit address set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticWallet {
    /// Wallet UUID.
    pub id: String,
    /// The merchant's own reference the wallet was created for.
    #[serde(alias = "additional", alias = "userId")]
    pub order_id: String,
    /// Deposit addresses.
    #[serde(default)]
    pub addresses: Vec<ChainToken>,
}

/// An on-chain payment received into a merchant wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash.
    pub txid: String,
    /// Chain identifier.
    pub chain: String,
    /// Token symbol.
    pub token: String,
    /// Amount in token units.
    pub value: String,
    /// Amount in USD.
    pub usd: String,
    /// Fee charged.
    pub fee: String,
    /// When the backend recorded the payment.
    pub created_at: Timestamp,
    /// Block timestamp.
    pub block_created_at: Timestamp,
    /// Receiving wallet.
    pub wallet: StaticWallet,
}

impl ResolveDates for Transaction {
    fn resolve_dates(&mut self, mode: DateMode) {
        self.created_at.resolve_dates(mode);
        self.block_created_at.resolve_dates(mode);
    }
}

/// Transaction record pushed by the original SSE API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTransaction {
    /// The merchant's user the deposit address belongs to.
    pub user_id: String,
    /// Token symbol.
    pub token: String,
    /// Amount in token units.
    pub value: String,
    /// Amount in USD.
    pub usd: serde_json::Number,
    /// Transaction hash.
    pub txid: String,
}

/// Invoice lifecycle status.
///
/// Older API versions spell the statuses in lower case; both spellings are
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Awaiting payment.
    #[serde(alias = "wait")]
    Wait,
    /// Paid in full.
    #[serde(alias = "complete")]
    Complete,
    /// Expired before being paid.
    #[serde(alias = "expired")]
    Expired,
    /// Paid more than requested.
    #[serde(alias = "over_paid")]
    OverPaid,
    /// Paid less than requested.
    #[serde(alias = "under_paid")]
    UnderPaid,
}

impl InvoiceStatus {
    /// Returns `true` once the server will not move the invoice any further.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Wait)
    }
}

/// A priced, time-bounded payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Invoice UUID.
    pub id: String,
    /// The merchant's own order reference.
    pub order_id: String,
    /// Text shown on the payment page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: InvoiceStatus,
    /// Requested amount; `None` accepts any amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Amount paid so far.
    pub payed_amount: String,
    /// Allowed relative inaccuracy of the paid amount.
    pub accuracy: String,
    /// Discount (positive) or markup (negative).
    pub discount: String,
    /// Whether the commission is added to the amount.
    pub fee_included: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Expiry time.
    pub expired_at: Timestamp,
    /// Deposit addresses with per-token rates.
    #[serde(default)]
    pub addresses: Vec<ChainToken>,
    /// Fiat payment options.
    #[serde(rename = "FiatDetails", default)]
    pub fiat_details: Vec<FiatDetails>,
}

impl ResolveDates for Invoice {
    fn resolve_dates(&mut self, mode: DateMode) {
        self.created_at.resolve_dates(mode);
        self.expired_at.resolve_dates(mode);
    }
}

/// One page of invoice history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceHistory {
    /// Invoices in the requested window.
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    /// Total number of matching invoices, regardless of `limit`.
    #[serde(default)]
    pub total_count: u64,
}

impl ResolveDates for InvoiceHistory {
    fn resolve_dates(&mut self, mode: DateMode) {
        self.invoices.resolve_dates(mode);
    }
}

/// One page of transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsHistory {
    /// Transactions in the requested window.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Total number of matching transactions, regardless of `limit`.
    #[serde(default)]
    pub total_count: u64,
}

impl ResolveDates for TransactionsHistory {
    fn resolve_dates(&mut self, mode: DateMode) {
        self.transactions.resolve_dates(mode);
    }
}

impl ResolveDates for StaticWallet {
    fn resolve_dates(&mut self, _mode: DateMode) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_status_accepts_both_cases() {
        let upper: InvoiceStatus = serde_json::from_str("\"OVER_PAID\"").unwrap();
        let lower: InvoiceStatus = serde_json::from_str("\"over_paid\"").unwrap();
        assert_eq!(upper, InvoiceStatus::OverPaid);
        assert_eq!(lower, InvoiceStatus::OverPaid);
        assert!(!InvoiceStatus::Wait.is_final());
        assert!(InvoiceStatus::Expired.is_final());
    }

    #[test]
    fn test_wallet_linking_key_aliases() {
        let wallet: StaticWallet =
            serde_json::from_str(r#"{"id":"w1","additional":"o1","addresses":[]}"#).unwrap();
        assert_eq!(wallet.order_id, "o1");
        let wallet: StaticWallet = serde_json::from_str(r#"{"id":"w2","userId":"u7"}"#).unwrap();
        assert_eq!(wallet.order_id, "u7");
        assert!(wallet.addresses.is_empty());
    }

    #[test]
    fn test_invoice_fiat_details_wire_key() {
        let json = r#"{
            "id": "inv-1",
            "orderId": "o-1",
            "status": "WAIT",
            "payedAmount": "0",
            "accuracy": "0",
            "discount": "0",
            "feeIncluded": false,
            "createdAt": "2024-05-01T12:00:00.000Z",
            "expiredAt": "2024-05-01T13:00:00.000Z",
            "addresses": [],
            "FiatDetails": [{
                "name": "card", "amount": "10", "payedAmount": "0", "feeRate": "0.01",
                "bank": "B", "requisites": "0000", "cardOwner": "A B"
            }]
        }"#;
        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.fiat_details.len(), 1);
        assert_eq!(invoice.fiat_details[0].card_owner, "A B");
        assert!(invoice.amount.is_none());

        let back = serde_json::to_value(&invoice).unwrap();
        assert!(back.get("FiatDetails").is_some());
    }
}
