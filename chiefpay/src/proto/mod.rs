//! Wire format types for the ChiefPay merchant API.
//!
//! - [`entities`] - Wallets, invoices and transactions as returned by the API
//! - [`notification`] - Push notification union
//! - [`requests`] - Parameters of the HTTP operations
//! - [`envelope`] - The `{status, data|message}` response wrapper

pub mod entities;
pub mod envelope;
pub mod notification;
pub mod requests;

pub use entities::{
    ChainToken, FiatDetails, Invoice, InvoiceHistory, InvoiceStatus, LegacyTransaction,
    StaticWallet, Transaction, TransactionsHistory,
};
pub use envelope::{Envelope, ErrorMessage};
pub use notification::Notification;
pub use requests::{CreateInvoice, CreateWallet, HistoryQuery, InvoiceLookup, WalletLookup};
