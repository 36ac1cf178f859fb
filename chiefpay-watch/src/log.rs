//! Writes client events to the `tracing` subscriber.

use chiefpay::{Notification, Rates};
use chiefpay_http::{ClientError, EventHandler};
use serde_json::Value;

/// [`EventHandler`] that logs every event at `info`, errors at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEvents;

impl EventHandler for LogEvents {
    fn on_connected(&self) {
        tracing::info!("push channel connected");
    }

    fn on_error(&self, error: &ClientError) {
        tracing::warn!(%error, "client error");
    }

    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::Transaction(tx) => tracing::info!(
                txid = %tx.txid,
                chain = %tx.chain,
                token = %tx.token,
                value = %tx.value,
                usd = %tx.usd,
                order_id = %tx.wallet.order_id,
                "transaction"
            ),
            Notification::Invoice(invoice) | Notification::Expired(invoice) => tracing::info!(
                kind = notification.type_tag(),
                id = %invoice.id,
                order_id = %invoice.order_id,
                status = ?invoice.status,
                payed_amount = %invoice.payed_amount,
                "invoice"
            ),
            Notification::LegacyTransaction(tx) => tracing::info!(
                txid = %tx.txid,
                user_id = %tx.user_id,
                token = %tx.token,
                value = %tx.value,
                usd = %tx.usd,
                "transaction"
            ),
        }
    }

    fn on_rates(&self, rates: &Rates) {
        tracing::info!(count = rates.len(), "rates updated");
    }

    fn on_wallet_expire(&self, payload: &Value) {
        tracing::info!(%payload, "wallet expired");
    }
}
