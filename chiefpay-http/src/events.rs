//! Client events and observers.
//!
//! Every lifecycle change and decoded push message is published as a
//! [`ClientEvent`] on a `tokio::sync::broadcast` channel; subscribe with
//! [`ChiefPayClient::subscribe`](crate::ChiefPayClient::subscribe). For
//! callback-style consumption register an [`EventHandler`], whose methods all
//! default to no-ops.

use std::fmt;
use std::sync::Arc;

use chiefpay::{Notification, Rates};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::ClientError;

/// Something the client wants its owner to know about.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The push channel finished its handshake.
    Connected,
    /// A connection attempt, a dropped stream or a frame that failed to decode.
    Error(Arc<ClientError>),
    /// A transaction or invoice notification.
    Notification(Notification),
    /// The rate table was replaced.
    Rates(Rates),
    /// A static wallet stopped accepting deposits.
    WalletExpire(Value),
}

/// Tag of a [`ClientEvent`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`ClientEvent::Connected`]
    Connected,
    /// [`ClientEvent::Error`]
    Error,
    /// [`ClientEvent::Notification`]
    Notification,
    /// [`ClientEvent::Rates`]
    Rates,
    /// [`ClientEvent::WalletExpire`]
    WalletExpire,
}

impl EventKind {
    /// The event name as used by the push API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Notification => "notification",
            Self::Rates => "rates",
            Self::WalletExpire => "walletExpire",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClientEvent {
    /// The tag of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Error(_) => EventKind::Error,
            Self::Notification(_) => EventKind::Notification,
            Self::Rates(_) => EventKind::Rates,
            Self::WalletExpire(_) => EventKind::WalletExpire,
        }
    }
}

/// Observer of client events.
///
/// Handlers run on the push task; keep them short and hand heavy work off to
/// another task.
pub trait EventHandler: Send + Sync {
    /// The push channel connected.
    fn on_connected(&self) {}

    /// Something went wrong; the push channel keeps running.
    fn on_error(&self, _error: &ClientError) {}

    /// A notification arrived.
    fn on_notification(&self, _notification: &Notification) {}

    /// The rate table was replaced.
    fn on_rates(&self, _rates: &Rates) {}

    /// A wallet expired.
    fn on_wallet_expire(&self, _payload: &Value) {}
}

/// Fan-out of events to the broadcast channel and registered handlers.
#[derive(Clone)]
pub(crate) struct EventHub {
    sender: broadcast::Sender<ClientEvent>,
    handlers: Arc<[Arc<dyn EventHandler>]>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.sender.receiver_count())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl EventHub {
    pub(crate) fn new(capacity: usize, handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            handlers: Arc::from(handlers),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        for handler in self.handlers.iter() {
            match &event {
                ClientEvent::Connected => handler.on_connected(),
                ClientEvent::Error(err) => handler.on_error(err),
                ClientEvent::Notification(n) => handler.on_notification(n),
                ClientEvent::Rates(rates) => handler.on_rates(rates),
                ClientEvent::WalletExpire(payload) => handler.on_wallet_expire(payload),
            }
        }
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub(crate) fn error(&self, err: ClientError) {
        self.emit(ClientEvent::Error(Arc::new(err)));
    }
}
