//! Push frame decoding and the resume cursor.
//!
//! Both push transports reduce their wire format to a [`RawFrame`]. The
//! [`NotificationDecoder`] routes each frame by event name, advances the
//! shared [`Cursor`] and turns notification bodies into typed
//! [`Notification`]s according to the active [`ApiProfile`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::DecodeError;
use crate::profile::{ApiProfile, Discriminator};
use crate::proto::{Invoice, LegacyTransaction, Notification, Transaction};
use crate::timestamp::ResolveDates;

/// Event names understood by the decoder.
pub mod event {
    /// Default SSE event name.
    pub const MESSAGE: &str = "message";
    /// Transaction or invoice notification.
    pub const NOTIFICATION: &str = "notification";
    /// Full rate table.
    pub const RATES: &str = "rates";
    /// A static wallet stopped accepting deposits.
    pub const WALLET_EXPIRE: &str = "walletExpire";
    /// Keep-alive.
    pub const PING: &str = "ping";
}

/// One event as delivered by a push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Event name; `None` for unnamed SSE messages.
    pub event: Option<String>,
    /// Event identifier, used as the resume cursor.
    pub id: Option<String>,
    /// Event body.
    pub data: String,
}

impl RawFrame {
    /// A frame with the given event name and body.
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            id: None,
            data: data.into(),
        }
    }

    /// Sets the event identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Resume token shared between the decoder and the push transport.
///
/// Clones share the same underlying value.
#[derive(Debug, Clone, Default)]
pub struct Cursor(Arc<AtomicU64>);

impl Cursor {
    /// Creates a cursor starting at `initial`.
    #[must_use]
    pub fn new(initial: u64) -> Self {
        Self(Arc::new(AtomicU64::new(initial)))
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Replaces the value.
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Release);
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A transaction or invoice notification.
    Notification(Notification),
    /// A raw rate table, to be handed to the rate cache.
    Rates(Value),
    /// A wallet-expiry payload.
    WalletExpire(Value),
    /// Keep-alive.
    Ping,
    /// An event name the client does not handle.
    Ignored(String),
}

/// Turns [`RawFrame`]s into [`Decoded`] values.
#[derive(Debug, Clone)]
pub struct NotificationDecoder {
    profile: ApiProfile,
    cursor: Cursor,
}

impl NotificationDecoder {
    /// Creates a decoder that advances `cursor`.
    #[must_use]
    pub const fn new(profile: ApiProfile, cursor: Cursor) -> Self {
        Self { profile, cursor }
    }

    /// The cursor this decoder advances.
    #[must_use]
    pub const fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Decodes one frame.
    ///
    /// A numeric frame id advances the cursor before the body is parsed, so a
    /// malformed body does not cause the event to be replayed on reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the body is not valid JSON or does not
    /// match the profile's notification shape.
    pub fn decode(&self, frame: &RawFrame) -> Result<Decoded, DecodeError> {
        if let Some(id) = frame.id.as_deref() {
            self.advance_cursor(id);
        }
        match frame.event.as_deref() {
            None | Some(event::MESSAGE | event::NOTIFICATION) => Ok(Decoded::Notification(
                self.decode_notification(serde_json::from_str(&frame.data)?)?,
            )),
            Some(event::RATES) => Ok(Decoded::Rates(serde_json::from_str(&frame.data)?)),
            Some(event::WALLET_EXPIRE) => {
                Ok(Decoded::WalletExpire(serde_json::from_str(&frame.data)?))
            }
            Some(event::PING) => Ok(Decoded::Ping),
            Some(other) => Ok(Decoded::Ignored(other.to_owned())),
        }
    }

    /// Classifies a notification body and resolves its dates, without
    /// touching the cursor. Used for bodies that arrive over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the body does not match the profile's
    /// notification shape.
    pub fn decode_notification(&self, body: Value) -> Result<Notification, DecodeError> {
        let mut notification = self.classify(body)?;
        notification.resolve_dates(self.profile.dates);
        Ok(notification)
    }

    fn advance_cursor(&self, id: &str) {
        match id.trim().parse::<u64>() {
            Ok(ts) => self.cursor.set(ts),
            Err(_) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(id, "ignoring non-numeric event id");
            }
        }
    }

    fn classify(&self, body: Value) -> Result<Notification, DecodeError> {
        match self.profile.discriminator {
            Discriminator::LegacyTransaction => Ok(Notification::LegacyTransaction(
                serde_json::from_value::<LegacyTransaction>(body)?,
            )),
            Discriminator::FieldPresence => by_field_presence(body),
            Discriminator::TypeTag => {
                let tag = body.get("type").and_then(Value::as_str).map(str::to_owned);
                match tag {
                    Some(tag) => by_type_tag(&tag, body),
                    None => by_field_presence(body),
                }
            }
        }
    }
}

fn take(body: &mut Value, key: &str) -> Value {
    body.get_mut(key).map(Value::take).unwrap_or_default()
}

fn by_type_tag(tag: &str, mut body: Value) -> Result<Notification, DecodeError> {
    match tag {
        "transaction" => {
            let tx: Transaction = serde_json::from_value(take(&mut body, "transaction"))?;
            Ok(Notification::Transaction(tx))
        }
        "invoice" | "expired" => {
            let invoice: Invoice = serde_json::from_value(take(&mut body, "invoice"))?;
            Ok(if tag == "expired" {
                Notification::Expired(invoice)
            } else {
                Notification::Invoice(invoice)
            })
        }
        other => Err(DecodeError::UnknownType(other.to_owned())),
    }
}

fn by_field_presence(mut body: Value) -> Result<Notification, DecodeError> {
    let transaction = take(&mut body, "transaction");
    let invoice = take(&mut body, "invoice");
    match (transaction.is_null(), invoice.is_null()) {
        (false, true) => Ok(Notification::Transaction(serde_json::from_value(
            transaction,
        )?)),
        (true, false) => Ok(Notification::Invoice(serde_json::from_value(invoice)?)),
        _ => Err(DecodeError::AmbiguousPayload),
    }
}
