//! Push transports.
//!
//! A [`PushTransport`] opens one connection to the merchant push endpoint
//! and yields [`TransportEvent`]s until the connection drops. Reconnecting
//! is the job of the push loop, which asks the transport for its
//! [`ReconnectPolicy`].
//!
//! - [`sse`] - Server-Sent-Events over a long-lived `GET`, parsed by
//!   `eventsource-stream`
//! - [`socketio`] - socket.io over WebSocket, via the `rust_socketio` client

pub mod socketio;
pub mod sse;

use std::fmt;
use std::time::Duration;

use chiefpay::RawFrame;
use chiefpay::profile::TransportKind;
use futures_util::stream::BoxStream;
use url::Url;

use crate::error::ClientError;

pub use socketio::SocketIoTransport;
pub use sse::SseTransport;

/// Something read from an open push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One event.
    Frame(RawFrame),
    /// The server changed the reconnect delay (SSE `retry:` field).
    Retry(Duration),
}

/// Stream of events from one connection; ends when the connection closes.
pub type FrameStream = BoxStream<'static, Result<TransportEvent, ClientError>>;

/// Parameters for opening a push connection.
#[derive(Clone)]
pub struct OpenParams {
    /// Full URL of the push endpoint.
    pub endpoint: Url,
    /// Merchant API key.
    pub api_key: String,
    /// Resume cursor to send, if the profile resumes.
    pub cursor: Option<u64>,
}

impl fmt::Debug for OpenParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenParams")
            .field("endpoint", &self.endpoint.as_str())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

/// How long to wait between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// The same delay every time; the server may override it.
    Fixed(Duration),
    /// Starts at `initial` and doubles up to `max`; resets after a
    /// successful connect.
    Exponential {
        /// First delay.
        initial: Duration,
        /// Upper bound.
        max: Duration,
    },
}

impl ReconnectPolicy {
    /// Delay to apply after `delay`, given this policy.
    #[must_use]
    pub fn next_delay(self, delay: Duration) -> Duration {
        match self {
            Self::Fixed(_) => delay,
            Self::Exponential { max, .. } => delay.saturating_mul(2).min(max),
        }
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn initial(self) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential { initial, .. } => initial,
        }
    }
}

/// A push connection factory.
#[async_trait::async_trait]
pub trait PushTransport: Send + Sync {
    /// Which transport this is.
    fn kind(&self) -> TransportKind;

    /// Delay policy between connection attempts.
    fn reconnect_policy(&self) -> ReconnectPolicy;

    /// Opens one connection and completes its handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the connection cannot be established or the
    /// server rejects it.
    async fn open(&self, params: &OpenParams) -> Result<FrameStream, ClientError>;
}
