#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP and push client for the ChiefPay merchant API.
//!
//! [`ChiefPayClient`] wraps the request/response operations (wallets,
//! invoices, transactions, history, rates) and a persistent push channel that
//! delivers transaction, invoice, rate and wallet-expiry notifications.
//! Which API revision it speaks is selected by the
//! [`ApiProfile`](chiefpay::ApiProfile) in [`ClientConfig`].
//!
//! # Modules
//!
//! - [`client`] - The public facade and its configuration
//! - [`constants`] - Header names, default URLs, timing constants
//! - [`error`] - Client error type
//! - [`events`] - Client events and observers
//! - [`middleware`] - HTTP 429 retry middleware for reqwest
//! - [`params`] - Per-operation request mappings
//! - [`request`] - Authenticated request/response client
//! - [`transport`] - SSE and socket.io push transports
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing spans around operations and events at connection
//!   lifecycle points

pub mod client;
pub mod constants;
pub mod error;
pub mod events;
pub mod middleware;
pub mod params;
mod push;
pub mod request;
pub mod transport;

pub use client::{ChiefPayClient, ClientConfig};
pub use error::ClientError;
pub use events::{ClientEvent, EventHandler, EventKind};
pub use middleware::RateLimitRetry;
pub use request::RequestClient;
pub use transport::{PushTransport, SocketIoTransport, SseTransport};
