#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the ChiefPay merchant API.
//!
//! This crate holds everything that does not touch the network: the wire
//! entities returned by the merchant API, the push-notification decoder, the
//! fixed-point rate conversion and the [`ApiProfile`] descriptor that captures
//! how successive API versions differ from one another.
//!
//! The HTTP client, push transports and the public facade live in
//! `chiefpay-http`.
//!
//! # Modules
//!
//! - [`decode`] - Push frame decoding and the resume cursor
//! - [`error`] - API and decode error types
//! - [`profile`] - Per-version capability descriptor
//! - [`proto`] - Wire entities, request parameters and the response envelope
//! - [`rates`] - Exchange-rate tables, fixed-point scaling and the rate cache
//! - [`timestamp`] - Timestamps that are either parsed or passed through
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits tracing events from the decoder and the rate cache

pub mod decode;
pub mod error;
pub mod profile;
pub mod proto;
pub mod rates;
pub mod timestamp;

pub use decode::{Cursor, Decoded, NotificationDecoder, RawFrame};
pub use error::{ApiError, DecodeError, ErrorCode};
pub use profile::ApiProfile;
pub use proto::{Invoice, InvoiceStatus, Notification, StaticWallet, Transaction};
pub use rates::{RateCache, Rates};
pub use timestamp::Timestamp;
