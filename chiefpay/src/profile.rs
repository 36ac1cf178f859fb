//! Per-version capability descriptor.
//!
//! The merchant API went through several revisions that differ in transport,
//! URL layout, payload shape and error format but not in what they do. An
//! [`ApiProfile`] captures those differences so a single client can speak
//! any of them.

use serde::{Deserialize, Serialize};

/// Push transport used by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Server-Sent-Events over a long-lived `GET`.
    Sse,
    /// socket.io (Engine.IO v4) over WebSocket.
    SocketIo,
}

/// How timestamp fields are surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    /// Parse ISO-8601 strings into `DateTime<Utc>`.
    Parse,
    /// Pass ISO-8601 strings through unchanged.
    Raw,
}

/// How pulled or pushed rate values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScaling {
    /// Values are already decimal strings.
    None,
    /// Values are 18-decimal fixed-point integers nested by chain id.
    FixedPoint,
}

/// How a pushed notification body is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discriminator {
    /// A `type` field names the payload (`transaction`, `invoice`, `expired`).
    TypeTag,
    /// Exactly one of `transaction` / `invoice` is non-null.
    FieldPresence,
    /// The body is a bare legacy transaction record.
    LegacyTransaction,
}

/// What a lookup of a missing wallet or invoice returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundMode {
    /// A `NOT_FOUND` error.
    Error,
    /// `None`.
    Null,
}

/// Capability descriptor for one revision of the merchant API.
///
/// Use one of the presets ([`ApiProfile::latest`], [`ApiProfile::v1`],
/// [`ApiProfile::merchant`], [`ApiProfile::legacy`]) or adjust individual
/// fields of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiProfile {
    /// Short identifier (`"latest"`, `"v1"`, `"merchant"`, `"legacy"`).
    pub name: &'static str,
    /// Push transport.
    pub transport: TransportKind,
    /// Path of the push endpoint, relative to the base URL.
    pub push_path: &'static str,
    /// Path prefix for HTTP operations, without slashes.
    pub api_prefix: &'static str,
    /// Whether HTTP responses are wrapped in `{status, data|message}`.
    pub envelope: bool,
    /// Whether the push cursor is re-sent as the `ts` header on reconnect.
    pub resume_cursor: bool,
    /// Notification classification.
    pub discriminator: Discriminator,
    /// Timestamp handling.
    pub dates: DateMode,
    /// Rate value handling.
    pub rate_scaling: RateScaling,
    /// Missing-entity contract for `get_wallet` / `get_invoice`.
    pub not_found: NotFoundMode,
    /// Whether the rate pull endpoint expects `POST` instead of `GET`.
    pub rates_via_post: bool,
    /// JSON key linking a static wallet to the merchant's own record.
    pub wallet_key: &'static str,
    /// JSON key carrying the merchant's reference when creating an invoice.
    pub invoice_key: &'static str,
}

impl ApiProfile {
    /// The current API: socket.io push, parsed dates, `NOT_FOUND` errors.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            name: "latest",
            transport: TransportKind::SocketIo,
            push_path: "/socket.io",
            api_prefix: "v1",
            envelope: true,
            resume_cursor: false,
            discriminator: Discriminator::TypeTag,
            dates: DateMode::Parse,
            rate_scaling: RateScaling::None,
            not_found: NotFoundMode::Error,
            rates_via_post: false,
            wallet_key: "orderId",
            invoice_key: "orderId",
        }
    }

    /// The first enveloped API: socket.io push, raw ISO strings, `null` for
    /// missing entities.
    #[must_use]
    pub const fn v1() -> Self {
        Self {
            name: "v1",
            transport: TransportKind::SocketIo,
            push_path: "/socket.io",
            api_prefix: "v1",
            envelope: true,
            resume_cursor: false,
            discriminator: Discriminator::TypeTag,
            dates: DateMode::Raw,
            rate_scaling: RateScaling::None,
            not_found: NotFoundMode::Null,
            rates_via_post: false,
            wallet_key: "orderId",
            invoice_key: "orderId",
        }
    }

    /// The `MerchantClient` API: SSE push with parsed dates, a flat pushed
    /// rate table and `additional` as the linking key of wallets and
    /// invoices. A transaction notification may name the invoice it paid;
    /// it is still classified by its `type` tag.
    #[must_use]
    pub const fn merchant() -> Self {
        Self {
            name: "merchant",
            transport: TransportKind::Sse,
            push_path: "/api/sse",
            api_prefix: "api",
            envelope: true,
            resume_cursor: true,
            discriminator: Discriminator::TypeTag,
            dates: DateMode::Parse,
            rate_scaling: RateScaling::None,
            not_found: NotFoundMode::Null,
            rates_via_post: true,
            wallet_key: "additional",
            invoice_key: "additional",
        }
    }

    /// The original merchant API: SSE push with a resume cursor, bare JSON
    /// responses and fixed-point rates.
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            name: "legacy",
            transport: TransportKind::Sse,
            push_path: "/api/sse",
            api_prefix: "api",
            envelope: false,
            resume_cursor: true,
            discriminator: Discriminator::LegacyTransaction,
            dates: DateMode::Raw,
            rate_scaling: RateScaling::FixedPoint,
            not_found: NotFoundMode::Null,
            rates_via_post: true,
            wallet_key: "userId",
            invoice_key: "orderId",
        }
    }

    /// Looks up a preset by its [`name`](Self::name).
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "latest" => Some(Self::latest()),
            "v1" => Some(Self::v1()),
            "merchant" => Some(Self::merchant()),
            "legacy" => Some(Self::legacy()),
            _ => None,
        }
    }

    /// Joins an operation path onto the profile's prefix (`"wallet"` → `"v1/wallet"`).
    #[must_use]
    pub fn api_path(&self, path: &str) -> String {
        format!("{}/{}", self.api_prefix, path.trim_start_matches('/'))
    }
}

impl Default for ApiProfile {
    fn default() -> Self {
        Self::latest()
    }
}
