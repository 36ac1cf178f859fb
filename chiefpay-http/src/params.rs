//! Per-operation request mappings.
//!
//! Every HTTP operation of the client is described here as an [`ApiCall`]:
//! method, path under the profile's prefix, query pairs and JSON body. Query
//! values are always strings; dates are formatted as RFC 3339 with
//! millisecond precision and a `Z` suffix.

use chiefpay::ApiProfile;
use chiefpay::proto::{CreateInvoice, CreateWallet, HistoryQuery, InvoiceLookup, WalletLookup};
use chiefpay::timestamp::format_iso;
use reqwest::Method;
use serde_json::{Map, Value, json};

/// A fully described HTTP operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base URL, including the profile's prefix.
    pub path: String,
    /// Human-readable label used in logs and errors (e.g. `"GET /wallet"`).
    pub context: &'static str,
    /// Query pairs, in order.
    pub query: Vec<(&'static str, String)>,
    /// JSON body; `None` for body-less requests.
    pub body: Option<Value>,
}

impl ApiCall {
    fn get(profile: &ApiProfile, path: &str, context: &'static str) -> Self {
        Self {
            method: Method::GET,
            path: profile.api_path(path),
            context,
            query: Vec::new(),
            body: None,
        }
    }

    fn post(profile: &ApiProfile, path: &str, context: &'static str, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::post_empty(profile, path, context)
        }
    }

    fn post_empty(profile: &ApiProfile, path: &str, context: &'static str) -> Self {
        Self {
            method: Method::POST,
            path: profile.api_path(path),
            context,
            query: Vec::new(),
            body: None,
        }
    }

    fn with_query(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }
}

/// `POST {prefix}/wallet`, keyed by the profile's linking key.
#[must_use]
pub fn create_wallet(profile: &ApiProfile, request: &CreateWallet) -> ApiCall {
    let mut body = Map::new();
    body.insert(
        profile.wallet_key.to_owned(),
        Value::String(request.order_id.clone()),
    );
    ApiCall::post(profile, "wallet", "POST /wallet", Value::Object(body))
}

/// `GET {prefix}/wallet?id=` or `?orderId=`.
#[must_use]
pub fn get_wallet(profile: &ApiProfile, lookup: &WalletLookup) -> ApiCall {
    let call = ApiCall::get(profile, "wallet", "GET /wallet");
    match lookup {
        WalletLookup::Id(id) => call.with_query("id", id),
        WalletLookup::OrderId(order_id) => call.with_query("orderId", order_id),
    }
}

/// `POST {prefix}/invoice`, optional fields omitted and the order reference
/// under the profile's invoice linking key.
///
/// # Errors
///
/// Returns the serialization error if the request cannot be encoded.
pub fn create_invoice(
    profile: &ApiProfile,
    request: &CreateInvoice,
) -> Result<ApiCall, serde_json::Error> {
    let mut body = serde_json::to_value(request)?;
    if let Value::Object(map) = &mut body {
        if let Some(order_id) = map.remove("orderId") {
            map.insert(profile.invoice_key.to_owned(), order_id);
        }
    }
    Ok(ApiCall::post(profile, "invoice", "POST /invoice", body))
}

/// `GET {prefix}/invoice?id=` or `?orderId=`.
#[must_use]
pub fn get_invoice(profile: &ApiProfile, lookup: &InvoiceLookup) -> ApiCall {
    let call = ApiCall::get(profile, "invoice", "GET /invoice");
    match lookup {
        InvoiceLookup::Id(id) => call.with_query("id", id),
        InvoiceLookup::OrderId(order_id) => call.with_query("orderId", order_id),
    }
}

/// `POST {prefix}/invoice/cancel`.
#[must_use]
pub fn cancel_invoice(profile: &ApiProfile, id: &str) -> ApiCall {
    ApiCall::post(
        profile,
        "invoice/cancel",
        "POST /invoice/cancel",
        json!({ "id": id }),
    )
}

/// `POST {prefix}/invoice/prolong`.
#[must_use]
pub fn prolong_invoice(profile: &ApiProfile, id: &str) -> ApiCall {
    ApiCall::post(
        profile,
        "invoice/prolong",
        "POST /invoice/prolong",
        json!({ "id": id }),
    )
}

/// `POST {prefix}/transactions` for one batch of ids.
#[must_use]
pub fn transactions(profile: &ApiProfile, ids: &[String]) -> ApiCall {
    ApiCall::post(
        profile,
        "transactions",
        "POST /transactions",
        json!({ "ids": ids }),
    )
}

/// `GET {prefix}/history/invoices`.
#[must_use]
pub fn invoice_history(profile: &ApiProfile, query: &HistoryQuery) -> ApiCall {
    history(
        ApiCall::get(profile, "history/invoices", "GET /history/invoices"),
        query,
    )
}

/// `GET {prefix}/history/transactions`.
#[must_use]
pub fn transactions_history(profile: &ApiProfile, query: &HistoryQuery) -> ApiCall {
    history(
        ApiCall::get(profile, "history/transactions", "GET /history/transactions"),
        query,
    )
}

/// `GET {prefix}/history`: every notification sent in a time window.
#[must_use]
pub fn notification_history(profile: &ApiProfile, query: &HistoryQuery) -> ApiCall {
    history(ApiCall::get(profile, "history", "GET /history"), query)
}

fn history(call: ApiCall, query: &HistoryQuery) -> ApiCall {
    let mut call = call.with_query("fromDate", format_iso(&query.from_date));
    if let Some(to_date) = &query.to_date {
        call = call.with_query("toDate", format_iso(to_date));
    }
    if let Some(limit) = query.limit {
        call = call.with_query("limit", limit.to_string());
    }
    call
}

/// Rate pull; a body-less `POST` on profiles that require it.
#[must_use]
pub fn rates(profile: &ApiProfile) -> ApiCall {
    if profile.rates_via_post {
        ApiCall::post_empty(profile, "rates", "POST /rates")
    } else {
        ApiCall::get(profile, "rates", "GET /rates")
    }
}
