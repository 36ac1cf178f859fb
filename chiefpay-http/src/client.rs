//! The public client.
//!
//! [`ChiefPayClient`] composes the [`RequestClient`], the push loop, the
//! [`RateCache`] and the event hub behind one handle. Every API revision is
//! served by the same client; pass the matching [`ApiProfile`] in
//! [`ClientConfig`].
//!
//! ```no_run
//! use chiefpay::proto::CreateInvoice;
//! use chiefpay_http::{ChiefPayClient, ClientConfig, ClientEvent};
//!
//! # async fn run() -> Result<(), chiefpay_http::ClientError> {
//! let client = ChiefPayClient::new(ClientConfig::new("my-api-key"))?;
//! let mut events = client.subscribe();
//! client.connect().await;
//!
//! let invoice = client
//!     .create_invoice(&CreateInvoice::new("order-1").with_amount("25"))
//!     .await?;
//! println!("pay at {}", invoice.id);
//!
//! while let Ok(event) = events.recv().await {
//!     if let ClientEvent::Notification(n) = event {
//!         println!("{}", n.type_tag());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chiefpay::profile::{NotFoundMode, TransportKind};
use chiefpay::proto::{
    CreateInvoice, CreateWallet, HistoryQuery, Invoice, InvoiceHistory, InvoiceLookup,
    StaticWallet, Transaction, TransactionsHistory, WalletLookup,
};
use chiefpay::timestamp::ResolveDates;
use chiefpay::{ApiError, ApiProfile, Cursor, Notification, NotificationDecoder, RateCache, Rates};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument, warn};
use url::Url;

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_EVENT_CAPACITY, MIN_RATES_INTERVAL, TRANSACTION_BATCH_SIZE,
};
use crate::error::ClientError;
use crate::events::{ClientEvent, EventHandler, EventHub};
use crate::middleware::RateLimitRetry;
use crate::params::{self, ApiCall};
use crate::push::{self, PushContext};
use crate::request::RequestClient;
use crate::transport::{PushTransport, SocketIoTransport, SseTransport};

/// Construction parameters of a [`ChiefPayClient`].
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    base_url: String,
    ts: u64,
    profile: ApiProfile,
    timeout: Option<Duration>,
    max_rate_limit_retries: Option<u32>,
    min_rates_interval: Duration,
    event_capacity: usize,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("ts", &self.ts)
            .field("profile", &self.profile.name)
            .field("timeout", &self.timeout)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("min_rates_interval", &self.min_rates_interval)
            .field("event_capacity", &self.event_capacity)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl ClientConfig {
    /// Configuration for the production API with the latest profile.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            ts: 0,
            profile: ApiProfile::latest(),
            timeout: None,
            max_rate_limit_retries: None,
            min_rates_interval: MIN_RATES_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            handlers: Vec::new(),
        }
    }

    /// Sets the API root (`http` or `https`).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the initial resume cursor.
    #[must_use]
    pub const fn with_ts(mut self, ts: u64) -> Self {
        self.ts = ts;
        self
    }

    /// Selects the API revision.
    #[must_use]
    pub const fn with_profile(mut self, profile: ApiProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Applies a timeout to every HTTP request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Gives up on a request after this many 429 retries.
    #[must_use]
    pub const fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = Some(retries);
        self
    }

    /// Sets the minimum interval between two rate pulls.
    #[must_use]
    pub const fn with_min_rates_interval(mut self, interval: Duration) -> Self {
        self.min_rates_interval = interval;
        self
    }

    /// Sets the capacity of the event channel.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Registers an observer called for every event.
    #[must_use]
    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// The API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The selected profile.
    #[must_use]
    pub const fn profile(&self) -> &ApiProfile {
        &self.profile
    }

    /// The initial resume cursor.
    #[must_use]
    pub const fn ts(&self) -> u64 {
        self.ts
    }
}

struct PushHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Client for the ChiefPay merchant API.
pub struct ChiefPayClient {
    requests: RequestClient,
    api_key: String,
    push_endpoint: Url,
    transport: Arc<dyn PushTransport>,
    cursor: Cursor,
    rates: Arc<RateCache>,
    min_rates_interval: Duration,
    events: EventHub,
    last_ping: Arc<RwLock<Option<DateTime<Utc>>>>,
    push: Mutex<Option<PushHandle>>,
}

impl fmt::Debug for ChiefPayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChiefPayClient")
            .field("requests", &self.requests)
            .field("push_endpoint", &self.push_endpoint.as_str())
            .field("transport", &self.transport.kind())
            .field("cursor", &self.cursor.get())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl ChiefPayClient {
    /// Creates a client. Nothing is sent until an operation is called or
    /// [`connect`](Self::connect) opens the push channel.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the API key is empty or the base
    /// URL is not `http`/`https`, and [`ClientError::UrlParse`] if it is not
    /// a URL at all.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::Config("API key must not be empty".to_owned()));
        }
        let profile = config.profile;
        let retry = RateLimitRetry::new().with_max_retries_opt(config.max_rate_limit_retries);
        let requests = RequestClient::new(
            &config.base_url,
            config.api_key.clone(),
            profile,
            RequestClient::http_client(retry),
        )?
        .with_timeout(config.timeout);

        let scheme = requests.base_url().scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ClientError::Config(format!(
                "base URL must be http or https, got {scheme}"
            )));
        }

        let push_endpoint = requests
            .base_url()
            .join(profile.push_path.trim_start_matches('/'))
            .map_err(|source| ClientError::UrlParse {
                context: "Failed to construct push endpoint URL",
                source,
            })?;
        let transport: Arc<dyn PushTransport> = match profile.transport {
            TransportKind::Sse => Arc::new(SseTransport::default()),
            TransportKind::SocketIo => Arc::new(SocketIoTransport::new()),
        };

        Ok(Self {
            requests,
            api_key: config.api_key,
            push_endpoint,
            transport,
            cursor: Cursor::new(config.ts),
            rates: Arc::new(RateCache::new(profile.rate_scaling)),
            min_rates_interval: config.min_rates_interval,
            events: EventHub::new(config.event_capacity, config.handlers),
            last_ping: Arc::new(RwLock::new(None)),
            push: Mutex::new(None),
        })
    }

    /// Replaces the push transport selected by the profile.
    #[must_use]
    pub fn with_transport(mut self, transport: impl PushTransport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// The active profile.
    #[must_use]
    pub const fn profile(&self) -> &ApiProfile {
        self.requests.profile()
    }

    /// Which push transport [`connect`](Self::connect) opens.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// The full push endpoint URL.
    #[must_use]
    pub const fn push_endpoint(&self) -> &Url {
        &self.push_endpoint
    }

    /// Subscribes to client events. Events emitted before subscribing are
    /// not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Opens the push channel in a background task. Calling it while
    /// connected does nothing.
    pub async fn connect(&self) {
        let mut push = self.push.lock().await;
        if push.as_ref().is_some_and(|p| !p.task.is_finished()) {
            return;
        }
        let profile = *self.profile();
        let ctx = PushContext {
            transport: Arc::clone(&self.transport),
            endpoint: self.push_endpoint.clone(),
            api_key: self.api_key.clone(),
            resume_cursor: profile.resume_cursor,
            decoder: NotificationDecoder::new(profile, self.cursor.clone()),
            rates: Arc::clone(&self.rates),
            events: self.events.clone(),
            last_ping: Arc::clone(&self.last_ping),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(push::run(ctx, cancel.clone()));
        *push = Some(PushHandle { cancel, task });
    }

    /// Stops the push channel and waits for the push task to exit. No event
    /// is emitted afterwards. In-flight HTTP requests are not affected.
    /// Calling it while disconnected does nothing.
    pub async fn disconnect(&self) {
        let handle = self.push.lock().await.take();
        if let Some(PushHandle { cancel, task }) = handle {
            cancel.cancel();
            match task.await {
                Ok(()) => {
                    #[cfg(feature = "telemetry")]
                    debug!("push channel stopped");
                }
                Err(err) => {
                    #[cfg(feature = "telemetry")]
                    warn!(error = %err, "push task ended abnormally");
                    #[cfg(not(feature = "telemetry"))]
                    drop(err);
                }
            }
        }
    }

    /// Whether the push task is running.
    pub async fn is_connected(&self) -> bool {
        self.push
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.task.is_finished())
    }

    /// The resume cursor: id of the last push event processed.
    #[must_use]
    pub fn ts(&self) -> u64 {
        self.cursor.get()
    }

    /// When the last `ping` event arrived.
    pub async fn last_ping(&self) -> Option<DateTime<Utc>> {
        *self.last_ping.read().await
    }

    /// The latest rate table; empty until the first update.
    pub async fn rates(&self) -> Rates {
        self.rates.rates().await
    }

    /// When the rate table was last replaced.
    pub async fn rates_updated_at(&self) -> Option<Instant> {
        self.rates.last_update().await
    }

    /// Replaces the rate table with a pushed or externally obtained payload
    /// and emits [`ClientEvent::Rates`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if `raw` has the wrong shape.
    pub async fn handle_rates(&self, raw: Value) -> Result<Rates, ClientError> {
        let rates = self.rates.handle_rates(raw).await?;
        self.events.emit(ClientEvent::Rates(rates.clone()));
        Ok(rates)
    }

    /// Pulls the rate table.
    ///
    /// The latest API pushes rates on its own; pulling is kept for older
    /// revisions and is throttled to one call per configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RatesThrottled`] without touching the network if
    /// the previous pull started too recently, or any request error.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.update_rates", skip_all, err)
    )]
    pub async fn update_rates(&self) -> Result<Rates, ClientError> {
        self.rates
            .try_begin_pull(self.min_rates_interval)
            .await
            .map_err(|retry_in| ClientError::RatesThrottled { retry_in })?;
        let raw = self.requests.execute(params::rates(self.profile())).await?;
        self.handle_rates(raw).await
    }

    /// Creates a static wallet.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server rejects it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.create_wallet", skip_all, err)
    )]
    pub async fn create_wallet(&self, request: &CreateWallet) -> Result<StaticWallet, ClientError> {
        self.fetch(params::create_wallet(self.profile(), request))
            .await
    }

    /// Looks up a static wallet.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails. A missing wallet is
    /// `Ok(None)` or a `NOT_FOUND` [`ClientError::Api`], depending on the
    /// profile.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.get_wallet", skip_all, err)
    )]
    pub async fn get_wallet(
        &self,
        lookup: &WalletLookup,
    ) -> Result<Option<StaticWallet>, ClientError> {
        self.lookup(params::get_wallet(self.profile(), lookup), "Wallet not found")
            .await
    }

    /// Creates an invoice.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server rejects it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.create_invoice", skip_all, err)
    )]
    pub async fn create_invoice(&self, request: &CreateInvoice) -> Result<Invoice, ClientError> {
        let call = params::create_invoice(self.profile(), request).map_err(|source| {
            ClientError::Json {
                context: "POST /invoice",
                source,
            }
        })?;
        self.fetch(call).await
    }

    /// Looks up an invoice.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails. A missing invoice is
    /// `Ok(None)` or a `NOT_FOUND` [`ClientError::Api`], depending on the
    /// profile.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.get_invoice", skip_all, err)
    )]
    pub async fn get_invoice(&self, lookup: &InvoiceLookup) -> Result<Option<Invoice>, ClientError> {
        self.lookup(params::get_invoice(self.profile(), lookup), "Invoice not found")
            .await
    }

    /// Cancels an unpaid invoice.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server rejects it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.cancel_invoice", skip_all, err)
    )]
    pub async fn cancel_invoice(&self, id: &str) -> Result<Invoice, ClientError> {
        self.fetch(params::cancel_invoice(self.profile(), id)).await
    }

    /// Extends the expiry of an invoice.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server rejects it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.prolong_invoice", skip_all, err)
    )]
    pub async fn prolong_invoice(&self, id: &str) -> Result<Invoice, ClientError> {
        self.fetch(params::prolong_invoice(self.profile(), id)).await
    }

    /// Looks up transactions by id.
    ///
    /// Ids are sent in batches of at most 100, one batch after the other;
    /// the results are concatenated in request order.
    ///
    /// # Errors
    ///
    /// Returns the first batch error; earlier batches are discarded.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.transactions", skip_all, fields(ids = ids.len()), err)
    )]
    pub async fn transactions(&self, ids: &[String]) -> Result<Vec<Transaction>, ClientError> {
        let mut out = Vec::with_capacity(ids.len());
        for batch in ids.chunks(TRANSACTION_BATCH_SIZE) {
            let page: Vec<Transaction> = self
                .fetch(params::transactions(self.profile(), batch))
                .await?;
            out.extend(page);
        }
        Ok(out)
    }

    /// Invoices created in a time window.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server rejects it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.invoice_history", skip_all, err)
    )]
    pub async fn invoice_history(&self, query: &HistoryQuery) -> Result<InvoiceHistory, ClientError> {
        self.fetch(params::invoice_history(self.profile(), query))
            .await
    }

    /// Transactions received in a time window.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server rejects it.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.transactions_history", skip_all, err)
    )]
    pub async fn transactions_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<TransactionsHistory, ClientError> {
        self.fetch(params::transactions_history(self.profile(), query))
            .await
    }

    /// Every notification the server sent in a time window, oldest first.
    ///
    /// Bodies are classified and their dates resolved exactly like pushed
    /// ones; the resume cursor is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails, and
    /// [`ClientError::Decode`] if an entry is not a notification.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.notification_history", skip_all, err)
    )]
    pub async fn notification_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<Notification>, ClientError> {
        let call = params::notification_history(self.profile(), query);
        let context = call.context;
        let data = self.requests.execute(call).await?;
        let entries: Vec<Value> =
            serde_json::from_value(data).map_err(|source| ClientError::Json { context, source })?;
        let decoder = NotificationDecoder::new(*self.profile(), Cursor::default());
        entries
            .into_iter()
            .map(|entry| decoder.decode_notification(entry).map_err(ClientError::from))
            .collect()
    }

    async fn fetch<T>(&self, call: ApiCall) -> Result<T, ClientError>
    where
        T: DeserializeOwned + ResolveDates,
    {
        let mut value: T = self.requests.fetch(call).await?;
        value.resolve_dates(self.profile().dates);
        Ok(value)
    }

    /// Fetches an entity that may not exist, mapping `data: null` per profile.
    async fn lookup<T>(&self, call: ApiCall, missing: &str) -> Result<Option<T>, ClientError>
    where
        T: DeserializeOwned + ResolveDates,
    {
        let context = call.context;
        let data = self.requests.execute(call).await?;
        if data.is_null() {
            return match self.profile().not_found {
                NotFoundMode::Null => Ok(None),
                NotFoundMode::Error => Err(ApiError::not_found(missing).into()),
            };
        }
        let mut value: T =
            serde_json::from_value(data).map_err(|source| ClientError::Json { context, source })?;
        value.resolve_dates(self.profile().dates);
        Ok(Some(value))
    }
}

impl Drop for ChiefPayClient {
    fn drop(&mut self) {
        if let Some(handle) = self.push.get_mut().take() {
            handle.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FrameStream, OpenParams, ReconnectPolicy, TransportEvent};
    use chiefpay::profile::TransportKind;
    use chiefpay::{ErrorCode, RawFrame};
    use futures_util::StreamExt;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const WAIT: Duration = Duration::from_secs(5);

    fn transaction_json(txid: &str) -> Value {
        json!({
            "txid": txid,
            "chain": "TRON",
            "token": "USDT",
            "value": "1",
            "usd": "1",
            "fee": "0",
            "createdAt": "2024-05-01T12:00:00.000Z",
            "blockCreatedAt": "2024-05-01T12:00:00.000Z",
            "wallet": {"id": "w-1", "orderId": "o-1", "addresses": []}
        })
    }

    struct EchoTransactions;

    impl Respond for EchoTransactions {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let data: Vec<Value> = body["ids"]
                .as_array()
                .unwrap()
                .iter()
                .map(|id| transaction_json(id.as_str().unwrap()))
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({"status": "success", "data": data}))
        }
    }

    fn client(server: &MockServer, profile: ApiProfile) -> ChiefPayClient {
        ChiefPayClient::new(
            ClientConfig::new("test-key")
                .with_base_url(server.uri())
                .with_profile(profile),
        )
        .unwrap()
    }

    async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
        tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            ChiefPayClient::new(ClientConfig::new("  ")),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ChiefPayClient::new(ClientConfig::new("k").with_base_url("ftp://example.com")),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ChiefPayClient::new(ClientConfig::new("k").with_base_url("not a url")),
            Err(ClientError::UrlParse { .. })
        ));

        let client = ChiefPayClient::new(ClientConfig::new("k")).unwrap();
        assert_eq!(
            client.push_endpoint().as_str(),
            "https://api.chiefpay.org/socket.io"
        );
        let legacy = ChiefPayClient::new(
            ClientConfig::new("k")
                .with_base_url("http://localhost:3000/")
                .with_profile(ApiProfile::legacy())
                .with_ts(17),
        )
        .unwrap();
        assert_eq!(legacy.push_endpoint().as_str(), "http://localhost:3000/api/sse");
        assert_eq!(legacy.ts(), 17);
        assert_eq!(legacy.transport_kind(), TransportKind::Sse);
        assert_eq!(client.transport_kind(), TransportKind::SocketIo);
    }

    #[tokio::test]
    async fn test_transactions_are_batched_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .respond_with(EchoTransactions)
            .expect(2)
            .mount(&server)
            .await;

        let ids: Vec<String> = (0..120).map(|i| format!("tx-{i}")).collect();
        let txs = client(&server, ApiProfile::latest())
            .transactions(&ids)
            .await
            .unwrap();

        assert_eq!(txs.len(), 120);
        assert!(txs.iter().zip(&ids).all(|(tx, id)| &tx.txid == id));

        let requests = server.received_requests().await.unwrap();
        let sizes: Vec<usize> = requests
            .iter()
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                body["ids"].as_array().unwrap().len()
            })
            .collect();
        assert_eq!(sizes, vec![100, 20]);
    }

    #[tokio::test]
    async fn test_create_then_get_wallet() {
        let server = MockServer::start().await;
        let wallet = json!({
            "id": "w-1",
            "orderId": "o-1",
            "addresses": [{"chain": "TRON", "token": "USDT", "address": "T123"}]
        });
        Mock::given(method("POST"))
            .and(path("/v1/wallet"))
            .and(header("x-api-key", "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"orderId": "o-1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "data": wallet.clone()})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/wallet"))
            .and(query_param("orderId", "o-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "data": wallet})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::latest());
        let created = client.create_wallet(&CreateWallet::new("o-1")).await.unwrap();
        let fetched = client
            .get_wallet(&WalletLookup::OrderId("o-1".to_owned()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.addresses[0].address, "T123");
    }

    #[tokio::test]
    async fn test_missing_invoice_per_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/invoice"))
            .and(query_param("id", "gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": "error",
                "message": {"code": "NOT_FOUND", "message": "Invoice not found", "fields": ["id"]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/invoice"))
            .and(query_param("id", "null"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "success", "data": null})),
            )
            .mount(&server)
            .await;

        let latest = client(&server, ApiProfile::latest());
        let err = latest
            .get_invoice(&InvoiceLookup::Id("gone".to_owned()))
            .await
            .unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.code, Some(ErrorCode::NotFound));
        assert_eq!(api.message, "Invoice not found");
        assert_eq!(api.fields, vec!["id".to_owned()]);

        let err = latest
            .get_invoice(&InvoiceLookup::Id("null".to_owned()))
            .await
            .unwrap_err();
        assert!(err.as_api().is_some_and(ApiError::is_not_found));

        let v1 = client(&server, ApiProfile::v1());
        assert!(
            v1.get_invoice(&InvoiceLookup::Id("null".to_owned()))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_history_dates_follow_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/history/transactions"))
            .and(query_param("fromDate", "2024-05-01T00:00:00.000Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"transactions": [transaction_json("t-1")], "totalCount": 1}
            })))
            .mount(&server)
            .await;

        let from = "2024-05-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let query = HistoryQuery::since(from);

        let parsed = client(&server, ApiProfile::latest())
            .transactions_history(&query)
            .await
            .unwrap();
        assert_eq!(parsed.total_count, 1);
        assert!(matches!(
            parsed.transactions[0].created_at,
            chiefpay::Timestamp::Date(_)
        ));

        let raw = client(&server, ApiProfile::v1())
            .transactions_history(&query)
            .await
            .unwrap();
        assert!(matches!(
            raw.transactions[0].created_at,
            chiefpay::Timestamp::Iso(_)
        ));
    }

    #[tokio::test]
    async fn test_rate_pull_is_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/rates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": [{"name": "BTC", "rate": "65000"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChiefPayClient::new(
            ClientConfig::new("test-key")
                .with_base_url(server.uri())
                .with_min_rates_interval(Duration::from_secs(60)),
        )
        .unwrap();
        let mut rx = client.subscribe();

        let rates = client.update_rates().await.unwrap();
        assert_eq!(rates.get("BTC"), Some("65000"));
        assert!(matches!(next_event(&mut rx).await, ClientEvent::Rates(_)));

        let err = client.update_rates().await.unwrap_err();
        assert!(matches!(err, ClientError::RatesThrottled { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(client.rates().await.get("BTC"), Some("65000"));
    }

    #[tokio::test]
    async fn test_handle_rates_last_write_wins() {
        let client = ChiefPayClient::new(ClientConfig::new("k")).unwrap();
        let mut rx = client.subscribe();
        assert!(client.rates().await.is_empty());

        client
            .handle_rates(json!([{"name": "BTC", "rate": "1"}]))
            .await
            .unwrap();
        client
            .handle_rates(json!([{"name": "BTC", "rate": "2"}]))
            .await
            .unwrap();

        assert_eq!(client.rates().await.get("BTC"), Some("2"));
        for expected in ["1", "2"] {
            let ClientEvent::Rates(rates) = next_event(&mut rx).await else {
                panic!("expected rates event");
            };
            assert_eq!(rates.get("BTC"), Some(expected));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_legacy_rate_pull_sends_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"TRON": {"USDT": "1000000000000000000"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rates = client(&server, ApiProfile::legacy())
            .update_rates()
            .await
            .unwrap();
        assert_eq!(rates.get("TRON/USDT"), Some("1.00"));

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].body.is_empty());
        assert!(requests[0].headers.get("content-type").is_none());
    }

    fn invoice_json() -> Value {
        json!({
            "id": "inv-1",
            "orderId": "o-1",
            "status": "COMPLETE",
            "amount": "5",
            "payedAmount": "5",
            "accuracy": "0.01",
            "discount": "0",
            "feeIncluded": false,
            "createdAt": "2024-05-01T12:00:00.000Z",
            "expiredAt": "2024-05-01T13:00:00.000Z",
            "addresses": []
        })
    }

    #[tokio::test]
    async fn test_merchant_profile_operations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/invoice"))
            .and(body_json(json!({"additional": "o-1", "amount": "5"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "data": invoice_json()})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .and(query_param("fromDate", "2024-05-01T00:00:00.000Z"))
            .and(query_param("toDate", "2024-05-02T00:00:00.000Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": [
                    {"type": "transaction", "transaction": transaction_json("t-1"), "invoice": invoice_json()},
                    {"type": "expired", "transaction": null, "invoice": invoice_json()}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::merchant());
        let invoice = client
            .create_invoice(&CreateInvoice::new("o-1").with_amount("5"))
            .await
            .unwrap();
        assert!(matches!(invoice.created_at, chiefpay::Timestamp::Date(_)));

        let from = "2024-05-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let to = "2024-05-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let history = client
            .notification_history(&HistoryQuery::since(from).until(to))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        let Notification::Transaction(tx) = &history[0] else {
            panic!("expected transaction");
        };
        assert_eq!(tx.txid, "t-1");
        assert!(matches!(tx.block_created_at, chiefpay::Timestamp::Date(_)));
        assert!(matches!(&history[1], Notification::Expired(inv) if inv.id == "inv-1"));
        assert_eq!(client.ts(), 0);

        let rates = client
            .handle_rates(json!({"BTC": "65000.1", "USDT": "1"}))
            .await
            .unwrap();
        assert_eq!(rates.get("BTC"), Some("65000.1"));
    }

    #[tokio::test]
    async fn test_notification_history_rejects_unknown_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": [{"type": "refund", "invoice": invoice_json()}]
            })))
            .mount(&server)
            .await;

        let from = "2024-05-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let err = client(&server, ApiProfile::merchant())
            .notification_history(&HistoryQuery::since(from))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    struct FakeTransport {
        frames: Vec<RawFrame>,
        opens: Arc<StdMutex<Vec<Option<u64>>>>,
    }

    #[async_trait::async_trait]
    impl PushTransport for FakeTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::SocketIo
        }

        fn reconnect_policy(&self) -> ReconnectPolicy {
            ReconnectPolicy::Fixed(Duration::from_secs(3600))
        }

        async fn open(&self, params: &OpenParams) -> Result<FrameStream, ClientError> {
            self.opens.lock().unwrap().push(params.cursor);
            let items: Vec<Result<TransportEvent, ClientError>> = self
                .frames
                .iter()
                .cloned()
                .map(|f| Ok(TransportEvent::Frame(f)))
                .collect();
            Ok(futures_util::stream::iter(items)
                .chain(futures_util::stream::pending())
                .boxed())
        }
    }

    #[tokio::test]
    async fn test_push_events_cursor_and_disconnect() {
        let opens = Arc::new(StdMutex::new(Vec::new()));
        let transport = FakeTransport {
            frames: vec![
                RawFrame {
                    event: None,
                    id: Some("42".to_owned()),
                    data: r#"{"userId":"u1","token":"USDT","value":"5","usd":5,"txid":"t1"}"#
                        .to_owned(),
                },
                RawFrame::new("message", "{broken"),
                RawFrame::new("rates", r#"{"BSC":{"USDT":"1000000000000000000"}}"#),
                RawFrame::new("ping", ""),
                RawFrame::new("walletExpire", r#"{"id":"w-1"}"#),
            ],
            opens: Arc::clone(&opens),
        };
        let client = ChiefPayClient::new(
            ClientConfig::new("k")
                .with_profile(ApiProfile::legacy())
                .with_ts(5),
        )
        .unwrap()
        .with_transport(transport);
        assert_eq!(client.transport_kind(), TransportKind::SocketIo);
        let mut rx = client.subscribe();

        client.connect().await;
        client.connect().await;

        assert!(matches!(next_event(&mut rx).await, ClientEvent::Connected));
        let ClientEvent::Notification(Notification::LegacyTransaction(tx)) =
            next_event(&mut rx).await
        else {
            panic!("expected legacy transaction");
        };
        assert_eq!(tx.txid, "t1");
        assert!(matches!(
            next_event(&mut rx).await,
            ClientEvent::Error(err) if matches!(*err, ClientError::Decode(_))
        ));
        let ClientEvent::Rates(rates) = next_event(&mut rx).await else {
            panic!("expected rates");
        };
        assert_eq!(rates.get("BSC/USDT"), Some("1.00"));
        assert!(matches!(
            next_event(&mut rx).await,
            ClientEvent::WalletExpire(_)
        ));

        assert_eq!(client.ts(), 42);
        assert!(client.last_ping().await.is_some());
        assert_eq!(client.rates().await.get("BSC/USDT"), Some("1.00"));
        assert_eq!(*opens.lock().unwrap(), vec![Some(5)]);

        assert!(client.is_connected().await);
        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sse_reconnect_resumes_from_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sse"))
            .and(header("ts", "0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(
                        "retry: 10\nid: 42\ndata: {\"userId\":\"u1\",\"token\":\"USDT\",\"value\":\"5\",\"usd\":5,\"txid\":\"t1\"}\n\n",
                    ),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/sse"))
            .and(header("ts", "42"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-type", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::legacy());
        client.connect().await;

        let deadline = Instant::now() + WAIT;
        loop {
            let requests = server.received_requests().await.unwrap();
            if requests
                .iter()
                .any(|r| r.headers.get("ts").is_some_and(|v| v == "42"))
            {
                break;
            }
            assert!(Instant::now() < deadline, "no reconnect with ts: 42");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(client.ts(), 42);
        client.disconnect().await;
    }
}
