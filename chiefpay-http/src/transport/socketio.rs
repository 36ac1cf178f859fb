//! socket.io transport.
//!
//! Framing, the Engine.IO handshake and heartbeats are handled by the
//! `rust_socketio` async client. Its callbacks are bridged into a
//! [`FrameStream`]: server events become frames, and an `error` or `close`
//! callback ends the stream with [`ClientError::Transport`]. That includes
//! the heartbeat deadline (`pingInterval + pingTimeout` from the server's
//! open packet) lapsing on a half-open connection.
//!
//! The library's own reconnection is switched off; the push loop reconnects.

use chiefpay::RawFrame;
use chiefpay::profile::TransportKind;
use futures_util::future::{self, BoxFuture};
use futures_util::{FutureExt, StreamExt};
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload, TransportType};
use serde_json::Value;
use tokio::sync::mpsc;
#[cfg(feature = "telemetry")]
use tracing::{debug, trace};
use url::Url;

use super::{FrameStream, OpenParams, PushTransport, ReconnectPolicy, TransportEvent};
use crate::constants::{
    API_KEY_HEADER, RECONNECT_DELAY, RECONNECT_DELAY_MAX, SOCKETIO_CONNECT_TIMEOUT,
};
use crate::error::ClientError;

/// Opens socket.io connections over WebSocket.
///
/// Reconnects follow the socket.io client defaults: 1 s doubling up to 5 s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketIoTransport;

impl SocketIoTransport {
    /// Creates the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// What the client callbacks report.
#[derive(Debug)]
enum Signal {
    Connected,
    Frame(RawFrame),
    Failed(String),
    Closed,
}

type Signals = mpsc::UnboundedSender<Signal>;

/// Normalizes the push endpoint into the Engine.IO path.
///
/// The server only matches `/socket.io/` with its trailing slash.
///
/// # Errors
///
/// Returns [`ClientError::Config`] for schemes other than `http`, `https`,
/// `ws` and `wss`.
pub fn socketio_url(endpoint: &Url) -> Result<Url, ClientError> {
    if !matches!(endpoint.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(ClientError::Config(format!(
            "unsupported push endpoint scheme: {}",
            endpoint.scheme()
        )));
    }
    let mut url = endpoint.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    Ok(url)
}

/// First event argument; `null` when there is none, `None` for binary.
#[allow(deprecated)]
fn first_arg(payload: Payload) -> Option<Value> {
    match payload {
        Payload::Text(mut args) => Some(if args.is_empty() {
            Value::Null
        } else {
            args.swap_remove(0)
        }),
        Payload::String(text) => {
            Some(serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text)))
        }
        _ => None,
    }
}

fn error_message(payload: Payload) -> String {
    match first_arg(payload) {
        Some(Value::String(message)) => message,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn report(
    signals: &Signals,
    make: fn(Payload) -> Signal,
) -> impl FnMut(Payload, Client) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    let signals = signals.clone();
    move |payload, _| {
        let _ = signals.send(make(payload));
        future::ready(()).boxed()
    }
}

fn forward(
    signals: &Signals,
) -> impl FnMut(Event, Payload, Client) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    let signals = signals.clone();
    move |event, payload, _| {
        let name = match event {
            Event::Message => Some("message".to_owned()),
            Event::Custom(name) => Some(name),
            _ => None,
        };
        if let (Some(name), Some(data)) = (name, first_arg(payload)) {
            #[cfg(feature = "telemetry")]
            trace!(event = %name, "socket.io event");
            let _ = signals.send(Signal::Frame(RawFrame {
                event: Some(name),
                id: None,
                data: data.to_string(),
            }));
        }
        future::ready(()).boxed()
    }
}

/// Disconnects the client once the stream is dropped.
struct Connection(Client);

impl Drop for Connection {
    fn drop(&mut self) {
        let client = self.0.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = client.disconnect().await;
            });
        }
    }
}

#[async_trait::async_trait]
impl PushTransport for SocketIoTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::SocketIo
    }

    fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::Exponential {
            initial: RECONNECT_DELAY,
            max: RECONNECT_DELAY_MAX,
        }
    }

    async fn open(&self, params: &OpenParams) -> Result<FrameStream, ClientError> {
        let url = socketio_url(&params.endpoint)?;
        let (signals, mut rx) = mpsc::unbounded_channel();

        let client = ClientBuilder::new(url.as_str())
            .transport_type(TransportType::Websocket)
            .reconnect(false)
            .opening_header(API_KEY_HEADER, params.api_key.clone())
            .on(Event::Connect, report(&signals, |_| Signal::Connected))
            .on(
                Event::Error,
                report(&signals, |payload| Signal::Failed(error_message(payload))),
            )
            .on(Event::Close, report(&signals, |_| Signal::Closed))
            .on_any(forward(&signals))
            .connect()
            .await
            .map_err(|e| ClientError::Transport(format!("socket.io connect failed: {e}")))?;
        let connection = Connection(client);

        let handshake = tokio::time::timeout(SOCKETIO_CONNECT_TIMEOUT, async {
            loop {
                match rx.recv().await {
                    Some(Signal::Connected) => return Ok(()),
                    Some(Signal::Failed(message)) => {
                        return Err(format!("connection refused: {message}"));
                    }
                    Some(Signal::Closed) | None => {
                        return Err("socket closed during handshake".to_owned());
                    }
                    Some(Signal::Frame(_)) => {}
                }
            }
        })
        .await
        .unwrap_or_else(|_| Err("handshake timed out".to_owned()));
        handshake.map_err(ClientError::Transport)?;

        #[cfg(feature = "telemetry")]
        debug!(endpoint = %url, "socket.io connected");

        let stream = futures_util::stream::unfold(Some((rx, connection)), |state| async move {
            let (mut rx, connection) = state?;
            loop {
                match rx.recv().await {
                    Some(Signal::Frame(frame)) => {
                        return Some((Ok(TransportEvent::Frame(frame)), Some((rx, connection))));
                    }
                    Some(Signal::Connected) => {}
                    Some(Signal::Failed(message)) => {
                        let err = ClientError::Transport(format!("socket.io error: {message}"));
                        return Some((Err(err), None));
                    }
                    Some(Signal::Closed) | None => {
                        let err = ClientError::Transport("socket.io connection closed".to_owned());
                        return Some((Err(err), None));
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}
