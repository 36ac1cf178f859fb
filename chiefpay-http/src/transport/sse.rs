//! Server-Sent-Events transport.
//!
//! The `text/event-stream` framing is handled by `eventsource-stream` over
//! the reqwest body; this module only opens the request and maps events.

use chiefpay::RawFrame;
use chiefpay::profile::TransportKind;
use eventsource_stream::{Event, Eventsource};
use futures_util::StreamExt;
use futures_util::stream;
use http::header::ACCEPT;
#[cfg(feature = "telemetry")]
use tracing::debug;

use super::{FrameStream, OpenParams, PushTransport, ReconnectPolicy, TransportEvent};
use crate::constants::{API_KEY_HEADER, LAST_EVENT_ID_HEADER, SSE_DEFAULT_RETRY, TS_HEADER};
use crate::error::ClientError;

/// Opens `text/event-stream` connections with a plain reqwest client.
///
/// Reconnects use the server-provided `retry:` delay, 1 s until one is seen.
#[derive(Debug, Clone, Default)]
pub struct SseTransport {
    http: reqwest::Client,
}

impl SseTransport {
    /// Creates a transport on top of `http`.
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Maps one parsed event; a `retry:` field comes out first.
fn transport_events(event: Event) -> Vec<TransportEvent> {
    let mut out = Vec::with_capacity(2);
    if let Some(retry) = event.retry {
        out.push(TransportEvent::Retry(retry));
    }
    let name = Some(event.event).filter(|name| !name.is_empty() && *name != "message");
    out.push(TransportEvent::Frame(RawFrame {
        event: name,
        id: Some(event.id).filter(|id| !id.is_empty()),
        data: event.data,
    }));
    out
}

#[async_trait::async_trait]
impl PushTransport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::Fixed(SSE_DEFAULT_RETRY)
    }

    async fn open(&self, params: &OpenParams) -> Result<FrameStream, ClientError> {
        let mut req = self
            .http
            .get(params.endpoint.clone())
            .header(ACCEPT, "text/event-stream")
            .header(API_KEY_HEADER, &params.api_key);
        if let Some(cursor) = params.cursor {
            let cursor = cursor.to_string();
            req = req
                .header(TS_HEADER, &cursor)
                .header(LAST_EVENT_ID_HEADER, &cursor);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("SSE connect failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "SSE endpoint answered HTTP {status}"
            )));
        }

        #[cfg(feature = "telemetry")]
        debug!(endpoint = %params.endpoint, cursor = ?params.cursor, "SSE stream opened");

        let events = Box::pin(response.bytes_stream())
            .eventsource()
            .flat_map(|item| {
                let mapped: Vec<Result<TransportEvent, ClientError>> = match item {
                    Ok(event) => transport_events(event).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(ClientError::Transport(format!(
                        "SSE stream error: {e}"
                    )))],
                };
                stream::iter(mapped)
            });
        Ok(events.boxed())
    }
}
