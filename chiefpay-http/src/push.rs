//! The push loop.
//!
//! One task per connected client opens the transport, feeds every frame
//! through the decoder and reconnects after failures until cancelled.

use std::sync::Arc;
use std::time::Duration;

use chiefpay::{Cursor, Decoded, NotificationDecoder, RateCache, RawFrame};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;
use crate::events::{ClientEvent, EventHub};
use crate::transport::{OpenParams, PushTransport, ReconnectPolicy, TransportEvent};

/// Everything the push task needs, cloned out of the client.
pub(crate) struct PushContext {
    pub(crate) transport: Arc<dyn PushTransport>,
    pub(crate) endpoint: Url,
    pub(crate) api_key: String,
    pub(crate) resume_cursor: bool,
    pub(crate) decoder: NotificationDecoder,
    pub(crate) rates: Arc<RateCache>,
    pub(crate) events: EventHub,
    pub(crate) last_ping: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl PushContext {
    fn cursor(&self) -> &Cursor {
        self.decoder.cursor()
    }

    fn open_params(&self) -> OpenParams {
        OpenParams {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            cursor: self.resume_cursor.then(|| self.cursor().get()),
        }
    }

    /// Decodes one frame and returns the event to publish, if any.
    async fn handle_frame(&self, frame: &RawFrame) -> Option<ClientEvent> {
        match self.decoder.decode(frame) {
            Ok(Decoded::Notification(notification)) => {
                #[cfg(feature = "telemetry")]
                debug!(kind = notification.type_tag(), cursor = self.cursor().get(), "notification");
                Some(ClientEvent::Notification(notification))
            }
            Ok(Decoded::Rates(raw)) => match self.rates.handle_rates(raw).await {
                Ok(rates) => Some(ClientEvent::Rates(rates)),
                Err(err) => Some(ClientEvent::Error(Arc::new(err.into()))),
            },
            Ok(Decoded::WalletExpire(payload)) => Some(ClientEvent::WalletExpire(payload)),
            Ok(Decoded::Ping) => {
                *self.last_ping.write().await = Some(Utc::now());
                None
            }
            Ok(Decoded::Ignored(_)) => {
                #[cfg(feature = "telemetry")]
                debug!(event = ?frame.event, "ignoring unknown push event");
                None
            }
            Err(err) => {
                #[cfg(feature = "telemetry")]
                warn!(error = %err, "failed to decode push frame");
                Some(ClientEvent::Error(Arc::new(ClientError::Decode(err))))
            }
        }
    }
}

/// Runs until `cancel` fires. No event is emitted once cancellation is
/// observed.
pub(crate) async fn run(ctx: PushContext, cancel: CancellationToken) {
    let policy = ctx.transport.reconnect_policy();
    let mut delay = policy.initial();

    loop {
        let params = ctx.open_params();
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            opened = ctx.transport.open(&params) => opened,
        };

        match opened {
            Ok(mut stream) => {
                #[cfg(feature = "telemetry")]
                info!(
                    transport = ?ctx.transport.kind(),
                    endpoint = %ctx.endpoint,
                    cursor = ?params.cursor,
                    "push channel connected"
                );
                ctx.events.emit(ClientEvent::Connected);
                if let ReconnectPolicy::Exponential { initial, .. } = policy {
                    delay = initial;
                }

                loop {
                    let next = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(TransportEvent::Frame(frame))) => {
                            let event = ctx.handle_frame(&frame).await;
                            if cancel.is_cancelled() {
                                return;
                            }
                            if let Some(event) = event {
                                ctx.events.emit(event);
                            }
                        }
                        Some(Ok(TransportEvent::Retry(retry))) => {
                            if matches!(policy, ReconnectPolicy::Fixed(_)) {
                                delay = retry;
                            }
                        }
                        Some(Err(err)) => {
                            #[cfg(feature = "telemetry")]
                            warn!(error = %err, "push stream failed");
                            ctx.events.error(err);
                            break;
                        }
                        None => {
                            #[cfg(feature = "telemetry")]
                            warn!("push stream closed by server");
                            ctx.events
                                .error(ClientError::Transport("push stream closed".to_owned()));
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                #[cfg(feature = "telemetry")]
                warn!(error = %err, "push connection failed");
                ctx.events.error(err);
            }
        }

        let wait = delay;
        delay = policy.next_delay(delay);
        #[cfg(feature = "telemetry")]
        debug!(delay_ms = wait.as_millis(), "reconnecting push channel");
        if sleep_or_cancel(wait, &cancel).await {
            return;
        }
    }
}

/// Returns `true` if cancelled before `wait` elapsed.
async fn sleep_or_cancel(wait: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => true,
        () = tokio::time::sleep(wait) => false,
    }
}
