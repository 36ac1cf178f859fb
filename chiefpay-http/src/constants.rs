//! Header names, default URLs and timing constants.

use std::time::Duration;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.chiefpay.org";

/// Header carrying the merchant API key on every request and push connection.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the resume cursor when opening an SSE stream.
pub const TS_HEADER: &str = "ts";

/// Standard SSE resume header, sent alongside [`TS_HEADER`].
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Header in which the server announces how long to back off after a 429.
pub const RETRY_AFTER_MS_HEADER: &str = "retry-after-ms";

/// Wait applied after a 429 without a usable [`RETRY_AFTER_MS_HEADER`].
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(3000);

/// Maximum number of ids per `POST /transactions` request.
pub const TRANSACTION_BATCH_SIZE: usize = 100;

/// Minimum interval between two rate pulls.
pub const MIN_RATES_INTERVAL: Duration = Duration::from_secs(10);

/// SSE reconnect delay used until the server sends a `retry:` field.
pub const SSE_DEFAULT_RETRY: Duration = Duration::from_millis(1000);

/// First socket.io reconnect delay.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// How long a socket.io connection may take to be accepted by the server.
pub const SOCKETIO_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Upper bound of the socket.io reconnect delay.
pub const RECONNECT_DELAY_MAX: Duration = Duration::from_millis(5000);

/// Default capacity of the client event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
