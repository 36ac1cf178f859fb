//! Authenticated request/response client.
//!
//! [`RequestClient`] sends an [`ApiCall`] with the `x-api-key` header,
//! unwraps the response envelope when the profile uses one and maps
//! failures onto [`ClientError`]. HTTP 429 is retried transparently by the
//! [`RateLimitRetry`] middleware installed by [`RequestClient::http_client`].

use std::fmt;
use std::time::Duration;

use chiefpay::ApiProfile;
use chiefpay::proto::Envelope;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde_json::Value;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};
use url::Url;

use crate::constants::API_KEY_HEADER;
use crate::error::ClientError;
use crate::middleware::{RateLimitRetry, retry_after};
use crate::params::ApiCall;

/// Sends [`ApiCall`]s to the merchant API.
#[derive(Clone)]
pub struct RequestClient {
    base_url: Url,
    http: ClientWithMiddleware,
    api_key: String,
    profile: ApiProfile,
    timeout: Option<Duration>,
}

impl fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClient")
            .field("base_url", &self.base_url.as_str())
            .field("profile", &self.profile.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    /// Builds the default HTTP stack: a plain reqwest client wrapped with
    /// [`RateLimitRetry`].
    #[must_use]
    pub fn http_client(retry: RateLimitRetry) -> ClientWithMiddleware {
        reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
            .with(retry)
            .build()
    }

    /// Creates a client for `base_url`.
    ///
    /// The base URL is normalized to a single trailing slash so that
    /// operation paths join under it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        profile: ApiProfile,
        http: ClientWithMiddleware,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            http,
            api_key: api_key.into(),
            profile,
            timeout: None,
        })
    }

    /// Applies a timeout to every request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The normalized base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The active profile.
    #[must_use]
    pub const fn profile(&self) -> &ApiProfile {
        &self.profile
    }

    /// Sends `call` and returns the unwrapped `data` value.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Http`] on transport failure
    /// - [`ClientError::InvalidBody`] if the body is not JSON
    /// - [`ClientError::Api`] for `{"status": "error"}` envelopes
    /// - [`ClientError::RateLimited`] if a retry cap was configured and exceeded
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.request", skip_all, fields(op = call.context), err)
    )]
    pub async fn execute(&self, call: ApiCall) -> Result<Value, ClientError> {
        let context = call.context;
        let mut url = self
            .base_url
            .join(&call.path)
            .map_err(|source| ClientError::UrlParse {
                context: "Failed to construct request URL",
                source,
            })?;
        if !call.query.is_empty() {
            url.query_pairs_mut().extend_pairs(call.query.iter());
        }

        let mut req = self
            .http
            .request(call.method, url)
            .header(API_KEY_HEADER, &self.api_key);
        if let Some(body) = &call.body {
            let bytes =
                serde_json::to_vec(body).map_err(|source| ClientError::Json { context, source })?;
            req = req.header(CONTENT_TYPE, "application/json").body(bytes);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req
            .send()
            .await
            .map_err(|source| ClientError::Http { context, source })?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }
        let text = response
            .text()
            .await
            .map_err(|source| ClientError::ResponseBodyRead { context, source })?;

        #[cfg(feature = "telemetry")]
        debug!(%status, len = text.len(), "response received");

        let Ok(body) = serde_json::from_str::<Value>(&text) else {
            return Err(ClientError::InvalidBody {
                context,
                status,
                body: text,
            });
        };

        if !self.profile.envelope {
            if !status.is_success() {
                return Err(ClientError::HttpStatus {
                    context,
                    status,
                    body: text,
                });
            }
            return Ok(body);
        }

        match serde_json::from_value::<Envelope>(body) {
            Ok(Envelope::Success { data }) => Ok(data),
            Ok(Envelope::Error { message }) => Err(ClientError::Api(message.into())),
            Err(source) => Err(ClientError::Json { context, source }),
        }
    }

    /// Sends `call` and deserializes the unwrapped `data` into `T`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); additionally [`ClientError::Json`] if
    /// the data does not match `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, call: ApiCall) -> Result<T, ClientError> {
        let context = call.context;
        let data = self.execute(call).await?;
        serde_json::from_value(data).map_err(|source| ClientError::Json { context, source })
    }
}

/// Parses `value` as a base URL with exactly one trailing slash.
///
/// # Errors
///
/// Returns [`ClientError::UrlParse`] if `value` is not a valid URL.
pub fn normalize_base_url(value: &str) -> Result<Url, ClientError> {
    let mut normalized = value.trim_end_matches('/').to_owned();
    normalized.push('/');
    Url::parse(&normalized).map_err(|source| ClientError::UrlParse {
        context: "Failed to parse base url",
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use chiefpay::ErrorCode;
    use chiefpay::proto::InvoiceLookup;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, profile: ApiProfile) -> RequestClient {
        RequestClient::new(
            &server.uri(),
            "test-key",
            profile,
            RequestClient::http_client(RateLimitRetry::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_base_url() {
        let url = normalize_base_url("https://api.chiefpay.org//").unwrap();
        assert_eq!(url.as_str(), "https://api.chiefpay.org/");
        assert_eq!(url.join("v1/wallet").unwrap().path(), "/v1/wallet");
        let url = normalize_base_url("https://host/prefix").unwrap();
        assert_eq!(url.join("v1/rates").unwrap().path(), "/prefix/v1/rates");
    }

    #[tokio::test]
    async fn test_envelope_unwrapped_and_key_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/invoice"))
            .and(query_param("id", "inv-1"))
            .and(header("x-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "data": {"ok": true}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::latest());
        let call = params::get_invoice(client.profile(), &InvoiceLookup::Id("inv-1".to_owned()));
        let data = client.execute(call).await.unwrap();
        assert_eq!(data, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_structured_not_found_surfaces_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/invoice"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": "error",
                "message": {"code": "NOT_FOUND", "message": "Invoice not found"}
            })))
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::latest());
        let call = params::get_invoice(client.profile(), &InvoiceLookup::Id("x".to_owned()));
        let err = client.execute(call).await.unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.code, Some(ErrorCode::NotFound));
        assert_eq!(api.message, "Invoice not found");
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::latest());
        let err = client
            .execute(params::rates(client.profile()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidBody { status, ref body, .. }
                if status == StatusCode::BAD_GATEWAY && body == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn test_429_retried_after_header_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoice/cancel"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after-ms", "500"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/invoice/cancel"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "success", "data": 1})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::latest());
        let started = std::time::Instant::now();
        let data = client
            .execute(params::cancel_invoice(client.profile(), "inv-1"))
            .await
            .unwrap();
        assert_eq!(data, json!(1));
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_429_cap_surfaces_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after-ms", "10"))
            .expect(2)
            .mount(&server)
            .await;

        let client = RequestClient::new(
            &server.uri(),
            "test-key",
            ApiProfile::latest(),
            RequestClient::http_client(RateLimitRetry::new().with_max_retries(1)),
        )
        .unwrap();
        let err = client
            .execute(params::rates(client.profile()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::RateLimited { retry_after } if retry_after == Duration::from_millis(10)
        ));
    }

    #[tokio::test]
    async fn test_bare_body_without_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"BSC": {}})))
            .mount(&server)
            .await;

        let client = client(&server, ApiProfile::legacy());
        let data = client.execute(params::rates(client.profile())).await.unwrap();
        assert_eq!(data, json!({"BSC": {}}));
    }
}
