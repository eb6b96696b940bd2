//! Negotiate and start calls
//!
//! Both are plain GETs against the feed host. Transient transport failures
//! are retried here with a short backoff; that retry loop is independent of
//! (and nested inside) the supervisor's reconnection policy.

use crate::codec::extract_handshake_payload;
use crate::core::endpoint::{ConnectionToken, EndpointDescriptor, TRANSPORT};
use crate::traits::{HandshakeError, StartAck};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of a rejected body kept in the error
const BODY_PREFIX_LEN: usize = 300;

/// Statuses retried at the HTTP layer
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Transport-level retry policy for handshake HTTP calls
#[derive(Debug, Clone)]
pub struct HttpRetryPolicy {
    /// Retries after the first try
    pub max_retries: u32,
    /// Sleep before retry `n` (1-based) is `backoff_factor * 2^(n-1)`
    pub backoff_factor: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpRetryPolicy {
    fn sleep_for(&self, retry: u32) -> Duration {
        self.backoff_factor * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

/// Negotiate response record
///
/// Only the token matters to the client; the rest is logged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NegotiateResponse {
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub keep_alive_timeout: Option<f64>,
    #[serde(default)]
    pub try_web_sockets: Option<bool>,
}

impl NegotiateResponse {
    /// `ConnectionToken`, falling back to `ConnectionId`
    pub fn into_token(self) -> Option<ConnectionToken> {
        self.connection_token
            .or(self.connection_id)
            .filter(|t| !t.is_empty())
            .map(ConnectionToken::new)
    }
}

/// Parse a 2xx negotiate body into a connection token
pub fn parse_negotiate_body(body: &str) -> Result<ConnectionToken, HandshakeError> {
    let payload = extract_handshake_payload(body).map_err(|_| HandshakeError::NoPayload)?;
    let response: NegotiateResponse = serde_json::from_str(payload)?;
    debug!(
        protocol = ?response.protocol_version,
        keep_alive = ?response.keep_alive_timeout,
        web_sockets = ?response.try_web_sockets,
        "Negotiate response"
    );
    response.into_token().ok_or(HandshakeError::MissingToken)
}

/// HTTP side of the handshake
///
/// Owns the pooled `reqwest::Client`. `release()` drops it; the next call
/// builds a new one.
pub struct HandshakeClient {
    endpoint: Arc<EndpointDescriptor>,
    retry: HttpRetryPolicy,
    client: RwLock<Option<Client>>,
}

impl HandshakeClient {
    pub fn new(endpoint: Arc<EndpointDescriptor>, retry: HttpRetryPolicy) -> Self {
        Self {
            endpoint,
            retry,
            client: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    fn client(&self) -> Result<Client, HandshakeError> {
        if let Some(client) = self.client.read().as_ref() {
            return Ok(client.clone());
        }
        let mut slot = self.client.write();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.retry.timeout)
            .connect_timeout(self.retry.timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .build()?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the pooled HTTP client
    pub fn release(&self) {
        if self.client.write().take().is_some() {
            debug!("Released handshake HTTP client");
        }
    }

    fn get(&self, client: &Client, url: &str, params: &[(&str, String)]) -> RequestBuilder {
        let mut request = client.get(url).query(params);
        for (name, value) in self.endpoint.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = self.endpoint.cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        request
    }

    /// Send with the transport-level retry policy
    ///
    /// The last response is returned whatever its status; only connect
    /// errors and timeouts surface as `Err` once retries run out.
    async fn send_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Response, HandshakeError> {
        let client = self.client()?;
        let mut retry = 0;

        loop {
            let result = self.get(&client, url, params).send().await;
            let retryable = match &result {
                Ok(response) => RETRY_STATUSES.contains(&response.status().as_u16()),
                Err(e) => e.is_connect() || e.is_timeout(),
            };

            if !retryable || retry >= self.retry.max_retries {
                return result.map_err(HandshakeError::from);
            }

            retry += 1;
            let sleep = self.retry.sleep_for(retry);
            match &result {
                Ok(response) => warn!(
                    "GET {} answered {}, retrying in {:?} ({}/{})",
                    url,
                    response.status(),
                    sleep,
                    retry,
                    self.retry.max_retries
                ),
                Err(e) => warn!(
                    "GET {} failed: {}, retrying in {:?} ({}/{})",
                    url, e, sleep, retry, self.retry.max_retries
                ),
            }
            tokio::time::sleep(sleep).await;
        }
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("clientProtocol", self.endpoint.protocol().to_string()),
            ("connectionData", self.endpoint.subscription().to_json()),
            ("callback", self.endpoint.callback().to_string()),
            ("_", chrono::Utc::now().timestamp_millis().to_string()),
        ]
    }

    /// Obtain a fresh connection token
    pub async fn negotiate(&self) -> Result<ConnectionToken, HandshakeError> {
        let url = self.endpoint.negotiate_url();
        let mut params = self.base_params();
        if let Some(token) = self.endpoint.auth_token() {
            params.push(("ftoken", token.to_string()));
        }

        debug!("[negotiate] GET {}", url);
        let response = self.send_with_retry(&url, &params).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(HandshakeError::Status {
                status: status.as_u16(),
                body_prefix: body.chars().take(BODY_PREFIX_LEN).collect(),
            });
        }

        parse_negotiate_body(&body)
    }

    /// Confirm the transport for `token`
    ///
    /// The status is reported, not judged; the supervisor decides whether a
    /// non-2xx answer fails the attempt.
    pub async fn confirm_start(
        &self,
        token: &ConnectionToken,
        include_auth: bool,
    ) -> Result<StartAck, HandshakeError> {
        let url = self.endpoint.start_url();
        let mut params = vec![("transport", TRANSPORT.to_string())];
        params.extend(self.base_params());
        params.push(("connectionToken", token.as_str().to_string()));
        if include_auth {
            params.push((
                "ftoken",
                self.endpoint.auth_token().unwrap_or_default().to_string(),
            ));
        }

        debug!("[start] GET {}", url);
        let response = self.send_with_retry(&url, &params).await?;
        let status: StatusCode = response.status();
        let body = response.text().await.unwrap_or_default();
        info!("[start] status {} {}", status.as_u16(), body);

        Ok(StartAck {
            status: status.as_u16(),
            body,
        })
    }
}
