//! Endpoint description and URL construction
//!
//! Everything here is immutable once built; the supervisor shares one
//! `Arc<EndpointDescriptor>` across all attempts.

use crate::traits::{HubSocketError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Protocol version sent as `clientProtocol`
pub const CLIENT_PROTOCOL: &str = "2.1";

/// Transport name used by the connect and start calls
pub const TRANSPORT: &str = "webSockets";

pub const NEGOTIATE_PATH: &str = "/signalr/negotiate";
pub const CONNECT_PATH: &str = "/signalr/connect";
pub const START_PATH: &str = "/signalr/start";

/// Opaque token returned by negotiate
///
/// Lives for exactly one attempt and is dropped when the attempt ends.
#[derive(PartialEq, Eq)]
pub struct ConnectionToken(String);

impl ConnectionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionToken({} chars)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HubName {
    name: String,
}

/// Ordered list of hubs to join, sent as `connectionData`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    hubs: Vec<String>,
}

impl SubscriptionDescriptor {
    pub fn new<I, S>(hubs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hubs: hubs.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse raw JSON (`[{"name":"newshub"}]`) or its percent-encoded form
    ///
    /// Encoded input is decoded back to raw first so the HTTP layer encodes it
    /// exactly once.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let raw = if trimmed.starts_with('%') {
            urlencoding::decode(trimmed)
                .map_err(|e| {
                    HubSocketError::Configuration(format!("connection data is not valid UTF-8: {}", e))
                })?
                .into_owned()
        } else {
            trimmed.to_string()
        };

        let hubs: Vec<HubName> = serde_json::from_str(&raw).map_err(|e| {
            HubSocketError::Configuration(format!("invalid connection data {:?}: {}", raw, e))
        })?;
        if hubs.is_empty() {
            return Err(HubSocketError::Configuration(
                "connection data must name at least one hub".to_string(),
            ));
        }
        Ok(Self {
            hubs: hubs.into_iter().map(|h| h.name).collect(),
        })
    }

    pub fn hubs(&self) -> &[String] {
        &self.hubs
    }

    /// Raw JSON form, as sent in HTTP query parameters before encoding
    pub fn to_json(&self) -> String {
        let hubs: Vec<HubName> = self
            .hubs
            .iter()
            .map(|name| HubName { name: name.clone() })
            .collect();
        // Serializing a Vec of plain structs cannot fail
        serde_json::to_string(&hubs).unwrap_or_else(|_| "[]".to_string())
    }

    /// Percent-encoded form for hand-built URLs
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.to_json()).into_owned()
    }
}

impl Default for SubscriptionDescriptor {
    fn default() -> Self {
        Self::new(["newshub"])
    }
}

/// Immutable description of the remote feed
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    http_base: String,
    ws_base: String,
    protocol: String,
    subscription: SubscriptionDescriptor,
    callback: String,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    auth_token: Option<String>,
}

impl EndpointDescriptor {
    /// Start describing an endpoint rooted at `http_base` (`https://host`)
    pub fn builder(http_base: impl Into<String>) -> EndpointDescriptorBuilder {
        EndpointDescriptorBuilder::new(http_base)
    }

    pub fn http_base(&self) -> &str {
        &self.http_base
    }

    pub fn ws_base(&self) -> &str {
        &self.ws_base
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn subscription(&self) -> &SubscriptionDescriptor {
        &self.subscription
    }

    pub fn callback(&self) -> &str {
        &self.callback
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// `Cookie` header value, `None` when there are no cookies
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn negotiate_url(&self) -> String {
        format!("{}{}", self.http_base, NEGOTIATE_PATH)
    }

    pub fn start_url(&self) -> String {
        format!("{}{}", self.http_base, START_PATH)
    }

    /// Transport URL for one attempt
    ///
    /// The auth token and connection token are percent-encoded here; the
    /// subscription descriptor is encoded once from its raw JSON form.
    pub fn connect_url(&self, token: &ConnectionToken) -> String {
        format!(
            "{}{}?transport={}&clientProtocol={}&ftoken={}&connectionToken={}&connectionData={}&tid=2",
            self.ws_base,
            CONNECT_PATH,
            TRANSPORT,
            self.protocol,
            urlencoding::encode(self.auth_token.as_deref().unwrap_or("")),
            urlencoding::encode(token.as_str()),
            self.subscription.encoded(),
        )
    }
}

/// Builder for [`EndpointDescriptor`]
#[derive(Debug, Clone)]
pub struct EndpointDescriptorBuilder {
    http_base: String,
    ws_base: Option<String>,
    protocol: String,
    subscription: SubscriptionDescriptor,
    callback: String,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    auth_token: Option<String>,
}

impl EndpointDescriptorBuilder {
    fn new(http_base: impl Into<String>) -> Self {
        Self {
            http_base: http_base.into().trim_end_matches('/').to_string(),
            ws_base: None,
            protocol: CLIENT_PROTOCOL.to_string(),
            subscription: SubscriptionDescriptor::default(),
            callback: String::new(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            auth_token: None,
        }
    }

    /// Override the WebSocket base (defaults to the HTTP base with `ws(s)://`)
    pub fn ws_base(mut self, ws_base: impl Into<String>) -> Self {
        self.ws_base = Some(ws_base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn subscription(mut self, subscription: SubscriptionDescriptor) -> Self {
        self.subscription = subscription;
        self
    }

    pub fn callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = callback.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn origin(self, origin: impl Into<String>) -> Self {
        self.header("Origin", origin)
    }

    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        self.header("User-Agent", user_agent)
    }

    pub fn cookies(mut self, cookies: impl IntoIterator<Item = (String, String)>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn build(self) -> Result<EndpointDescriptor> {
        let ws_base = match self.ws_base {
            Some(ws) => ws,
            None => derive_ws_base(&self.http_base)?,
        };
        if !(ws_base.starts_with("ws://") || ws_base.starts_with("wss://")) {
            return Err(HubSocketError::Configuration(format!(
                "websocket base must be ws:// or wss://, got {}",
                ws_base
            )));
        }
        Ok(EndpointDescriptor {
            http_base: self.http_base,
            ws_base,
            protocol: self.protocol,
            subscription: self.subscription,
            callback: self.callback,
            headers: self.headers,
            cookies: self.cookies,
            auth_token: self.auth_token,
        })
    }
}

fn derive_ws_base(http_base: &str) -> Result<String> {
    if let Some(rest) = http_base.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = http_base.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else {
        Err(HubSocketError::Configuration(format!(
            "endpoint base must be http:// or https://, got {}",
            http_base
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> EndpointDescriptor {
        EndpointDescriptor::builder("https://ws1.example.com/")
            .callback("cb_1")
            .origin("https://www.example.com")
            .auth_token(Some("a b/c".to_string()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_descriptor_parses_raw_and_encoded() {
        let raw = SubscriptionDescriptor::parse(r#"[{"name":"newshub"},{"name":"chat"}]"#).unwrap();
        let encoded =
            SubscriptionDescriptor::parse("%5B%7B%22name%22%3A%22newshub%22%7D%2C%7B%22name%22%3A%22chat%22%7D%5D")
                .unwrap();
        assert_eq!(raw, encoded);
        assert_eq!(raw.hubs(), ["newshub", "chat"]);
        assert_eq!(raw.to_json(), r#"[{"name":"newshub"},{"name":"chat"}]"#);
    }

    #[test]
    fn test_descriptor_rejects_empty_and_garbage() {
        assert!(SubscriptionDescriptor::parse("[]").is_err());
        assert!(SubscriptionDescriptor::parse("newshub").is_err());
    }

    #[test]
    fn test_connect_url_encodes_each_part_once() {
        let url = endpoint().connect_url(&ConnectionToken::new("tok/en+="));
        assert_eq!(
            url,
            "wss://ws1.example.com/signalr/connect?transport=webSockets&clientProtocol=2.1\
             &ftoken=a%20b%2Fc&connectionToken=tok%2Fen%2B%3D\
             &connectionData=%5B%7B%22name%22%3A%22newshub%22%7D%5D&tid=2"
        );
    }

    #[test]
    fn test_ws_base_derivation() {
        let plain = EndpointDescriptor::builder("http://127.0.0.1:9000").build().unwrap();
        assert_eq!(plain.ws_base(), "ws://127.0.0.1:9000");
        assert!(EndpointDescriptor::builder("ftp://x").build().is_err());
    }

    #[test]
    fn test_cookie_header_and_token_debug() {
        let ep = EndpointDescriptor::builder("https://h")
            .cookies([("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())])
            .build()
            .unwrap();
        assert_eq!(ep.cookie_header().as_deref(), Some("a=1; b=2"));
        assert_eq!(format!("{:?}", ConnectionToken::new("secret")), "ConnectionToken(6 chars)");
    }
}
