use crate::core::endpoint::{ConnectionToken, EndpointDescriptor};
use crate::core::handshake::{HandshakeClient, HttpRetryPolicy};
use crate::core::session::{build_request, SessionOptions, TransportSession};
use crate::traits::{
    Connector, Dispatcher, HubSocketError, Result, SessionEvents, SessionHandle, StartAck,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Production connector: HTTP handshake plus a WebSocket transport session
pub struct SignalRConnector {
    endpoint: Arc<EndpointDescriptor>,
    handshake: HandshakeClient,
    dispatcher: Arc<dyn Dispatcher>,
    session_options: SessionOptions,
    start_includes_auth: bool,
    sessions: AtomicU64,
}

impl SignalRConnector {
    pub fn new(
        endpoint: Arc<EndpointDescriptor>,
        dispatcher: Arc<dyn Dispatcher>,
        http_retry: HttpRetryPolicy,
        session_options: SessionOptions,
        start_includes_auth: bool,
    ) -> Self {
        Self {
            handshake: HandshakeClient::new(Arc::clone(&endpoint), http_retry),
            endpoint,
            dispatcher,
            session_options,
            start_includes_auth,
            sessions: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for SignalRConnector {
    async fn negotiate(&self) -> Result<ConnectionToken> {
        let token = self.handshake.negotiate().await?;
        info!("[negotiate] connection token obtained ({} chars)", token.as_str().len());
        Ok(token)
    }

    async fn open(&self, token: &ConnectionToken, events: SessionEvents) -> Result<SessionHandle> {
        let url = self.endpoint.connect_url(token);
        let request = build_request(&url, self.endpoint.headers())?;

        let n = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let options = self.session_options.clone().with_label(format!("s{}", n));
        info!(
            session = %options.label,
            "[ws] connecting to {}{}",
            self.endpoint.ws_base(),
            crate::core::endpoint::CONNECT_PATH
        );

        Ok(TransportSession::open(
            request,
            Arc::clone(&self.dispatcher),
            events,
            options,
        ))
    }

    async fn confirm_start(&self, token: &ConnectionToken) -> Result<StartAck> {
        self.handshake
            .confirm_start(token, self.start_includes_auth)
            .await
            .map_err(HubSocketError::from)
    }

    fn release(&self) {
        debug!("Releasing connector resources");
        self.handshake.release();
    }
}
