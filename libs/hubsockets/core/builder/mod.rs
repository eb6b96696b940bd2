pub mod states;

use crate::core::config::SupervisorConfig;
use crate::core::connector::SignalRConnector;
use crate::core::endpoint::EndpointDescriptor;
use crate::core::supervisor::FeedSupervisor;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`FeedSupervisor`]
///
/// The endpoint and the dispatcher are required; everything else falls back
/// to [`SupervisorConfig::default`].
pub struct FeedSupervisorBuilder<E, D>
where
    E: EndpointState,
    D: DispatcherState,
{
    _state: TypeState<E, D>,
    endpoint: Option<Arc<EndpointDescriptor>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    config: SupervisorConfig,
}

impl FeedSupervisorBuilder<NoEndpoint, NoDispatcher> {
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            endpoint: None,
            dispatcher: None,
            config: SupervisorConfig::default(),
        }
    }
}

impl Default for FeedSupervisorBuilder<NoEndpoint, NoDispatcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DispatcherState> FeedSupervisorBuilder<NoEndpoint, D> {
    pub fn endpoint(self, endpoint: EndpointDescriptor) -> FeedSupervisorBuilder<HasEndpoint, D> {
        FeedSupervisorBuilder {
            _state: TypeState::new(),
            endpoint: Some(Arc::new(endpoint)),
            dispatcher: self.dispatcher,
            config: self.config,
        }
    }
}

impl<E: EndpointState> FeedSupervisorBuilder<E, NoDispatcher> {
    pub fn dispatcher(self, dispatcher: impl Dispatcher) -> FeedSupervisorBuilder<E, HasDispatcher> {
        self.shared_dispatcher(Arc::new(dispatcher))
    }

    /// Use a dispatcher the caller keeps a handle to
    pub fn shared_dispatcher(
        self,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> FeedSupervisorBuilder<E, HasDispatcher> {
        FeedSupervisorBuilder {
            _state: TypeState::new(),
            endpoint: self.endpoint,
            dispatcher: Some(dispatcher),
            config: self.config,
        }
    }
}

// Optional configuration methods
impl<E: EndpointState, D: DispatcherState> FeedSupervisorBuilder<E, D> {
    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.base_backoff = base;
        self.config.max_backoff = max;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self.config.heartbeat_timeout = timeout;
        self
    }

    pub fn require_start_success(mut self, required: bool) -> Self {
        self.config.require_start_success = required;
        self
    }

    pub fn start_includes_auth(mut self, include: bool) -> Self {
        self.config.start_includes_auth = include;
        self
    }
}

// Build method - only available when all required fields are set
impl FeedSupervisorBuilder<HasEndpoint, HasDispatcher> {
    pub fn build(self) -> Result<FeedSupervisor<SignalRConnector>> {
        self.config.validate()?;

        let endpoint = self
            .endpoint
            .ok_or_else(|| HubSocketError::Configuration("endpoint must be set".to_string()))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| HubSocketError::Configuration("dispatcher must be set".to_string()))?;

        let connector = SignalRConnector::new(
            endpoint,
            dispatcher,
            self.config.http_retry(),
            self.config.session_options(),
            self.config.start_includes_auth,
        );
        Ok(FeedSupervisor::new(connector, self.config))
    }
}
