//! Reconnection supervisor
//!
//! ```text
//!  Stopped/GivenUp ──start()──> Connecting ──start ack──> Live
//!                                   │  ^                    │
//!                           failure │  │ backoff     fault/close
//!                                   v  │                    │
//!                               Reconnecting <──────────────┘
//!                                   │
//!                      retry > max  └──> GivenUp
//! ```
//!
//! One run task per `start()` drives the attempts and owns the backoff
//! sleep. `stop()` works from any phase and any thread.

use crate::core::builder::{states, FeedSupervisorBuilder};
use crate::core::config::SupervisorConfig;
use crate::core::endpoint::ConnectionToken;
use crate::core::state::{SessionState, StateSnapshot, SupervisorPhase, SupervisorState};
use crate::traits::{
    Connector, HubSocketError, ReconnectionStrategy, SessionEvent, SessionEvents,
    SessionHandle,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Extra time, beyond the drain grace, a closing session gets to finish
const CLOSE_SLACK: Duration = Duration::from_secs(1);

/// How one attempt ended
enum AttemptOutcome {
    /// `stop()` or a newer `start()` took over
    Superseded,
    /// The attempt never reached `Live`
    Failed(HubSocketError),
    /// A live session reported its first fault or close
    Ended(String),
}

impl From<HubSocketError> for AttemptOutcome {
    fn from(error: HubSocketError) -> Self {
        match error {
            HubSocketError::Stopped => AttemptOutcome::Superseded,
            other => AttemptOutcome::Failed(other),
        }
    }
}

struct Runner<C: Connector> {
    connector: Arc<C>,
    strategy: Arc<dyn ReconnectionStrategy>,
    config: SupervisorConfig,
    state: Arc<SupervisorState>,
}

impl<C: Connector> Clone for Runner<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            strategy: Arc::clone(&self.strategy),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

/// Keeps one feed subscription alive across failures
pub struct FeedSupervisor<C: Connector> {
    runner: Runner<C>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedSupervisor<crate::core::connector::SignalRConnector> {
    /// Builder for the production supervisor
    pub fn builder() -> FeedSupervisorBuilder<states::NoEndpoint, states::NoDispatcher> {
        FeedSupervisorBuilder::new()
    }
}

impl<C: Connector> FeedSupervisor<C> {
    pub fn new(connector: C, config: SupervisorConfig) -> Self {
        let strategy = config.strategy();
        Self::with_strategy(connector, config, strategy)
    }

    /// Use a custom reconnection strategy instead of the configured backoff
    pub fn with_strategy(
        connector: C,
        config: SupervisorConfig,
        strategy: impl ReconnectionStrategy + 'static,
    ) -> Self {
        Self {
            runner: Runner {
                connector: Arc::new(connector),
                strategy: Arc::new(strategy),
                config,
                state: Arc::new(SupervisorState::new()),
            },
            task: Mutex::new(None),
        }
    }

    pub fn connector(&self) -> &C {
        &self.runner.connector
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.runner.config
    }

    /// Begin connecting
    ///
    /// Returns `false` (and does nothing) while a run is already in
    /// `Connecting`, `Live` or `Reconnecting`. From `Stopped` or `GivenUp` the
    /// retry counter starts again at zero. Must be called within a tokio
    /// runtime.
    pub fn start(&self) -> bool {
        let Some((generation, cancel)) = self.runner.state.begin() else {
            debug!("start() ignored, supervisor already active");
            return false;
        };

        info!(generation, "Starting feed supervisor");
        let runner = self.runner.clone();
        let handle = tokio::spawn(async move { runner.run(generation, cancel).await });
        // A superseded loop exits on its own once it sees the new generation
        *self.task.lock() = Some(handle);
        true
    }

    /// Stop from any phase; idempotent
    ///
    /// Closes the active session, cancels a pending backoff sleep or HTTP
    /// call, releases the HTTP client and moves to `Stopped`.
    pub fn stop(&self) {
        let tokens = self.runner.state.request_stop();
        let was_running = tokens.run.is_some();
        if let Some(session) = tokens.session {
            session.cancel();
        }
        if let Some(run) = tokens.run {
            run.cancel();
        }
        self.runner.connector.release();
        if was_running {
            info!("Feed supervisor stopped");
        } else {
            debug!("stop() on an idle supervisor");
        }
    }

    /// Stop and wait for the run task to finish
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Supervisor task ended abnormally: {}", e);
            }
        }
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.runner.state.phase()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.runner.state.snapshot()
    }

    /// Receiver that sees every state change
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.runner.state.subscribe()
    }

    /// Resolve once the phase is `Stopped` or `GivenUp`
    pub async fn wait_until_idle(&self) -> StateSnapshot {
        let mut rx = self.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.phase.is_idle() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

impl<C: Connector> Drop for FeedSupervisor<C> {
    fn drop(&mut self) {
        let tokens = self.runner.state.request_stop();
        if let Some(session) = tokens.session {
            session.cancel();
        }
        if let Some(run) = tokens.run {
            run.cancel();
        }
    }
}

impl<C: Connector> Runner<C> {
    async fn run(self, generation: u64, cancel: CancellationToken) {
        loop {
            if !self.state.attempt_started(generation) {
                break;
            }

            match self.attempt(generation, &cancel).await {
                AttemptOutcome::Superseded => break,
                AttemptOutcome::Failed(e) => warn!("Connection attempt failed: {}", e),
                AttemptOutcome::Ended(reason) => warn!("Live session ended: {}", reason),
            }

            let Some(k) = self.state.enter_reconnecting(generation) else {
                break;
            };

            match self.strategy.next_delay(k as usize) {
                Some(delay) => {
                    info!("Reconnecting in {:?} (retry {})", delay, k + 1);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("Backoff sleep cancelled");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    error!("Reconnection retries exhausted after {} attempts, giving up", k + 1);
                    if self.state.give_up(generation) {
                        self.connector.release();
                    }
                    break;
                }
            }
        }
        debug!(generation, "Supervisor run loop exiting");
    }

    /// Race `fut` against cancellation; cancellation reads as `Stopped`
    async fn or_stop<T>(
        cancel: &CancellationToken,
        fut: impl Future<Output = Result<T, HubSocketError>>,
    ) -> Result<T, HubSocketError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HubSocketError::Stopped),
            out = fut => out,
        }
    }

    async fn attempt(&self, generation: u64, cancel: &CancellationToken) -> AttemptOutcome {
        let token = match Self::or_stop(cancel, self.connector.negotiate()).await {
            Ok(token) => token,
            Err(e) => {
                self.state.set_session(generation, SessionState::Closed);
                return e.into();
            }
        };

        let (events, mut rx) = SessionEvents::channel();
        let handle = match Self::or_stop(cancel, self.connector.open(&token, events)).await {
            Ok(handle) => handle,
            Err(e) => {
                self.state.set_session(generation, SessionState::Closed);
                return e.into();
            }
        };

        if !self.state.attach_session(generation, handle.closer()) {
            self.close_session(handle).await;
            return AttemptOutcome::Superseded;
        }

        if let Err(e) = Self::or_stop(cancel, self.await_open(&mut rx)).await {
            return self.abandon(generation, handle, e.into()).await;
        }
        self.state.mark_open(generation);
        debug!("Session opened, confirming start");

        if let Err(e) = Self::or_stop(cancel, self.confirm_start(&token)).await {
            return self.abandon(generation, handle, e.into()).await;
        }

        if !self.state.mark_live(generation) {
            self.close_session(handle).await;
            return AttemptOutcome::Superseded;
        }
        info!("Feed is live");
        drop(token);

        // Only the first fault or close of a live session counts
        let first = Self::or_stop(cancel, async { Ok(rx.recv().await) }).await;
        let reason = match first {
            Err(_) => {
                self.close_session(handle).await;
                return AttemptOutcome::Superseded;
            }
            Ok(Some(SessionEvent::Fault(e))) => e.to_string(),
            Ok(Some(SessionEvent::Closed { code, reason })) => match code {
                Some(code) => format!("closed ({}) {}", code, reason),
                None => format!("closed {}", reason),
            },
            Ok(Some(SessionEvent::Opened)) => "unexpected second open".to_string(),
            Ok(None) => "session event channel closed".to_string(),
        };
        drop(rx);

        self.state.set_session(generation, SessionState::Closing);
        self.close_session(handle).await;
        self.state.detach_session(generation, SessionState::Closed);
        AttemptOutcome::Ended(reason)
    }

    /// Wait for `Opened`, bounded by `open_timeout`
    async fn await_open(
        &self,
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Result<(), HubSocketError> {
        match tokio::time::timeout(self.config.open_timeout, rx.recv()).await {
            Ok(Some(SessionEvent::Opened)) => Ok(()),
            Ok(Some(SessionEvent::Fault(e))) => Err(e),
            Ok(Some(SessionEvent::Closed { reason, .. })) => Err(HubSocketError::transport(
                format!("closed before open: {}", reason),
            )),
            Ok(None) => Err(HubSocketError::transport("session ended before open")),
            Err(_) => Err(HubSocketError::OpenTimeout(self.config.open_timeout)),
        }
    }

    async fn confirm_start(&self, token: &ConnectionToken) -> Result<(), HubSocketError> {
        let ack = self.connector.confirm_start(token).await?;
        if ack.is_success() {
            Ok(())
        } else if self.config.require_start_success {
            Err(HubSocketError::StartRejected { status: ack.status })
        } else {
            warn!("Start confirmation answered {}, continuing", ack.status);
            Ok(())
        }
    }

    /// Close a session that never reached `Live`
    async fn abandon(
        &self,
        generation: u64,
        handle: SessionHandle,
        outcome: AttemptOutcome,
    ) -> AttemptOutcome {
        if !matches!(outcome, AttemptOutcome::Superseded) {
            self.state.set_session(generation, SessionState::Closing);
        }
        self.close_session(handle).await;
        self.state.detach_session(generation, SessionState::Closed);
        outcome
    }

    async fn close_session(&self, handle: SessionHandle) {
        handle
            .close_and_wait(self.config.drain_grace + CLOSE_SLACK)
            .await;
        self.state.session_closed_after_stop();
    }
}
