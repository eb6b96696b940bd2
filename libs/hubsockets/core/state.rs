//! Supervisor state
//!
//! All mutable supervisor state lives in one `parking_lot::Mutex`. Every
//! change is mirrored into a `watch` channel so callers can await phase
//! changes instead of polling.
//!
//! Writes from the run loop carry the generation they were started with.
//! `start()` and `stop()` bump the generation, so a superseded loop finds
//! its writes rejected and exits.

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Supervisor phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorPhase {
    Stopped,
    Connecting,
    Live,
    Reconnecting,
    /// Retry ceiling reached; terminal until `start()`
    GivenUp,
}

impl SupervisorPhase {
    /// A run loop owns the supervisor in this phase
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Live | Self::Reconnecting)
    }

    pub fn is_idle(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Reconnecting => "reconnecting",
            Self::GivenUp => "given_up",
        };
        f.write_str(name)
    }
}

/// State of the current attempt's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Handshaking,
    AwaitingOpen,
    Open,
    Closing,
    Closed,
}

/// Point-in-time copy of the supervisor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub phase: SupervisorPhase,
    pub session: SessionState,
    pub retry_count: u32,
    /// Connection attempts since construction
    pub attempts: u64,
    /// Transitions into `Reconnecting` since construction
    pub episodes: u64,
    pub stop_requested: bool,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            phase: SupervisorPhase::Stopped,
            session: SessionState::Idle,
            retry_count: 0,
            attempts: 0,
            episodes: 0,
            stop_requested: false,
        }
    }
}

/// Tokens a caller must cancel after `request_stop`
pub(crate) struct StopTokens {
    pub(crate) run: Option<CancellationToken>,
    pub(crate) session: Option<CancellationToken>,
}

struct Inner {
    phase: SupervisorPhase,
    session: SessionState,
    retry: u32,
    attempts: u64,
    episodes: u64,
    stop_requested: bool,
    generation: u64,
    run_cancel: Option<CancellationToken>,
    active_session: Option<CancellationToken>,
}

impl Inner {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase,
            session: self.session,
            retry_count: self.retry,
            attempts: self.attempts,
            episodes: self.episodes,
            stop_requested: self.stop_requested,
        }
    }
}

pub(crate) struct SupervisorState {
    inner: Mutex<Inner>,
    tx: watch::Sender<StateSnapshot>,
}

impl SupervisorState {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(StateSnapshot::default());
        Self {
            inner: Mutex::new(Inner {
                phase: SupervisorPhase::Stopped,
                session: SessionState::Idle,
                retry: 0,
                attempts: 0,
                episodes: 0,
                stop_requested: false,
                generation: 0,
                run_cancel: None,
                active_session: None,
            }),
            tx,
        }
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        self.inner.lock().snapshot()
    }

    pub(crate) fn phase(&self) -> SupervisorPhase {
        self.inner.lock().phase
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.snapshot());
    }

    /// Apply `f` if `generation` is still current
    fn update<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut Inner),
    {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.stop_requested {
            return false;
        }
        f(&mut inner);
        self.publish(&inner);
        true
    }

    /// Claim the supervisor for a new run loop
    ///
    /// Returns `None` while another run loop is active.
    pub(crate) fn begin(&self) -> Option<(u64, CancellationToken)> {
        let mut inner = self.inner.lock();
        if inner.phase.is_active() {
            return None;
        }
        let cancel = CancellationToken::new();
        inner.generation += 1;
        inner.phase = SupervisorPhase::Connecting;
        inner.session = SessionState::Idle;
        inner.retry = 0;
        inner.stop_requested = false;
        inner.run_cancel = Some(cancel.clone());
        inner.active_session = None;
        self.publish(&inner);
        Some((inner.generation, cancel))
    }

    /// Move to `Stopped` and hand back what must be cancelled
    pub(crate) fn request_stop(&self) -> StopTokens {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.stop_requested = true;
        inner.phase = SupervisorPhase::Stopped;
        if inner.active_session.is_some() {
            inner.session = SessionState::Closing;
        } else if inner.session != SessionState::Idle {
            inner.session = SessionState::Closed;
        }
        let tokens = StopTokens {
            run: inner.run_cancel.take(),
            session: inner.active_session.take(),
        };
        self.publish(&inner);
        tokens
    }

    /// Record the session close that followed a stop
    pub(crate) fn session_closed_after_stop(&self) {
        let mut inner = self.inner.lock();
        if inner.stop_requested && inner.session == SessionState::Closing {
            inner.session = SessionState::Closed;
            self.publish(&inner);
        }
    }

    pub(crate) fn attempt_started(&self, generation: u64) -> bool {
        self.update(generation, |inner| {
            inner.phase = SupervisorPhase::Connecting;
            inner.session = SessionState::Handshaking;
            inner.attempts += 1;
        })
    }

    pub(crate) fn set_session(&self, generation: u64, session: SessionState) -> bool {
        self.update(generation, |inner| inner.session = session)
    }

    /// Register the live session's closer so `stop()` can reach it
    ///
    /// Returns `false` when the generation is stale; the caller then owns
    /// closing the session itself.
    pub(crate) fn attach_session(&self, generation: u64, closer: CancellationToken) -> bool {
        self.update(generation, |inner| {
            inner.session = SessionState::AwaitingOpen;
            inner.active_session = Some(closer);
        })
    }

    pub(crate) fn detach_session(&self, generation: u64, session: SessionState) -> bool {
        self.update(generation, |inner| {
            inner.active_session = None;
            inner.session = session;
        })
    }

    /// The session reported `Opened`; start is not confirmed yet
    pub(crate) fn mark_open(&self, generation: u64) -> bool {
        self.update(generation, |inner| inner.session = SessionState::Open)
    }

    /// Enter `Live`; the retry counter resets here
    pub(crate) fn mark_live(&self, generation: u64) -> bool {
        self.update(generation, |inner| {
            inner.phase = SupervisorPhase::Live;
            inner.session = SessionState::Open;
            inner.retry = 0;
        })
    }

    /// Enter `Reconnecting` and return the retry count before the increment
    pub(crate) fn enter_reconnecting(&self, generation: u64) -> Option<u32> {
        let mut k = None;
        self.update(generation, |inner| {
            k = Some(inner.retry);
            inner.retry = inner.retry.saturating_add(1);
            inner.episodes += 1;
            inner.phase = SupervisorPhase::Reconnecting;
        });
        k
    }

    pub(crate) fn give_up(&self, generation: u64) -> bool {
        self.update(generation, |inner| {
            inner.phase = SupervisorPhase::GivenUp;
            inner.run_cancel = None;
        })
    }
}
