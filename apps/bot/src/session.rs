//! Session lifecycle and roster
//!
//! [`Session`] is the plain state machine; [`SessionHandle`] shares it
//! between the event loop and the operation task and hands out the
//! busy-lock as an RAII [`BusyGuard`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::{Rank, UserPayload};

/// Lifecycle state of the single room session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Connecting,
    AwaitingAuth,
    Idle,
    Busy,
    Disconnected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::AwaitingAuth => "awaiting_auth",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Known users and their ranks, last write wins per name
#[derive(Debug, Clone, Default)]
pub struct Roster {
    users: HashMap<String, Rank>,
}

impl Roster {
    pub fn replace(&mut self, users: impl IntoIterator<Item = UserPayload>) {
        self.users = users.into_iter().map(|u| (u.name, u.rank)).collect();
    }

    pub fn upsert(&mut self, name: impl Into<String>, rank: Rank) {
        self.users.insert(name.into(), rank);
    }

    /// Remove a user; unknown names are ignored
    pub fn remove(&mut self, name: &str) {
        self.users.remove(name);
    }

    /// Rank of a user, 0 when unknown
    pub fn rank(&self, name: &str) -> Rank {
        self.users.get(name).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// The session state machine
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    roster: Roster,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "Session state change");
            self.state = next;
        }
    }

    /// A new connection attempt is starting
    pub fn begin_connecting(&mut self) {
        self.roster = Roster::default();
        self.transition(SessionState::Connecting);
    }

    pub fn on_connect(&mut self) {
        if self.state == SessionState::Connecting {
            self.transition(SessionState::AwaitingAuth);
        }
    }

    /// Channel options arrive after joining; login follows
    pub fn on_channel_options(&self) -> bool {
        self.state == SessionState::AwaitingAuth
    }

    /// Returns true when the session became ready for commands
    pub fn on_authenticated(&mut self, success: bool) -> bool {
        if success && self.state == SessionState::AwaitingAuth {
            self.transition(SessionState::Idle);
            return true;
        }
        false
    }

    pub fn on_roster_snapshot(&mut self, users: Vec<UserPayload>) {
        self.roster.replace(users);
    }

    pub fn on_user_join_or_rank_change(&mut self, user: UserPayload) {
        self.roster.upsert(user.name, user.rank);
    }

    pub fn on_user_leave(&mut self, name: &str) {
        self.roster.remove(name);
    }

    pub fn on_disconnect(&mut self) {
        self.transition(SessionState::Disconnected);
    }

    /// Returns true when a fresh discovery and reconnect should be attempted
    pub fn on_connect_error(&mut self) -> bool {
        match self.state {
            SessionState::Connecting | SessionState::Disconnected => {
                self.transition(SessionState::Connecting);
                true
            }
            _ => false,
        }
    }

    pub fn current_user_rank(&self, name: &str) -> Rank {
        self.roster.rank(name)
    }

    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Busy
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub(crate) fn try_enter_busy(&mut self) -> bool {
        if self.state == SessionState::Idle {
            self.transition(SessionState::Busy);
            true
        } else {
            false
        }
    }

    fn leave_busy(&mut self) {
        if self.state == SessionState::Busy {
            self.transition(SessionState::Idle);
        }
    }
}

/// Shared handle to the session
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session; a poisoned lock still yields the state
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    /// Enter `Busy` if the session is idle
    pub fn try_begin_operation(&self) -> Option<BusyGuard> {
        if self.lock().try_enter_busy() {
            Some(BusyGuard {
                session: self.clone(),
                armed: true,
            })
        } else {
            None
        }
    }
}

/// Holds the busy-lock; dropping it returns the session to `Idle`
#[derive(Debug)]
pub struct BusyGuard {
    session: SessionHandle,
    armed: bool,
}

impl BusyGuard {
    /// Keep the session busy until the connection ends
    pub fn hold_until_disconnect(mut self) {
        self.armed = false;
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.armed {
            self.session.lock().leave_busy();
        }
    }
}
