use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::candidate::{CandidateRecord, ResolvedMetadata};

/// Users are identified by their numeric chat platform id.
pub type UserKey = u64;

/// The page of candidates currently on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidatePage {
    /// Query the page was fetched for; re-used when paging.
    pub query: String,
    /// 1-based.
    pub page: u32,
    pub candidates: Vec<CandidateRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Choosing(CandidatePage),
    DirectSearch,
    ManualEntry,
    Done,
}

impl SessionState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingInput => "awaiting_input",
            SessionState::Choosing(_) => "choosing",
            SessionState::DirectSearch => "direct_search",
            SessionState::ManualEntry => "manual_entry",
            SessionState::Done => "done",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done)
    }
}

/// Per-user conversation context, alive from the first link until done,
/// cancelled or expired.
#[derive(Clone, Debug)]
pub struct Session {
    pub url: String,
    pub state: SessionState,
    resolved: Option<ResolvedMetadata>,
    last_active: Instant,
}

impl Session {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: SessionState::AwaitingInput,
            resolved: None,
            last_active: Instant::now(),
        }
    }

    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedMetadata> {
        self.resolved.as_ref()
    }

    /// Fixes the metadata for this session. Refuses a second resolution.
    pub fn resolve(&mut self, metadata: ResolvedMetadata) -> anyhow::Result<&ResolvedMetadata> {
        if self.resolved.is_some() {
            anyhow::bail!("metadata already resolved for {}", self.url);
        }
        Ok(self.resolved.insert(metadata))
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// `None` means sessions never expire.
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.last_active.elapsed() >= ttl)
    }
}

/// What to do with a link that arrives while the sender already has a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPolicy {
    /// Drop the active session and start over with the new link.
    #[default]
    Replace,
    /// Keep the active session and refuse the new link.
    Reject,
}

impl FromStr for LinkPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(LinkPolicy::Replace),
            "reject" => Ok(LinkPolicy::Reject),
            other => anyhow::bail!("unknown link policy '{other}' (expected replace or reject)"),
        }
    }
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Active sessions keyed by user. The lock is never held across an await:
/// handlers `take` a session, work on it, and `put` it back.
pub struct SessionStore {
    sessions: Mutex<HashMap<UserKey, Session>>,
    ttl: Option<Duration>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Some(DEFAULT_SESSION_TTL))
    }
}

impl SessionStore {
    /// Sessions idle for `ttl` read as absent; `None` keeps them until they
    /// finish or are cancelled.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserKey, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes and returns the user's live session. Expired sessions are
    /// discarded and reported as absent.
    pub fn take(&self, user: UserKey) -> Option<Session> {
        let session = self.lock().remove(&user)?;
        if session.is_expired(self.ttl) {
            tracing::debug!("Session for {} expired in state {}", user, session.state.name());
            return None;
        }
        Some(session)
    }

    /// Stores the session unless it reached a terminal state.
    pub fn put(&self, user: UserKey, mut session: Session) {
        if session.state.is_terminal() {
            self.lock().remove(&user);
            return;
        }
        session.touch();
        self.lock().insert(user, session);
    }

    /// State of the user's live session, if any.
    #[must_use]
    pub fn state_of(&self, user: UserKey) -> Option<SessionState> {
        self.lock()
            .get(&user)
            .filter(|s| !s.is_expired(self.ttl))
            .map(|s| s.state.clone())
    }

    pub fn remove(&self, user: UserKey) -> Option<Session> {
        self.lock().remove(&user)
    }

    /// Drops every expired session, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(ttl));
        before - sessions.len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}
