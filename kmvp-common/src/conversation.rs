//! The per-user dialogue that turns a video link into a tagged track.
//!
//! A session starts when a supported link arrives, offers metadata candidates
//! from the search service, lets the user page through them, search by hand
//! or type the metadata directly, and ends once the track has been fetched,
//! on cancellation, or on an invalid choice.

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::candidate::{self, ResolvedMetadata};
use crate::executor::FetchAndTag;
use crate::presenter::{self, Action, Menu};
use crate::search::{self, RecordingSearch};
use crate::session::{CandidatePage, LinkPolicy, Session, SessionState, SessionStore, UserKey};

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:(?:www|m|music)\.)?(?:youtube\.com|youtu\.be)/\S+")
        .expect("link pattern is valid")
});

/// Extracts the first supported video link from a message.
#[must_use]
pub fn find_link(text: &str) -> Option<&str> {
    LINK_RE.find(text).map(|m| m.as_str())
}

/// One inbound user event, already separated from the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Link(String),
    Text(String),
    Action(Action),
    Cancel,
}

impl Event {
    /// Classifies a plain text message.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        match find_link(text) {
            Some(url) => Event::Link(url.to_owned()),
            None => Event::Text(text.trim().to_owned()),
        }
    }
}

/// Something to show the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Menu(Menu),
    /// Replaces the text of the message the user just interacted with.
    Update(String),
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply: Reply) -> Result<()>;
}

pub const MSG_CANCELLED: &str = "⏹ Operation cancelled.";
pub const MSG_INVALID_OPTION: &str = "Invalid option.";
pub const MSG_INVALID_FORMAT: &str = "Invalid format. Use: Title;Artist";
pub const MSG_DIRECT_PROMPT: &str = "🔎 Please enter your search as Title;Artist or keywords.";
pub const MSG_MANUAL_PROMPT: &str =
    "✏️ Please enter the metadata as Title;Artist. The album will be set to 'YTD Tracks'.";
pub const MSG_SUCCESS: &str = "✅ Download and tagging complete. File sent to pipeline.";
pub const MSG_FAILURE: &str = "❌ Download or tagging failed. Check logs.";
pub const MSG_STALE: &str = "This selection is no longer active. Send a link to start again.";
pub const MSG_BUSY: &str =
    "⚠️ You already have a download in progress. Finish it or send /cancel first.";

pub struct Conversation {
    search: Arc<dyn RecordingSearch>,
    executor: FetchAndTag,
    sessions: SessionStore,
    policy: LinkPolicy,
}

impl Conversation {
    pub fn new(search: Arc<dyn RecordingSearch>, executor: FetchAndTag, sessions: SessionStore) -> Self {
        Self {
            search,
            executor,
            sessions,
            policy: LinkPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_link_policy(mut self, policy: LinkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, user: UserKey, event: Event, out: &dyn ReplySink) -> Result<()> {
        match event {
            Event::Link(url) => self.start(user, url, out).await,
            Event::Text(text) => self.on_text(user, &text, out).await,
            Event::Action(action) => self.on_action(user, action, out).await,
            Event::Cancel => {
                if let Some(session) = self.sessions.remove(user) {
                    tracing::info!("User {} cancelled in state {}", user, session.state.name());
                }
                out.send(Reply::Text(MSG_CANCELLED.into())).await
            }
        }
    }

    async fn start(&self, user: UserKey, url: String, out: &dyn ReplySink) -> Result<()> {
        if let Some(active) = self.sessions.take(user) {
            match self.policy {
                LinkPolicy::Replace => {
                    tracing::info!("User {} replaced session for {} with {}", user, active.url, url);
                }
                LinkPolicy::Reject => {
                    self.sessions.put(user, active);
                    return out.send(Reply::Text(MSG_BUSY.into())).await;
                }
            }
        }

        tracing::info!("User {} started a session for {}", user, url);
        let session = Session::new(url);

        let guess = match self.executor.fetcher().guess_title(&session.url).await {
            Ok(Some(title)) if !title.trim().is_empty() => title.trim().to_owned(),
            Ok(_) => session.url.clone(),
            Err(e) => {
                tracing::warn!("Title lookup failed for {}: {:#}", session.url, e);
                session.url.clone()
            }
        };

        out.send(Reply::Text(format!("🔎 Searching MusicBrainz for: '{guess}'")))
            .await?;
        self.show_page(user, session, guess, 1, out).await
    }

    /// Fetches and presents one page, leaving the session in `Choosing`.
    async fn show_page(
        &self,
        user: UserKey,
        mut session: Session,
        query: String,
        page: u32,
        out: &dyn ReplySink,
    ) -> Result<()> {
        let candidates = search::search_page(self.search.as_ref(), &query, page).await;
        let menu = presenter::present(&candidates, &query, page);

        session.state = SessionState::Choosing(CandidatePage {
            query,
            page,
            candidates,
        });
        self.sessions.put(user, session);
        out.send(Reply::Menu(menu)).await
    }

    async fn on_action(&self, user: UserKey, action: Action, out: &dyn ReplySink) -> Result<()> {
        let Some(mut session) = self.sessions.take(user) else {
            return out.send(Reply::Update(MSG_STALE.into())).await;
        };

        let SessionState::Choosing(current) = &session.state else {
            tracing::debug!("Ignoring {:?} from {} in state {}", action, user, session.state.name());
            self.sessions.put(user, session);
            return Ok(());
        };

        match action {
            Action::Choose(idx) => {
                let Some(record) = current.candidates.get(idx) else {
                    tracing::warn!("User {} chose {} of {} candidates", user, idx, current.candidates.len());
                    return out.send(Reply::Update(MSG_INVALID_OPTION.into())).await;
                };
                let metadata = record.resolve();
                out.send(Reply::Update(format!("🎵 Using: {metadata}"))).await?;
                self.finish(user, session, metadata, out).await
            }
            Action::Again => {
                let query = current.query.clone();
                let next = current.page + 1;
                self.show_page(user, session, query, next, out).await
            }
            Action::Direct => {
                session.state = SessionState::DirectSearch;
                self.sessions.put(user, session);
                out.send(Reply::Update(MSG_DIRECT_PROMPT.into())).await
            }
            Action::Manual => {
                session.state = SessionState::ManualEntry;
                self.sessions.put(user, session);
                out.send(Reply::Update(MSG_MANUAL_PROMPT.into())).await
            }
            Action::Unknown(raw) => {
                tracing::warn!("User {} sent unknown action '{}'", user, raw);
                out.send(Reply::Update(MSG_INVALID_OPTION.into())).await
            }
        }
    }

    async fn on_text(&self, user: UserKey, text: &str, out: &dyn ReplySink) -> Result<()> {
        let Some(session) = self.sessions.take(user) else {
            tracing::debug!("No session for {}, ignoring text", user);
            return Ok(());
        };

        match session.state {
            SessionState::DirectSearch => {
                let query = match candidate::split_title_artist(text) {
                    Some((title, artist)) => format!("{title} {artist}"),
                    None => text.trim().to_owned(),
                };
                self.show_page(user, session, query, 1, out).await
            }
            SessionState::ManualEntry => match ResolvedMetadata::from_manual_entry(text) {
                Some(metadata) => {
                    out.send(Reply::Text(format!("🎵 Manual metadata set: {metadata}")))
                        .await?;
                    self.finish(user, session, metadata, out).await
                }
                None => {
                    self.sessions.put(user, session);
                    out.send(Reply::Text(MSG_INVALID_FORMAT.into())).await
                }
            },
            SessionState::AwaitingInput | SessionState::Choosing(_) => {
                tracing::debug!("Ignoring text from {} in state {}", user, session.state.name());
                self.sessions.put(user, session);
                Ok(())
            }
            SessionState::Done => Ok(()),
        }
    }

    /// Resolves the session's metadata and runs the fetch. The session ends
    /// whatever the outcome.
    async fn finish(
        &self,
        user: UserKey,
        mut session: Session,
        metadata: ResolvedMetadata,
        out: &dyn ReplySink,
    ) -> Result<()> {
        let metadata = session.resolve(metadata)?.clone();
        session.state = SessionState::Done;

        out.send(Reply::Text(format!(
            "⬇️ Downloading and tagging: {} — {}",
            metadata.title, metadata.artist
        )))
        .await?;

        let notice = match self.executor.run(&session.url, &metadata).await {
            Ok(path) => {
                tracing::info!("User {} finished {} -> {}", user, session.url, path.display());
                MSG_SUCCESS
            }
            Err(e) => {
                tracing::error!("Download/tag error for {}: {:?}", session.url, e);
                MSG_FAILURE
            }
        };
        out.send(Reply::Text(notice.into())).await
    }
}
