#[cfg(test)]
#[path = "session_store_test.rs"]
mod tests;

use anyhow::Result;

use crate::domain::models::ChatError;
use crate::domain::models::Message;
use crate::domain::models::Sender;
use crate::domain::models::Session;
use crate::domain::models::SessionUpdate;
use crate::domain::models::StorageBox;
use crate::domain::models::StorageScope;

pub const SESSIONS_KEY: &str = "chat-sessions";
pub const CURRENT_SESSION_KEY: &str = "current-session-id";
pub const VISIT_MARKER_KEY: &str = "visited-before";

/// Id of the message a session is seeded with on creation.
pub const SEED_MESSAGE_ID: &str = "1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum View {
    Landing,
    Chat(String),
}

/// Owns every conversation and the pointer to the active one. Every mutation
/// writes the full collection back to storage before returning, so the last
/// write always reflects the in-memory state.
///
/// Titles passed to `rename_session` and `update_session` are stored verbatim.
/// Trimming and rejecting empty titles is the caller's job.
pub struct SessionStore {
    storage: StorageBox,
    sessions: Vec<Session>,
    current_session_id: Option<String>,
    is_fresh_entry: bool,
}

impl SessionStore {
    pub async fn load(storage: StorageBox) -> Result<SessionStore> {
        let mut store = SessionStore {
            storage,
            sessions: vec![],
            current_session_id: None,
            is_fresh_entry: true,
        };

        let visited_before = store
            .storage
            .get(StorageScope::Visit, VISIT_MARKER_KEY)
            .await?
            .is_some();

        match store.read_persisted().await {
            Ok(Some(sessions)) => {
                store.sessions = sessions;

                let stored_current = store
                    .storage
                    .get(StorageScope::Device, CURRENT_SESSION_KEY)
                    .await?;
                if let Some(session_id) = stored_current {
                    if store.session(&session_id).is_some() {
                        store.current_session_id = Some(session_id);
                        if visited_before {
                            store.is_fresh_entry = false;
                        }
                    } else {
                        tracing::debug!(session_id, "Dropping stored current session id");
                    }
                }
            }
            Ok(None) => (),
            Err(err) => {
                tracing::warn!(error = %err, "Resetting stored sessions");
                store.erase_persisted().await?;
            }
        }

        store
            .storage
            .set(StorageScope::Visit, VISIT_MARKER_KEY, "true")
            .await?;

        tracing::debug!(
            sessions = store.sessions.len(),
            current_session_id = ?store.current_session_id,
            is_fresh_entry = store.is_fresh_entry,
            "Loaded session store"
        );

        return Ok(store);
    }

    pub fn sessions(&self) -> &[Session] {
        return &self.sessions;
    }

    /// Sessions in display order, most recently updated first.
    pub fn sessions_by_recency(&self) -> Vec<&Session> {
        let mut sessions = self.sessions.iter().collect::<Vec<&Session>>();
        sessions.sort_by(|a, b| return b.updated_at.cmp(&a.updated_at));
        return sessions;
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        return self
            .sessions
            .iter()
            .find(|session| return session.id == session_id);
    }

    /// Resolves either a session id or a 1-based index into
    /// `sessions_by_recency`.
    pub fn resolve_session(&self, reference: &str) -> Option<&Session> {
        if let Some(session) = self.session(reference) {
            return Some(session);
        }

        if let Ok(idx) = reference.parse::<usize>() {
            if idx >= 1 {
                return self.sessions_by_recency().get(idx - 1).copied();
            }
        }

        return None;
    }

    pub fn current_session_id(&self) -> Option<&str> {
        return self.current_session_id.as_deref();
    }

    pub fn get_current_session(&self) -> Option<&Session> {
        let session_id = self.current_session_id.as_deref()?;
        return self.session(session_id);
    }

    pub fn is_fresh_entry(&self) -> bool {
        return self.is_fresh_entry;
    }

    pub fn view(&self) -> View {
        if let Some(session_id) = &self.current_session_id {
            if !self.is_fresh_entry {
                return View::Chat(session_id.to_string());
            }
        }

        return View::Landing;
    }

    pub async fn create_session(&mut self, initial_message: Option<&str>) -> Result<String> {
        let seed = initial_message
            .map(|content| return Message::with_id(SEED_MESSAGE_ID, Sender::User, content));
        let session = Session::new(seed);
        let session_id = session.id.to_string();

        self.sessions.push(session);
        self.current_session_id = Some(session_id.to_string());
        self.is_fresh_entry = false;

        tracing::debug!(session_id, seeded = initial_message.is_some(), "Created session");
        self.persist().await?;

        return Ok(session_id);
    }

    /// Unknown session ids are ignored.
    pub async fn add_message_to_session(&mut self, session_id: &str, message: Message) -> Result<()> {
        let session = match self.session_mut(session_id) {
            Some(session) => session,
            None => return Ok(()),
        };

        if session.messages.len() == 1 && message.sender == Sender::User {
            session.title = Session::title_from(&message.content);
        }
        session.messages.push(message);
        session.touch();

        return self.persist().await;
    }

    pub async fn update_session(&mut self, session_id: &str, update: SessionUpdate) -> Result<()> {
        let session = match self.session_mut(session_id) {
            Some(session) => session,
            None => return Ok(()),
        };

        if let Some(title) = update.title {
            session.title = title;
        }
        session.touch();

        return self.persist().await;
    }

    pub async fn rename_session(&mut self, session_id: &str, new_title: &str) -> Result<()> {
        let session = match self.session_mut(session_id) {
            Some(session) => session,
            None => return Ok(()),
        };

        session.title = new_title.to_string();
        session.touch();

        return self.persist().await;
    }

    pub async fn delete_session(&mut self, session_id: &str) -> Result<()> {
        let before = self.sessions.len();
        self.sessions.retain(|session| return session.id != session_id);
        if self.sessions.len() == before {
            tracing::debug!(session_id, "Ignoring delete of unknown session");
            return Ok(());
        }

        if self.current_session_id.as_deref() == Some(session_id) {
            self.current_session_id = self
                .sessions
                .last()
                .map(|session| return session.id.to_string());
        }

        tracing::debug!(
            session_id,
            current_session_id = ?self.current_session_id,
            "Deleted session"
        );

        return self.persist().await;
    }

    /// Selecting a session counts as engaging with it, so `Some` also clears
    /// the fresh entry flag.
    pub async fn set_current_session_id(&mut self, session_id: Option<&str>) -> Result<()> {
        self.current_session_id = session_id.map(|id| return id.to_string());
        if session_id.is_some() {
            self.is_fresh_entry = false;
        }

        return self.persist_current_session_id().await;
    }

    pub async fn clear_sessions(&mut self) -> Result<()> {
        self.sessions = vec![];
        self.current_session_id = None;

        tracing::debug!("Cleared all sessions");
        return self.erase_persisted().await;
    }

    fn session_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        let session = self
            .sessions
            .iter_mut()
            .find(|session| return session.id == session_id);

        if session.is_none() {
            tracing::debug!(session_id, "Ignoring mutation of unknown session");
        }

        return session;
    }

    /// Reading and parsing failures both count as a corrupt collection.
    async fn read_persisted(&self) -> Result<Option<Vec<Session>>, ChatError> {
        let payload = match self.storage.get(StorageScope::Device, SESSIONS_KEY).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok(None),
            Err(err) => return Err(ChatError::PersistedStateCorrupt(err.to_string())),
        };

        match serde_json::from_str::<Vec<Session>>(&payload) {
            Ok(sessions) => return Ok(Some(sessions)),
            Err(err) => return Err(ChatError::PersistedStateCorrupt(err.to_string())),
        }
    }

    async fn persist(&self) -> Result<()> {
        let payload = serde_json::to_string(&self.sessions)?;
        self.storage
            .set(StorageScope::Device, SESSIONS_KEY, &payload)
            .await?;

        return self.persist_current_session_id().await;
    }

    async fn persist_current_session_id(&self) -> Result<()> {
        match &self.current_session_id {
            Some(session_id) => {
                self.storage
                    .set(StorageScope::Device, CURRENT_SESSION_KEY, session_id)
                    .await?;
            }
            None => {
                self.storage
                    .remove(StorageScope::Device, CURRENT_SESSION_KEY)
                    .await?;
            }
        }

        return Ok(());
    }

    async fn erase_persisted(&self) -> Result<()> {
        self.storage
            .remove(StorageScope::Device, SESSIONS_KEY)
            .await?;
        self.storage
            .remove(StorageScope::Device, CURRENT_SESSION_KEY)
            .await?;

        return Ok(());
    }
}
