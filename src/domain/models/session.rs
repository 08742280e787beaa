#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use uuid::Uuid;

use super::Message;

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(with = "super::message::iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::message::iso8601")]
    pub updated_at: DateTime<Utc>,
}

/// Fields `SessionStore::update_session` merges into a session. Messages are
/// absent, history only grows through appends.
#[derive(Clone, Debug, Default)]
pub struct SessionUpdate {
    pub title: Option<String>,
}

impl Session {
    pub fn new(initial_message: Option<Message>) -> Session {
        let now = Utc::now();
        let mut session = Session {
            id: Session::create_id(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: vec![],
            created_at: now,
            updated_at: now,
        };

        if let Some(message) = initial_message {
            session.title = Session::title_from(&message.content);
            session.messages.push(message);
        }

        return session;
    }

    pub fn create_id() -> String {
        return Uuid::new_v4()
            .to_string()
            .split('-')
            .enumerate()
            .filter_map(|(idx, str)| {
                if idx > 1 {
                    return None;
                }
                return Some(str);
            })
            .collect::<Vec<&str>>()
            .join("-");
    }

    pub fn title_from(text: &str) -> String {
        if text.chars().count() <= TITLE_MAX_CHARS {
            return text.to_string();
        }

        let truncated = text.chars().take(TITLE_MAX_CHARS).collect::<String>();
        return format!("{truncated}...");
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
