use super::ChatError;
use super::Message;

pub enum Event {
    BackendReplied {
        session_id: String,
        message_id: String,
        result: Result<String, ChatError>,
    },
    RevealProgress {
        session_id: String,
        message_id: String,
        content: String,
    },
    RevealFinished {
        session_id: String,
        message: Message,
    },
    UserInput(String),
    UserInputClosed(),
}
