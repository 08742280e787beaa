#[cfg(test)]
#[path = "chat_orchestrator_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use super::Reveal;
use super::ResponseScheduler;
use super::SessionStore;
use crate::domain::models::Attachment;
use crate::domain::models::BackendBox;
use crate::domain::models::ChatError;
use crate::domain::models::ChatMessage;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Sender;

pub const APOLOGY_TEXT: &str = "I'm sorry, I'm having trouble connecting to my AI service right now. Please try again in a moment.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingResponse,
    Revealing,
}

struct BackendRequest {
    prompt: String,
    history: Vec<ChatMessage>,
    attachment: Option<Attachment>,
}

/// Drives a single chat view: user turn, backend call, reveal, commit. Only
/// one turn is in flight at a time, anything submitted meanwhile is ignored.
pub struct ChatOrchestrator {
    session_id: String,
    state: ChatState,
    backend: BackendBox,
    scheduler: ResponseScheduler,
    tx: mpsc::UnboundedSender<Event>,
    worker: Option<JoinHandle<()>>,
    turn: Option<String>,
    auto_submitted: bool,
    timeout: Option<Duration>,
}

impl ChatOrchestrator {
    pub fn new(
        session_id: &str,
        backend: BackendBox,
        tx: mpsc::UnboundedSender<Event>,
    ) -> ChatOrchestrator {
        return ChatOrchestrator {
            session_id: session_id.to_string(),
            state: ChatState::Idle,
            backend,
            scheduler: ResponseScheduler::new(tx.clone()),
            tx,
            worker: None,
            turn: None,
            auto_submitted: false,
            timeout: None,
        };
    }

    /// Backend calls running longer than `timeout` are treated as failed.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> ChatOrchestrator {
        self.timeout = timeout;
        return self;
    }

    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn state(&self) -> ChatState {
        return self.state;
    }

    pub fn is_busy(&self) -> bool {
        return self.state != ChatState::Idle;
    }

    /// Id the answer to the turn in flight will be stored under. Events
    /// carrying any other id belong to an abandoned turn.
    pub fn active_message_id(&self) -> Option<&str> {
        return self.turn.as_deref();
    }

    pub fn visible_reveal(&self) -> Option<Reveal> {
        return self.scheduler.visible();
    }

    /// Returns whether the input started a turn. Empty input without a file,
    /// or input while a turn is in flight, is ignored. Invalid attachments are
    /// rejected before anything is recorded.
    pub async fn submit(
        &mut self,
        store: &mut SessionStore,
        input: &str,
        attachment: Option<Attachment>,
    ) -> Result<bool> {
        if self.is_busy() {
            tracing::debug!(state = ?self.state, "Ignoring submit while busy");
            return Ok(false);
        }

        if input.trim().is_empty() && attachment.is_none() {
            return Ok(false);
        }

        if let Some(file) = &attachment {
            file.validate()?;
        }

        let history = match store.session(&self.session_id) {
            Some(session) => ChatMessage::from_history(&session.messages),
            None => {
                tracing::debug!(session_id = self.session_id, "Ignoring submit for unknown session");
                return Ok(false);
            }
        };

        let mut content = input.to_string();
        if let Some(file) = &attachment {
            if content.trim().is_empty() {
                content = format!("[{}]", file.name);
            } else {
                content = format!("{content}\n\n[{}]", file.name);
            }
        }

        store
            .add_message_to_session(&self.session_id, Message::new(Sender::User, &content))
            .await?;

        self.dispatch(BackendRequest {
            prompt: input.to_string(),
            history,
            attachment,
        });

        return Ok(true);
    }

    /// Picks up a session that was started from the landing view: its only
    /// message is the user's and nobody has answered it yet. Fires at most
    /// once per orchestrator.
    pub fn maybe_auto_submit(&mut self, store: &SessionStore) -> bool {
        if self.auto_submitted || self.is_busy() {
            return false;
        }

        let session = match store.session(&self.session_id) {
            Some(session) => session,
            None => return false,
        };

        if session.messages.len() != 1 || session.messages[0].sender != Sender::User {
            return false;
        }

        self.auto_submitted = true;
        tracing::debug!(session_id = self.session_id, "Auto submitting first message");
        self.dispatch(BackendRequest {
            prompt: session.messages[0].content.to_string(),
            history: vec![],
            attachment: None,
        });

        return true;
    }

    /// The state settles before the store is written, so a failed write
    /// still leaves the view ready for the next turn.
    pub async fn handle_event(&mut self, store: &mut SessionStore, event: &Event) -> Result<()> {
        match event {
            Event::BackendReplied {
                session_id,
                message_id,
                result,
            } => {
                if session_id != &self.session_id
                    || self.state != ChatState::AwaitingResponse
                    || self.turn.as_deref() != Some(message_id.as_str())
                {
                    return Ok(());
                }
                self.worker = None;

                match result {
                    Ok(text) => {
                        self.state = ChatState::Revealing;
                        if let Err(err) =
                            self.scheduler
                                .start(&self.session_id, message_id, text.to_string())
                        {
                            tracing::error!(error = %err, "Failed to start reveal");
                            self.finish_turn();
                        }
                    }
                    Err(err) => {
                        tracing::warn!(session_id, error = %err, "Backend request failed");
                        self.finish_turn();
                        store
                            .add_message_to_session(
                                &self.session_id,
                                Message::new(Sender::Ai, APOLOGY_TEXT),
                            )
                            .await?;
                    }
                }
            }
            Event::RevealFinished {
                session_id,
                message,
            } => {
                if session_id != &self.session_id
                    || self.state != ChatState::Revealing
                    || self.turn.as_deref() != Some(message.id.as_str())
                {
                    return Ok(());
                }

                self.finish_turn();
                store
                    .add_message_to_session(&self.session_id, message.clone())
                    .await?;
            }
            _ => (),
        }

        return Ok(());
    }

    /// Abandons whatever turn is in flight. Nothing further is committed for
    /// it.
    pub fn teardown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.scheduler.cancel();
        self.finish_turn();
    }

    fn finish_turn(&mut self) {
        self.turn = None;
        self.state = ChatState::Idle;
    }

    fn dispatch(&mut self, request: BackendRequest) {
        let message_id = Message::create_id();
        self.state = ChatState::AwaitingResponse;
        self.turn = Some(message_id.to_string());

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let session_id = self.session_id.to_string();
        let timeout = self.timeout;

        self.worker = Some(tokio::spawn(async move {
            let call = async {
                return match &request.attachment {
                    None => {
                        backend
                            .send_message(&request.prompt, &request.history)
                            .await
                    }
                    Some(file) if request.prompt.trim().is_empty() => {
                        backend.send_file(file).await
                    }
                    Some(file) => {
                        backend
                            .analyze_document_with_prompt(file, &request.prompt, &request.history)
                            .await
                    }
                };
            };

            let res = match timeout {
                Some(duration) => match time::timeout(duration, call).await {
                    Ok(res) => res,
                    Err(_) => Err(anyhow::anyhow!(
                        "No response within {}ms",
                        duration.as_millis()
                    )),
                },
                None => call.await,
            };

            let result = res.map_err(|err| return ChatError::Backend(err.to_string()));
            let _ = tx.send(Event::BackendReplied {
                session_id,
                message_id,
                result,
            });
        }));
    }
}

impl Drop for ChatOrchestrator {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
