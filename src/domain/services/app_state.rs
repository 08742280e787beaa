#[cfg(test)]
#[path = "app_state_test.rs"]
mod tests;

use std::path;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use super::ChatOrchestrator;
use super::SessionStore;
use super::View;
use crate::domain::models::Attachment;
use crate::domain::models::BackendBox;
use crate::domain::models::ChatError;
use crate::domain::models::Event;
use crate::domain::models::Session;
use crate::domain::models::SlashCommand;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /new (/n) - Starts a new chat session.
- /sessions (/ls) - Lists all sessions, most recently updated first.
- /open (/o) [INDEX,SESSION_ID] - Switches to a session. You can pass either the session id, or the index from /sessions.
- /rename (/r) [TITLE] - Renames the current session.
- /delete (/d) [INDEX,SESSION_ID?] - Deletes a session. Defaults to the current session.
- /clear - Deletes every session.
- /attach (/a) [PATH] - Attaches a .txt, .pdf, or .docx file of up to 10 MiB to your next message.
- /detach - Removes the pending attachment.
- /quit /exit (/q) - Exit Parley.
- /help (/h) - Provides this help menu.
        "#;

    return text.trim().to_string();
}

/// One line per session for `/sessions`, numbered the way `/open` resolves
/// indexes.
pub fn format_session_list(store: &SessionStore) -> String {
    let sessions = store.sessions_by_recency();
    if sessions.is_empty() {
        return "There are no sessions yet. Type a message to start your first one!".to_string();
    }

    return sessions
        .iter()
        .enumerate()
        .map(|(idx, session)| {
            let mut line = format!("{}. {}", idx + 1, format_session(session));
            if store.current_session_id() == Some(session.id.as_str()) {
                line = format!("{line} (current)");
            }
            return line;
        })
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn format_session(session: &Session) -> String {
    return format!(
        "{} (ID: {}, Messages: {}, Updated: {})",
        session.title,
        session.id,
        session.messages.len(),
        session.updated_at.format("%Y-%m-%d %H:%M")
    );
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputOutcome {
    Quit,
    Ignored,
    Submitted,
    Notice(String),
    SwitchedSession(Option<String>),
}

/// Everything the terminal front-end drives: the session store, the active
/// chat view, and the attachment waiting for the next message.
pub struct AppState {
    pub store: SessionStore,
    backend: BackendBox,
    tx: mpsc::UnboundedSender<Event>,
    orchestrator: Option<ChatOrchestrator>,
    attachment: Option<Attachment>,
    backend_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        store: SessionStore,
        backend: BackendBox,
        tx: mpsc::UnboundedSender<Event>,
        backend_timeout: Option<Duration>,
    ) -> AppState {
        return AppState {
            store,
            backend,
            tx,
            orchestrator: None,
            attachment: None,
            backend_timeout,
        };
    }

    /// Opens the view the store points at. A prompt given up front behaves
    /// like typing it on the landing page.
    pub async fn start(&mut self, prompt: Option<&str>) -> Result<View> {
        if let Some(text) = prompt {
            if !text.trim().is_empty() {
                let session_id = self.store.create_session(Some(text)).await?;
                self.open_orchestrator(&session_id);
                return Ok(self.view());
            }
        }

        if let View::Chat(session_id) = self.store.view() {
            self.open_orchestrator(&session_id);
        }

        return Ok(self.view());
    }

    /// Returns a warning to show before the first prompt when the API can't
    /// be reached.
    pub async fn health_notice(&self) -> Option<String> {
        if let Err(err) = self.backend.health_check().await {
            tracing::warn!(error = %err, "Backend health check failed");
            return Some(format!(
                "Hey, it looks like the chat API isn't running, I can't connect to it. Messages will fail until it's back.\n\nError: {err}"
            ));
        }

        return None;
    }

    pub fn view(&self) -> View {
        if let Some(orchestrator) = &self.orchestrator {
            return View::Chat(orchestrator.session_id().to_string());
        }

        return View::Landing;
    }

    pub fn orchestrator(&self) -> Option<&ChatOrchestrator> {
        return self.orchestrator.as_ref();
    }

    pub fn is_busy(&self) -> bool {
        return self
            .orchestrator
            .as_ref()
            .map(|orchestrator| return orchestrator.is_busy())
            .unwrap_or(false);
    }

    pub fn pending_attachment(&self) -> Option<&Attachment> {
        return self.attachment.as_ref();
    }

    pub async fn handle_input(&mut self, line: &str) -> Result<InputOutcome> {
        if let Some(command) = SlashCommand::parse(line) {
            return self.handle_slash_command(&command).await;
        }

        if line.trim().is_empty() && self.attachment.is_none() {
            return Ok(InputOutcome::Ignored);
        }

        if self.orchestrator.is_none() {
            if line.trim().is_empty() {
                return Ok(InputOutcome::Ignored);
            }
            let session_id = self.store.create_session(Some(line)).await?;
            self.open_orchestrator(&session_id);
            return Ok(InputOutcome::SwitchedSession(Some(session_id)));
        }

        let orchestrator = match &mut self.orchestrator {
            Some(orchestrator) => orchestrator,
            None => return Ok(InputOutcome::Ignored),
        };

        let attachment = self.attachment.take();
        let submitted = orchestrator
            .submit(&mut self.store, line, attachment.clone())
            .await;

        match submitted {
            Ok(true) => return Ok(InputOutcome::Submitted),
            Ok(false) => {
                self.attachment = attachment;
                return Ok(InputOutcome::Ignored);
            }
            Err(err) => {
                self.attachment = attachment;
                return Err(err);
            }
        }
    }

    pub async fn handle_event(&mut self, event: &Event) -> Result<()> {
        if let Some(orchestrator) = &mut self.orchestrator {
            orchestrator.handle_event(&mut self.store, event).await?;
        }

        return Ok(());
    }

    async fn handle_slash_command(&mut self, command: &SlashCommand) -> Result<InputOutcome> {
        if command.is_quit() {
            return Ok(InputOutcome::Quit);
        }

        if command.is_help() {
            return Ok(InputOutcome::Notice(help_text()));
        }

        if command.is_list_sessions() {
            return Ok(InputOutcome::Notice(format_session_list(&self.store)));
        }

        if command.is_new_session() {
            let session_id = self.store.create_session(None).await?;
            self.open_orchestrator(&session_id);
            return Ok(InputOutcome::SwitchedSession(Some(session_id)));
        }

        if command.is_open_session() {
            let session_id = self.resolve_session_id(&command.rest())?;
            self.store.set_current_session_id(Some(&session_id)).await?;
            self.open_orchestrator(&session_id);
            return Ok(InputOutcome::SwitchedSession(Some(session_id)));
        }

        if command.is_rename_session() {
            let title = command.rest();
            if title.trim().is_empty() {
                return Err(ChatError::EmptyTitle.into());
            }

            let session_id = match self.store.current_session_id() {
                Some(session_id) => session_id.to_string(),
                None => {
                    return Ok(InputOutcome::Notice(
                        "Open a session before renaming it.".to_string(),
                    ))
                }
            };
            self.store.rename_session(&session_id, title.trim()).await?;
            return Ok(InputOutcome::Notice(format!(
                "Renamed session to \"{}\"",
                title.trim()
            )));
        }

        if command.is_delete_session() {
            let reference = command.rest();
            let session_id = if reference.is_empty() {
                match self.store.current_session_id() {
                    Some(session_id) => session_id.to_string(),
                    None => {
                        return Ok(InputOutcome::Notice(
                            "There is no current session to delete.".to_string(),
                        ))
                    }
                }
            } else {
                self.resolve_session_id(&reference)?
            };

            let was_open = self.view() == View::Chat(session_id.to_string());
            self.store.delete_session(&session_id).await?;
            if !was_open {
                return Ok(InputOutcome::Notice(format!("Deleted session {session_id}")));
            }

            let next = self.store.current_session_id().map(|id| return id.to_string());
            match &next {
                Some(next_id) => self.open_orchestrator(next_id),
                None => self.close_orchestrator(),
            }
            return Ok(InputOutcome::SwitchedSession(next));
        }

        if command.is_clear_sessions() {
            self.close_orchestrator();
            self.store.clear_sessions().await?;
            return Ok(InputOutcome::SwitchedSession(None));
        }

        if command.is_attach() {
            let file_path = command.rest();
            if file_path.is_empty() {
                return Ok(InputOutcome::Notice("Usage: /attach PATH".to_string()));
            }

            let attachment = Attachment::from_path(path::Path::new(&file_path)).await?;
            attachment.validate()?;
            let notice = format!(
                "Attached {} ({} bytes). It will be sent with your next message.",
                attachment.name,
                attachment.size()
            );
            self.attachment = Some(attachment);
            return Ok(InputOutcome::Notice(notice));
        }

        if command.is_detach() {
            match self.attachment.take() {
                Some(attachment) => {
                    return Ok(InputOutcome::Notice(format!("Removed {}", attachment.name)));
                }
                None => return Ok(InputOutcome::Notice("Nothing is attached.".to_string())),
            }
        }

        return Ok(InputOutcome::Ignored);
    }

    fn resolve_session_id(&self, reference: &str) -> Result<String> {
        match self.store.resolve_session(reference) {
            Some(session) => return Ok(session.id.to_string()),
            None => return Err(ChatError::UnknownSessionId(reference.to_string()).into()),
        }
    }

    /// Replaces the active chat view. The previous view is torn down first,
    /// whatever it was revealing is discarded.
    fn open_orchestrator(&mut self, session_id: &str) {
        self.close_orchestrator();

        let mut orchestrator =
            ChatOrchestrator::new(session_id, self.backend.clone(), self.tx.clone())
                .with_timeout(self.backend_timeout);
        orchestrator.maybe_auto_submit(&self.store);
        self.orchestrator = Some(orchestrator);
    }

    fn close_orchestrator(&mut self) {
        if let Some(mut orchestrator) = self.orchestrator.take() {
            orchestrator.teardown();
        }
    }
}
