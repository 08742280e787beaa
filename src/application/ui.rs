#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use std::io;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatEndpoint;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Sender;
use crate::domain::models::Session;
use crate::domain::services::events::EventsService;
use crate::domain::services::AppState;
use crate::domain::services::InputOutcome;
use crate::domain::services::SessionStore;
use crate::domain::services::View;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::storage::FileStorage;

pub fn format_landing() -> String {
    return [
        Paint::new("Hey there! What can I do for you?").bold().to_string(),
        "Type a message to start a new chat, /sessions to pick up an earlier one, or /help for everything else.".to_string(),
    ]
    .join("\n");
}

pub fn format_sender(sender: Sender) -> String {
    match sender {
        Sender::User => return Paint::cyan(format!("{}:", sender.to_string())).bold().to_string(),
        Sender::Ai => return Paint::magenta(format!("{}:", sender.to_string())).bold().to_string(),
    }
}

pub fn format_message(message: &Message) -> String {
    return format!("{} {}", format_sender(message.sender), message.content);
}

pub fn format_session_header(session: &Session) -> String {
    let mut res = Paint::new(format!("== {} ==", session.title))
        .bold()
        .to_string();
    if session.messages.is_empty() {
        res = format!("{res}\nAsk me anything to get started.");
    }

    return res;
}

/// Tracks what of the active session has reached the terminal so each
/// message and each reveal slice is printed exactly once.
#[derive(Default)]
pub struct Transcript {
    session_id: Option<String>,
    printed: usize,
    revealed: usize,
}

impl Transcript {
    /// Prints the whole view from scratch.
    pub fn render(&mut self, out: &mut impl Write, app_state: &AppState) -> Result<()> {
        self.revealed = 0;
        self.printed = 0;
        self.session_id = None;

        if let View::Chat(session_id) = app_state.view() {
            if let Some(session) = app_state.store.session(&session_id) {
                writeln!(out, "{}", format_session_header(session))?;
                self.session_id = Some(session_id);
            }
        }

        match &self.session_id {
            Some(_) => self.catch_up(out, &app_state.store)?,
            None => writeln!(out, "{}", format_landing())?,
        }

        return Ok(());
    }

    /// Prints messages appended since the last call. A message whose reveal
    /// was streamed only needs its line ended.
    pub fn catch_up(&mut self, out: &mut impl Write, store: &SessionStore) -> Result<()> {
        let session = match self
            .session_id
            .as_deref()
            .and_then(|session_id| return store.session(session_id))
        {
            Some(session) => session,
            None => return Ok(()),
        };

        for message in session.messages.iter().skip(self.printed) {
            if self.revealed > 0 && message.sender == Sender::Ai {
                writeln!(out)?;
                self.revealed = 0;
            } else {
                writeln!(out, "{}", format_message(message))?;
            }
        }
        self.printed = session.messages.len();

        return Ok(());
    }

    /// Marks everything currently stored as already on screen, used for the
    /// lines the user just typed.
    pub fn skip_to_end(&mut self, store: &SessionStore) {
        if let Some(session) = self
            .session_id
            .as_deref()
            .and_then(|session_id| return store.session(session_id))
        {
            self.printed = session.messages.len();
        }
    }

    /// Ends a streamed line whose message never made it into the store.
    pub fn abandon_reveal(&mut self, out: &mut impl Write) -> Result<()> {
        if self.revealed > 0 {
            writeln!(out)?;
            self.revealed = 0;
        }

        return Ok(());
    }

    pub fn reveal(&mut self, out: &mut impl Write, session_id: &str, content: &str) -> Result<()> {
        if self.session_id.as_deref() != Some(session_id) || content.len() < self.revealed {
            return Ok(());
        }

        if self.revealed == 0 {
            write!(out, "{} ", format_sender(Sender::Ai))?;
        }
        write!(out, "{}", &content[self.revealed..])?;
        out.flush()?;
        self.revealed = content.len();

        return Ok(());
    }
}

fn print_prompt(out: &mut impl Write, app_state: &AppState) -> Result<()> {
    if app_state.is_busy() {
        return Ok(());
    }

    let mut prompt = "> ".to_string();
    if let Some(attachment) = app_state.pending_attachment() {
        prompt = format!("[{}] > ", attachment.name);
    }
    write!(out, "{}", Paint::new(prompt).dimmed())?;
    out.flush()?;

    return Ok(());
}

async fn start_loop(
    app_state: &mut AppState,
    events: &mut EventsService,
    out: &mut impl Write,
) -> Result<()> {
    let mut transcript = Transcript::default();
    let mut input_closed = false;

    transcript.render(out, app_state)?;
    if let Some(notice) = app_state.health_notice().await {
        writeln!(out, "{}", Paint::yellow(notice))?;
    }
    print_prompt(out, app_state)?;

    loop {
        let event = events.next().await?;

        match &event {
            Event::UserInput(line) => {
                match app_state.handle_input(line).await {
                    Ok(InputOutcome::Quit) => break,
                    Ok(InputOutcome::SwitchedSession(_)) => {
                        transcript.render(out, app_state)?;
                    }
                    Ok(InputOutcome::Notice(text)) => {
                        writeln!(out, "{text}")?;
                    }
                    Ok(InputOutcome::Submitted) => {
                        transcript.skip_to_end(&app_state.store);
                    }
                    Ok(InputOutcome::Ignored) => (),
                    Err(err) => {
                        tracing::debug!(error = %err, "Input rejected");
                        writeln!(out, "{}", Paint::red(err.to_string()))?;
                    }
                }
                print_prompt(out, app_state)?;
                continue;
            }
            Event::UserInputClosed() => {
                input_closed = true;
            }
            Event::RevealProgress {
                session_id,
                message_id,
                content,
            } => {
                let active_message_id = app_state
                    .orchestrator()
                    .and_then(|orchestrator| return orchestrator.active_message_id());
                if active_message_id == Some(message_id.as_str()) {
                    transcript.reveal(out, session_id, content)?;
                }
            }
            _ => (),
        }

        let was_busy = app_state.is_busy();
        if let Err(err) = app_state.handle_event(&event).await {
            tracing::error!(error = %err, "Failed to save the chat");
            transcript.abandon_reveal(out)?;
            writeln!(out, "{}", Paint::red(format!("Couldn't save the chat: {err}")))?;
        }
        transcript.catch_up(out, &app_state.store)?;

        if input_closed && !app_state.is_busy() {
            break;
        }
        if was_busy && !app_state.is_busy() {
            print_prompt(out, app_state)?;
        }
    }

    writeln!(out)?;
    return Ok(());
}

pub async fn start() -> Result<()> {
    let store = SessionStore::load(Arc::new(FileStorage::default())).await?;
    let (tx, rx) = mpsc::unbounded_channel::<Event>();

    let endpoint =
        ChatEndpoint::parse(Config::get(ConfigKey::Endpoint)).unwrap_or(ChatEndpoint::Chat);
    let mut app_state = AppState::new(
        store,
        BackendManager::get(endpoint),
        tx,
        Config::get_duration(ConfigKey::BackendTimeout),
    );

    let session_id = Config::get(ConfigKey::SessionID);
    if !session_id.is_empty() {
        app_state
            .store
            .set_current_session_id(Some(&session_id))
            .await?;
    }

    let prompt = Config::get(ConfigKey::Prompt);
    app_state.start(Some(prompt.as_str())).await?;

    let mut events = EventsService::new(rx);
    let mut stdout = io::stdout();
    start_loop(&mut app_state, &mut events, &mut stdout).await?;

    return Ok(());
}
