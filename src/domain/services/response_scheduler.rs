#[cfg(test)]
#[path = "response_scheduler_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::domain::models::ChatError;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Sender;

pub const REVEAL_CHUNK_SIZE: usize = 20;
pub const FAST_REVEAL_THRESHOLD: usize = 500;
const MIN_DELAY_MS: u64 = 20;
const MAX_DELAY_MS: u64 = 30;

/// What is currently visible of a response being revealed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reveal {
    pub session_id: String,
    pub message_id: String,
    pub content: String,
}

/// Byte offsets at which each successive slice of `text` ends, stepping
/// `chunk_size` characters at a time. The last offset is always `text.len()`.
pub fn reveal_boundaries(text: &str, chunk_size: usize) -> Vec<usize> {
    let mut boundaries = text
        .char_indices()
        .enumerate()
        .filter_map(|(idx, (offset, _))| {
            if idx > 0 && idx % chunk_size == 0 {
                return Some(offset);
            }
            return None;
        })
        .collect::<Vec<usize>>();

    if !text.is_empty() {
        boundaries.push(text.len());
    }

    return boundaries;
}

/// Long answers reveal at the fastest pace, short ones get a little jitter.
pub fn reveal_delay(char_count: usize) -> Duration {
    if char_count > FAST_REVEAL_THRESHOLD {
        return Duration::from_millis(MIN_DELAY_MS);
    }

    let millis = rand::thread_rng().gen_range(MIN_DELAY_MS..=MAX_DELAY_MS);
    return Duration::from_millis(millis);
}

/// Reveals a complete answer a slice at a time, then hands the finished
/// message back as `Event::RevealFinished`. One reveal at a time.
pub struct ResponseScheduler {
    tx: mpsc::UnboundedSender<Event>,
    visible: Arc<watch::Sender<Option<Reveal>>>,
    worker: Option<JoinHandle<()>>,
}

impl ResponseScheduler {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> ResponseScheduler {
        let (visible, _) = watch::channel(None);

        return ResponseScheduler {
            tx,
            visible: Arc::new(visible),
            worker: None,
        };
    }

    pub fn is_active(&self) -> bool {
        return self.visible.borrow().is_some();
    }

    pub fn visible(&self) -> Option<Reveal> {
        return self.visible.borrow().clone();
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Reveal>> {
        return self.visible.subscribe();
    }

    pub fn start(
        &mut self,
        session_id: &str,
        message_id: &str,
        full_text: String,
    ) -> Result<(), ChatError> {
        if let Some(reveal) = self.visible() {
            tracing::warn!(
                message_id = reveal.message_id,
                rejected_message_id = message_id,
                "Rejecting reveal while another is in progress"
            );
            return Err(ChatError::RevealInProgress(reveal.message_id));
        }

        let reveal = Reveal {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            content: "".to_string(),
        };
        self.visible.send_replace(Some(reveal.clone()));

        tracing::debug!(
            session_id,
            message_id,
            chars = full_text.chars().count(),
            "Starting reveal"
        );

        let tx = self.tx.clone();
        let visible = self.visible.clone();
        self.worker = Some(tokio::spawn(async move {
            run_reveal(reveal, full_text, tx, visible).await;
        }));

        return Ok(());
    }

    /// Stops the reveal without finalizing it.
    pub fn cancel(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }

        if let Some(reveal) = self.visible.send_replace(None) {
            tracing::debug!(message_id = reveal.message_id, "Cancelled reveal");
        }
    }
}

impl Drop for ResponseScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_reveal(
    mut reveal: Reveal,
    full_text: String,
    tx: mpsc::UnboundedSender<Event>,
    visible: Arc<watch::Sender<Option<Reveal>>>,
) {
    let char_count = full_text.chars().count();

    for cursor in reveal_boundaries(&full_text, REVEAL_CHUNK_SIZE) {
        reveal.content = full_text[..cursor].to_string();
        visible.send_replace(Some(reveal.clone()));

        let progress = Event::RevealProgress {
            session_id: reveal.session_id.to_string(),
            message_id: reveal.message_id.to_string(),
            content: reveal.content.to_string(),
        };
        if tx.send(progress).is_err() {
            visible.send_replace(None);
            return;
        }

        time::sleep(reveal_delay(char_count)).await;
    }

    let message = Message::with_id(&reveal.message_id, Sender::Ai, &full_text);
    visible.send_replace(None);

    tracing::debug!(
        session_id = reveal.session_id,
        message_id = reveal.message_id,
        "Finished reveal"
    );

    let _ = tx.send(Event::RevealFinished {
        session_id: reveal.session_id,
        message,
    });
}
