use anyhow::bail;
use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;
use tokio::sync::mpsc;

use crate::domain::models::Event;

/// Merges lines typed on stdin with events coming back from backend calls and
/// reveals, in arrival order.
pub struct EventsService {
    stdin_lines: Option<Lines<BufReader<Stdin>>>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl EventsService {
    pub fn new(events: mpsc::UnboundedReceiver<Event>) -> EventsService {
        return EventsService {
            stdin_lines: Some(BufReader::new(tokio::io::stdin()).lines()),
            events,
        };
    }

    /// Once stdin reaches EOF `Event::UserInputClosed` is returned a single
    /// time, after which only channel events are delivered.
    pub async fn next(&mut self) -> Result<Event> {
        let evt = match &mut self.stdin_lines {
            Some(stdin_lines) => {
                tokio::select! {
                    event = self.events.recv() => event,
                    line = stdin_lines.next_line() => match line? {
                        Some(text) => Some(Event::UserInput(text)),
                        None => Some(Event::UserInputClosed()),
                    }
                }
            }
            None => self.events.recv().await,
        };

        match evt {
            Some(Event::UserInputClosed()) => {
                self.stdin_lines = None;
                return Ok(Event::UserInputClosed());
            }
            Some(event) => return Ok(event),
            None => bail!("Event channel closed"),
        }
    }
}
