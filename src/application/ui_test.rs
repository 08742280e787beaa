use std::sync::Arc;

use anyhow::Result;
use test_utils::sessions_fixture;
use yansi::Paint;

use super::format_message;
use super::format_session_header;
use super::Transcript;
use crate::domain::models::Message;
use crate::domain::models::Sender;
use crate::domain::models::StorageScope;
use crate::domain::services::SessionStore;
use crate::domain::services::SESSIONS_KEY;
use crate::infrastructure::storage::MemoryStorage;

async fn fixture_store() -> Result<SessionStore> {
    let storage = MemoryStorage::with_values(vec![(
        StorageScope::Device,
        SESSIONS_KEY,
        sessions_fixture(),
    )]);
    return SessionStore::load(Arc::new(storage)).await;
}

fn transcript_for(session_id: &str) -> Transcript {
    return Transcript {
        session_id: Some(session_id.to_string()),
        printed: 0,
        revealed: 0,
    };
}

#[test]
fn it_formats_messages() {
    Paint::disable();

    insta::assert_snapshot!(format_message(&Message::new(Sender::User, "Hi")), @"You: Hi");
    insta::assert_snapshot!(format_message(&Message::new(Sender::Ai, "Hello!")), @"AI: Hello!");
}

#[tokio::test]
async fn it_formats_empty_session_headers() -> Result<()> {
    Paint::disable();
    let store = fixture_store().await?;

    insta::assert_snapshot!(format_session_header(store.session("6f1c2a9e-41d2").unwrap()), @r###"
    == New Chat ==
    Ask me anything to get started.
    "###);

    return Ok(());
}

#[tokio::test]
async fn it_prints_each_message_once() -> Result<()> {
    Paint::disable();
    let store = fixture_store().await?;
    let mut transcript = transcript_for("0b7e55d1-9a3c");
    let mut out = vec![];

    transcript.catch_up(&mut out, &store)?;
    transcript.catch_up(&mut out, &store)?;

    insta::assert_snapshot!(String::from_utf8(out)?, @r###"
    You: How do I parse JSON in Rust?
    AI: Use serde_json::from_str with a type that derives Deserialize.
    "###);

    return Ok(());
}

#[tokio::test]
async fn it_streams_reveals_as_deltas() -> Result<()> {
    Paint::disable();
    let mut store = fixture_store().await?;
    let mut transcript = transcript_for("0b7e55d1-9a3c");
    transcript.skip_to_end(&store);
    let mut out = vec![];

    transcript.reveal(&mut out, "0b7e55d1-9a3c", "ABCDEFGHIJKLMNOPQRST")?;
    transcript.reveal(&mut out, "other-session", "Not shown")?;
    transcript.reveal(&mut out, "0b7e55d1-9a3c", "ABCDEFGHIJKLMNOPQRSTUVWXYZ")?;

    store
        .add_message_to_session(
            "0b7e55d1-9a3c",
            Message::new(Sender::Ai, "ABCDEFGHIJKLMNOPQRSTUVWXYZ"),
        )
        .await?;
    transcript.catch_up(&mut out, &store)?;

    assert_eq!(String::from_utf8(out)?, "AI: ABCDEFGHIJKLMNOPQRSTUVWXYZ\n");

    return Ok(());
}

#[tokio::test]
async fn it_prints_unrevealed_answers_whole() -> Result<()> {
    Paint::disable();
    let mut store = fixture_store().await?;
    let mut transcript = transcript_for("0b7e55d1-9a3c");
    transcript.skip_to_end(&store);
    let mut out = vec![];

    store
        .add_message_to_session("0b7e55d1-9a3c", Message::new(Sender::Ai, "Sorry!"))
        .await?;
    transcript.catch_up(&mut out, &store)?;

    assert_eq!(String::from_utf8(out)?, "AI: Sorry!\n");

    return Ok(());
}

#[tokio::test]
async fn it_ends_abandoned_reveals_before_the_next_answer() -> Result<()> {
    Paint::disable();
    let mut store = fixture_store().await?;
    let mut transcript = transcript_for("0b7e55d1-9a3c");
    transcript.skip_to_end(&store);
    let mut out = vec![];

    transcript.reveal(&mut out, "0b7e55d1-9a3c", "Half an ans")?;
    transcript.abandon_reveal(&mut out)?;
    transcript.abandon_reveal(&mut out)?;

    store
        .add_message_to_session("0b7e55d1-9a3c", Message::new(Sender::Ai, "Sorry!"))
        .await?;
    transcript.catch_up(&mut out, &store)?;

    assert_eq!(String::from_utf8(out)?, "AI: Half an ans\nAI: Sorry!\n");

    return Ok(());
}
