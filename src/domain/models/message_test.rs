use anyhow::Result;
use chrono::TimeZone;
use chrono::Utc;

use super::Message;
use super::Sender;

#[test]
fn it_executes_new() {
    let msg = Message::new(Sender::User, "Hi there!");
    assert_eq!(msg.sender, Sender::User);
    assert_eq!(msg.sender.to_string(), "You");
    assert_eq!(msg.content, "Hi there!".to_string());
    assert!(!msg.id.is_empty());
}

#[test]
fn it_keeps_content_verbatim() {
    let msg = Message::new(Sender::Ai, "\t**bold**\n");
    assert_eq!(msg.content, "\t**bold**\n");
}

#[test]
fn it_executes_with_id() {
    let msg = Message::with_id("1", Sender::User, "First!");
    assert_eq!(msg.id, "1");
    assert_eq!(msg.content, "First!");
}

#[test]
fn it_creates_increasing_ids() {
    let ids = (0..50)
        .map(|_| return Message::create_id().parse::<i64>().unwrap())
        .collect::<Vec<i64>>();

    for pair in ids.windows(2) {
        assert!(pair[1] > pair[0]);
    }
}

#[test]
fn it_serializes_with_iso_timestamps() -> Result<()> {
    let mut msg = Message::with_id("42", Sender::Ai, "Hello");
    msg.timestamp = Utc.with_ymd_and_hms(2024, 3, 2, 10, 15, 30).unwrap();

    let json = serde_json::to_string(&msg)?;
    insta::assert_snapshot!(json, @r###"{"id":"42","content":"Hello","sender":"ai","timestamp":"2024-03-02T10:15:30.000Z"}"###);

    return Ok(());
}

#[test]
fn it_deserializes_iso_timestamps() -> Result<()> {
    let msg: Message = serde_json::from_str(
        r#"{"id":"7","content":"Hey","sender":"user","timestamp":"2024-03-02T10:15:30.250Z"}"#,
    )?;

    assert_eq!(msg.sender, Sender::User);
    assert_eq!(msg.timestamp.timestamp(), 1709374530);
    assert_eq!(msg.timestamp.timestamp_subsec_millis(), 250);

    return Ok(());
}

#[test]
fn it_rejects_invalid_timestamps() {
    let res = serde_json::from_str::<Message>(
        r#"{"id":"7","content":"Hey","sender":"user","timestamp":"yesterday"}"#,
    );
    assert!(res.is_err());
}
