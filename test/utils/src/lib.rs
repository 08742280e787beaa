/// A session collection as written by an earlier version of the client, two
/// sessions in insertion order with the second one holding a full exchange.
pub fn sessions_fixture() -> &'static str {
    return r#"
[
  {
    "id": "6f1c2a9e-41d2",
    "title": "New Chat",
    "messages": [],
    "createdAt": "2024-03-01T09:00:00.000Z",
    "updatedAt": "2024-03-01T09:00:00.000Z"
  },
  {
    "id": "0b7e55d1-9a3c",
    "title": "How do I parse JSON in Rust?",
    "messages": [
      {
        "id": "1",
        "content": "How do I parse JSON in Rust?",
        "sender": "user",
        "timestamp": "2024-03-02T10:15:30.250Z"
      },
      {
        "id": "1709374531000",
        "content": "Use serde_json::from_str with a type that derives Deserialize.",
        "sender": "ai",
        "timestamp": "2024-03-02T10:15:31.000Z"
      }
    ],
    "createdAt": "2024-03-02T10:15:30.250Z",
    "updatedAt": "2024-03-02T10:15:31.000Z"
  }
]
"#
    .trim();
}

pub fn alphabet_fixture() -> &'static str {
    return "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
}

/// A response long enough to trip the fast reveal path.
pub fn long_response_fixture() -> String {
    return "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(12);
}
