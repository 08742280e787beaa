#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;

static LAST_MESSAGE_ID: AtomicI64 = AtomicI64::new(0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl ToString for Sender {
    fn to_string(&self) -> String {
        match self {
            Sender::User => return String::from("You"),
            Sender::Ai => return String::from("AI"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, content: &str) -> Message {
        return Message::with_id(&Message::create_id(), sender, content);
    }

    pub fn with_id(id: &str, sender: Sender, content: &str) -> Message {
        return Message {
            id: id.to_string(),
            content: content.to_string(),
            sender,
            timestamp: Utc::now(),
        };
    }

    /// Millisecond timestamp ids, bumped past the last issued id so two
    /// messages created within the same millisecond never collide.
    pub fn create_id() -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = LAST_MESSAGE_ID.load(Ordering::SeqCst);

        loop {
            let next = if now > last { now } else { last + 1 };
            match LAST_MESSAGE_ID.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next.to_string(),
                Err(actual) => last = actual,
            }
        }
    }
}

/// ISO-8601 timestamps with millisecond precision, the layout stored sessions
/// have always used.
pub(crate) mod iso8601 {
    use chrono::DateTime;
    use chrono::SecondsFormat;
    use chrono::Utc;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        return timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    }

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.serialize_str(&format(timestamp));
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        return DateTime::parse_from_rfc3339(&raw)
            .map(|timestamp| return timestamp.with_timezone(&Utc))
            .map_err(serde::de::Error::custom);
    }
}
