use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Discriminator of the only update kind the bot reacts to
pub const MESSAGE_CREATED: &str = "message_created";

/// Opaque chat identifier. MAX sends numeric ids; the textual form is kept
/// so the value can be echoed back without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChatId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => ChatId(n.to_string()),
            Raw::Text(s) => ChatId(s),
        })
    }
}

impl Serialize for ChatId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Response of `GET /me`
#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl BotInfo {
    /// Name shown to the operator: `name`, then `first_name`, then `username`.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.first_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("bot {}", self.user_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    #[serde(default)]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub sender: Option<User>,
    pub recipient: Recipient,
    #[serde(default)]
    pub body: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreatedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    pub message: Message,
}

/// An event from the update stream. Everything except a new message is
/// carried as `Other` with its raw type name.
#[derive(Debug, Clone)]
pub enum Update {
    MessageCreated(MessageCreatedUpdate),
    Other { update_type: String, timestamp: i64 },
}

impl Update {
    pub fn kind(&self) -> &str {
        match self {
            Update::MessageCreated(_) => MESSAGE_CREATED,
            Update::Other { update_type, .. } => update_type,
        }
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            update_type: String,
            #[serde(default)]
            timestamp: i64,
        }

        let envelope = Envelope::deserialize(&value)?;
        if envelope.update_type == MESSAGE_CREATED {
            return Ok(Update::MessageCreated(serde_json::from_value(value)?));
        }
        Ok(Update::Other {
            update_type: envelope.update_type,
            timestamp: envelope.timestamp,
        })
    }
}

/// Response of `GET /updates`. Entries are decoded one by one so a single
/// unknown shape does not poison the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateList {
    #[serde(default)]
    pub updates: Vec<serde_json::Value>,
    #[serde(default)]
    pub marker: Option<i64>,
}

/// Query of `GET /updates`
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<i64>,
    /// Comma-separated update types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    Markdown,
    Html,
}

/// Body of `POST /messages`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessageBody {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
}

impl NewMessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            notify: None,
            format: None,
        }
    }
}

/// Response of `POST /messages`
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResult {
    pub message: Message,
}

/// Where a reply goes: a chat, or a user when the dialog has no chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Chat(ChatId),
    User(i64),
}

impl Destination {
    /// Query parameter selecting the destination on `POST /messages`.
    pub fn query_param(&self) -> (&'static str, String) {
        match self {
            Destination::Chat(id) => ("chat_id", id.to_string()),
            Destination::User(id) => ("user_id", id.to_string()),
        }
    }

    pub fn of(recipient: &Recipient) -> Option<Self> {
        match (&recipient.chat_id, recipient.user_id) {
            (Some(chat_id), _) => Some(Destination::Chat(chat_id.clone())),
            (None, Some(user_id)) => Some(Destination::User(user_id)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Chat(id) => write!(f, "{}", id),
            Destination::User(id) => write!(f, "user {}", id),
        }
    }
}
