//! Core types: the inbound [`Update`] and the Bot API objects it carries.
//!
//! Field names follow the Bot API JSON so an update can be deserialized straight from a
//! `getUpdates` response. Unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// User identity (id, names, username, language).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
    /// Also used for the `sender` chat type of inline queries.
    #[serde(other)]
    Other,
}

/// Chat (private, group, supergroup or channel) identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub is_forum: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEntityKind {
    Mention,
    Hashtag,
    Cashtag,
    BotCommand,
    Url,
    Email,
    PhoneNumber,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Blockquote,
    ExpandableBlockquote,
    Code,
    Pre,
    TextLink,
    TextMention,
    CustomEmoji,
    #[serde(other)]
    Other,
}

/// A special entity in a text or caption. `offset` and `length` are in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: MessageEntityKind,
    pub offset: usize,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl MessageEntity {
    pub fn new(kind: MessageEntityKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
            url: None,
            user: None,
        }
    }

    /// Returns the slice of `text` covered by this entity, or `None` when the UTF-16 range
    /// falls outside the text or inside a surrogate pair.
    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = utf16_to_byte_index(text, self.offset)?;
        let end = utf16_to_byte_index(text, self.offset.checked_add(self.length)?)?;
        text.get(start..end)
    }
}

fn utf16_to_byte_index(text: &str, utf16_index: usize) -> Option<usize> {
    let mut units = 0;
    for (byte_index, ch) in text.char_indices() {
        if units == utf16_index {
            return Some(byte_index);
        }
        units += ch.len_utf16();
        if units > utf16_index {
            return None;
        }
    }
    (units == utf16_index).then_some(text.len())
}

/// Any downloadable file (photo size, document, sticker, audio...). Only the ids are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    #[serde(default)]
    pub question: String,
}

/// A single message: text or caption with entities, attachment markers and reply context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_chat: Option<Chat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,
    #[serde(default)]
    pub is_topic_message: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photo: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_bot: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_origin: Option<Value>,
}

impl Message {
    /// Creates a plain text message in `chat`, without sender or entities.
    pub fn text(message_id: i64, chat: Chat, text: impl Into<String>) -> Self {
        Self {
            message_id,
            date: 0,
            chat,
            from: None,
            sender_chat: None,
            message_thread_id: None,
            is_topic_message: false,
            business_connection_id: None,
            text: Some(text.into()),
            entities: Vec::new(),
            caption: None,
            caption_entities: Vec::new(),
            photo: Vec::new(),
            document: None,
            sticker: None,
            video: None,
            voice: None,
            audio: None,
            animation: None,
            location: None,
            contact: None,
            poll: None,
            reply_to_message: None,
            via_bot: None,
            forward_origin: None,
        }
    }

    /// Text if present, otherwise the caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Unix `date` as UTC time; `None` for inaccessible messages (date 0).
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        if self.date == 0 {
            return None;
        }
        DateTime::from_timestamp(self.date, 0)
    }

    /// True if the message carries any kind of attachment.
    pub fn has_attachment(&self) -> bool {
        !self.photo.is_empty()
            || self.document.is_some()
            || self.sticker.is_some()
            || self.video.is_some()
            || self.voice.is_some()
            || self.audio.is_some()
            || self.animation.is_some()
            || self.location.is_some()
            || self.contact.is_some()
            || self.poll.is_some()
    }
}

/// Incoming callback query from an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    #[serde(default)]
    pub chat_instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
    /// `sender`, `private`, `group`, `supergroup` or `channel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<ChatType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionType {
    Emoji { emoji: String },
    CustomEmoji { custom_emoji_id: String },
    #[serde(other)]
    Other,
}

/// A user (or anonymous actor chat) changed their reaction on a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionUpdated {
    pub chat: Chat,
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_chat: Option<Chat>,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub old_reaction: Vec<ReactionType>,
    #[serde(default)]
    pub new_reaction: Vec<ReactionType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionCount {
    #[serde(rename = "type")]
    pub kind: ReactionType,
    pub total_count: i64,
}

/// Anonymous reaction counters of a message changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionCountUpdated {
    pub chat: Chat,
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBoostUpdated {
    pub chat: Chat,
    #[serde(default)]
    pub boost: Value,
}

/// Kind of an [`Update`], without its payload. Used for type-based routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    BusinessMessage,
    EditedBusinessMessage,
    CallbackQuery,
    InlineQuery,
    MessageReaction,
    MessageReactionCount,
    ChatBoost,
    Unknown,
}

impl UpdateKind {
    /// Bot API field name of this kind (`"unknown"` for unrecognised kinds).
    pub fn key(&self) -> &'static str {
        match self {
            UpdateKind::Message => "message",
            UpdateKind::EditedMessage => "edited_message",
            UpdateKind::ChannelPost => "channel_post",
            UpdateKind::EditedChannelPost => "edited_channel_post",
            UpdateKind::BusinessMessage => "business_message",
            UpdateKind::EditedBusinessMessage => "edited_business_message",
            UpdateKind::CallbackQuery => "callback_query",
            UpdateKind::InlineQuery => "inline_query",
            UpdateKind::MessageReaction => "message_reaction",
            UpdateKind::MessageReactionCount => "message_reaction_count",
            UpdateKind::ChatBoost => "chat_boost",
            UpdateKind::Unknown => "unknown",
        }
    }
}

/// Payload of an update. Exactly one is present per update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    BusinessMessage(Message),
    EditedBusinessMessage(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    MessageReaction(MessageReactionUpdated),
    MessageReactionCount(MessageReactionCountUpdated),
    ChatBoost(ChatBoostUpdated),
    /// A kind this crate does not model; the raw field name and JSON are kept.
    Unknown { key: String, value: Value },
}

/// One inbound event from the Bot API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUpdate", into = "RawUpdate")]
pub struct Update {
    pub update_id: i64,
    pub payload: UpdatePayload,
}

impl Update {
    pub fn new(update_id: i64, payload: UpdatePayload) -> Self {
        Self { update_id, payload }
    }

    pub fn kind(&self) -> UpdateKind {
        match &self.payload {
            UpdatePayload::Message(_) => UpdateKind::Message,
            UpdatePayload::EditedMessage(_) => UpdateKind::EditedMessage,
            UpdatePayload::ChannelPost(_) => UpdateKind::ChannelPost,
            UpdatePayload::EditedChannelPost(_) => UpdateKind::EditedChannelPost,
            UpdatePayload::BusinessMessage(_) => UpdateKind::BusinessMessage,
            UpdatePayload::EditedBusinessMessage(_) => UpdateKind::EditedBusinessMessage,
            UpdatePayload::CallbackQuery(_) => UpdateKind::CallbackQuery,
            UpdatePayload::InlineQuery(_) => UpdateKind::InlineQuery,
            UpdatePayload::MessageReaction(_) => UpdateKind::MessageReaction,
            UpdatePayload::MessageReactionCount(_) => UpdateKind::MessageReactionCount,
            UpdatePayload::ChatBoost(_) => UpdateKind::ChatBoost,
            UpdatePayload::Unknown { .. } => UpdateKind::Unknown,
        }
    }

    /// The message of a message-bearing update (new, edited, channel or business message).
    /// Message-scoped filters only run when this is `Some`.
    pub fn message_payload(&self) -> Option<&Message> {
        match &self.payload {
            UpdatePayload::Message(m)
            | UpdatePayload::EditedMessage(m)
            | UpdatePayload::ChannelPost(m)
            | UpdatePayload::EditedChannelPost(m)
            | UpdatePayload::BusinessMessage(m)
            | UpdatePayload::EditedBusinessMessage(m) => Some(m),
            _ => None,
        }
    }

    /// Like [`Update::message_payload`], but also returns the message a callback query
    /// button is attached to.
    pub fn effective_message(&self) -> Option<&Message> {
        match &self.payload {
            UpdatePayload::CallbackQuery(q) => q.message.as_deref(),
            _ => self.message_payload(),
        }
    }

    pub fn effective_chat(&self) -> Option<&Chat> {
        match &self.payload {
            UpdatePayload::MessageReaction(r) => Some(&r.chat),
            UpdatePayload::MessageReactionCount(r) => Some(&r.chat),
            UpdatePayload::ChatBoost(b) => Some(&b.chat),
            _ => self.effective_message().map(|m| &m.chat),
        }
    }

    pub fn effective_user(&self) -> Option<&User> {
        match &self.payload {
            UpdatePayload::CallbackQuery(q) => Some(&q.from),
            UpdatePayload::InlineQuery(q) => Some(&q.from),
            UpdatePayload::MessageReaction(r) => r.user.as_ref(),
            _ => self.message_payload().and_then(|m| m.from.as_ref()),
        }
    }

    pub fn effective_sender_chat(&self) -> Option<&Chat> {
        match &self.payload {
            UpdatePayload::MessageReaction(r) => r.actor_chat.as_ref(),
            _ => self.message_payload().and_then(|m| m.sender_chat.as_ref()),
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.payload {
            UpdatePayload::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    pub fn inline_query(&self) -> Option<&InlineQuery> {
        match &self.payload {
            UpdatePayload::InlineQuery(q) => Some(q),
            _ => None,
        }
    }
}

/// Wire shape of an update: `update_id` plus exactly one payload field.
#[derive(Serialize, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<RawUpdate> for Update {
    type Error = serde_json::Error;

    fn try_from(raw: RawUpdate) -> Result<Self, Self::Error> {
        let (key, value) = match raw.fields.into_iter().next() {
            Some(field) => field,
            None => {
                return Err(serde::de::Error::custom(format!(
                    "update {} has no payload",
                    raw.update_id
                )))
            }
        };
        let payload = match key.as_str() {
            "message" => UpdatePayload::Message(serde_json::from_value(value)?),
            "edited_message" => UpdatePayload::EditedMessage(serde_json::from_value(value)?),
            "channel_post" => UpdatePayload::ChannelPost(serde_json::from_value(value)?),
            "edited_channel_post" => {
                UpdatePayload::EditedChannelPost(serde_json::from_value(value)?)
            }
            "business_message" => UpdatePayload::BusinessMessage(serde_json::from_value(value)?),
            "edited_business_message" => {
                UpdatePayload::EditedBusinessMessage(serde_json::from_value(value)?)
            }
            "callback_query" => UpdatePayload::CallbackQuery(serde_json::from_value(value)?),
            "inline_query" => UpdatePayload::InlineQuery(serde_json::from_value(value)?),
            "message_reaction" => UpdatePayload::MessageReaction(serde_json::from_value(value)?),
            "message_reaction_count" => {
                UpdatePayload::MessageReactionCount(serde_json::from_value(value)?)
            }
            "chat_boost" => UpdatePayload::ChatBoost(serde_json::from_value(value)?),
            _ => {
                debug!(update_id = raw.update_id, kind = %key, "update kind kept as Unknown");
                UpdatePayload::Unknown { key, value }
            }
        };
        Ok(Update {
            update_id: raw.update_id,
            payload,
        })
    }
}

impl From<Update> for RawUpdate {
    fn from(update: Update) -> Self {
        let kind = update.kind();
        let (key, value) = match update.payload {
            UpdatePayload::Message(m)
            | UpdatePayload::EditedMessage(m)
            | UpdatePayload::ChannelPost(m)
            | UpdatePayload::EditedChannelPost(m)
            | UpdatePayload::BusinessMessage(m)
            | UpdatePayload::EditedBusinessMessage(m) => {
                (kind.key().to_string(), serde_json::to_value(m))
            }
            UpdatePayload::CallbackQuery(q) => (kind.key().to_string(), serde_json::to_value(q)),
            UpdatePayload::InlineQuery(q) => (kind.key().to_string(), serde_json::to_value(q)),
            UpdatePayload::MessageReaction(r) => {
                (kind.key().to_string(), serde_json::to_value(r))
            }
            UpdatePayload::MessageReactionCount(r) => {
                (kind.key().to_string(), serde_json::to_value(r))
            }
            UpdatePayload::ChatBoost(b) => (kind.key().to_string(), serde_json::to_value(b)),
            UpdatePayload::Unknown { key, value } => (key, Ok(value)),
        };
        let mut fields = Map::new();
        fields.insert(key, value.unwrap_or(Value::Null));
        RawUpdate {
            update_id: update.update_id,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_message_update() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": {"id": 5, "type": "private", "username": "alice"},
                "from": {"id": 7, "is_bot": false, "first_name": "Alice", "language_code": "en"},
                "text": "/start now",
                "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 10);
        assert_eq!(update.kind(), UpdateKind::Message);
        let message = update.message_payload().unwrap();
        assert_eq!(message.text.as_deref(), Some("/start now"));
        assert_eq!(message.entities[0].kind, MessageEntityKind::BotCommand);
        assert_eq!(update.effective_chat().unwrap().id, 5);
        assert_eq!(update.effective_user().unwrap().id, 7);
        assert!(message.sent_at().is_some());
    }

    #[test]
    fn test_unknown_update_kind_is_preserved() {
        let json = r#"{"update_id": 3, "poll_answer": {"poll_id": "p"}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.kind(), UpdateKind::Unknown);
        let back = serde_json::to_value(&update).unwrap();
        assert_eq!(back["poll_answer"]["poll_id"], "p");
    }

    #[test]
    fn test_update_without_payload_is_rejected() {
        assert!(serde_json::from_str::<Update>(r#"{"update_id": 3}"#).is_err());
    }

    #[test]
    fn test_callback_query_effective_message_but_no_payload() {
        let json = r#"{
            "update_id": 4,
            "callback_query": {
                "id": "q1",
                "from": {"id": 9, "first_name": "Bob"},
                "message": {"message_id": 2, "chat": {"id": -100, "type": "supergroup"}},
                "data": "page:2"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.message_payload().is_none());
        assert_eq!(update.effective_message().unwrap().message_id, 2);
        assert_eq!(update.effective_chat().unwrap().kind, ChatType::Supergroup);
        assert_eq!(update.callback_query().unwrap().data.as_deref(), Some("page:2"));
    }

    #[test]
    fn test_entity_extract_counts_utf16_units() {
        let text = "😀 /help me";
        let entity = MessageEntity::new(MessageEntityKind::BotCommand, 3, 5);
        assert_eq!(entity.extract(text), Some("/help"));
        let inside_pair = MessageEntity::new(MessageEntityKind::Bold, 1, 1);
        assert_eq!(inside_pair.extract(text), None);
        let past_end = MessageEntity::new(MessageEntityKind::Bold, 8, 10);
        assert_eq!(past_end.extract(text), None);
    }

    #[test]
    fn test_entity_extract_rejects_overflowing_range() {
        let entity = MessageEntity::new(MessageEntityKind::Bold, 1, usize::MAX);
        assert_eq!(entity.extract("hello"), None);
    }

    #[test]
    fn test_unknown_entity_and_chat_type() {
        let entity: MessageEntity =
            serde_json::from_str(r#"{"type": "date_time", "offset": 0, "length": 1}"#).unwrap();
        assert_eq!(entity.kind, MessageEntityKind::Other);
        let kind: ChatType = serde_json::from_str(r#""sender""#).unwrap();
        assert_eq!(kind, ChatType::Other);
    }
}
