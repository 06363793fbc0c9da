//! Message-scoped leaf filters.

use std::collections::BTreeSet;

use dbot_core::{
    ChatType, ConfigError, DataValue, MatchResult, Message, MessageEntity, MessageEntityKind,
    RegexMatch, ENTITIES_KEY, MATCHES_KEY,
};
use regex::Regex;

use crate::filter::Filter;
use crate::predicate::MessagePredicate;

struct All;

impl MessagePredicate for All {
    fn name(&self) -> String {
        "filters.ALL".to_string()
    }

    fn check_message(&self, _message: &Message) -> MatchResult {
        MatchResult::Match
    }
}

/// Every message-bearing update.
pub fn all() -> Filter {
    Filter::message(All)
}

struct Text {
    exact: Option<BTreeSet<String>>,
}

impl MessagePredicate for Text {
    fn name(&self) -> String {
        match &self.exact {
            Some(strings) => format!("filters.Text({:?})", strings),
            None => "filters.TEXT".to_string(),
        }
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        match (&message.text, &self.exact) {
            (Some(text), Some(strings)) => strings.contains(text).into(),
            (Some(_), None) => MatchResult::Match,
            (None, _) => MatchResult::NoMatch,
        }
    }
}

/// Messages with text (commands included).
pub fn text() -> Filter {
    Filter::message(Text { exact: None })
}

/// Messages whose text equals one of `strings`.
pub fn text_in<I, S>(strings: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Filter::message(Text {
        exact: Some(strings.into_iter().map(Into::into).collect()),
    })
}

struct Caption {
    exact: Option<BTreeSet<String>>,
}

impl MessagePredicate for Caption {
    fn name(&self) -> String {
        match &self.exact {
            Some(strings) => format!("filters.Caption({:?})", strings),
            None => "filters.CAPTION".to_string(),
        }
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        match (&message.caption, &self.exact) {
            (Some(caption), Some(strings)) => strings.contains(caption).into(),
            (Some(_), None) => MatchResult::Match,
            (None, _) => MatchResult::NoMatch,
        }
    }
}

pub fn caption() -> Filter {
    Filter::message(Caption { exact: None })
}

pub fn caption_in<I, S>(strings: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Filter::message(Caption {
        exact: Some(strings.into_iter().map(Into::into).collect()),
    })
}

struct Command {
    only_start: bool,
}

impl MessagePredicate for Command {
    fn name(&self) -> String {
        if self.only_start {
            "filters.COMMAND".to_string()
        } else {
            "filters.Command(only_start=false)".to_string()
        }
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        if self.only_start {
            message
                .entities
                .first()
                .is_some_and(|e| e.kind == MessageEntityKind::BotCommand && e.offset == 0)
                .into()
        } else {
            message
                .entities
                .iter()
                .any(|e| e.kind == MessageEntityKind::BotCommand)
                .into()
        }
    }
}

/// Messages that start with a bot command entity.
pub fn command() -> Filter {
    Filter::message(Command { only_start: true })
}

/// Messages containing a bot command entity anywhere.
pub fn command_anywhere() -> Filter {
    Filter::message(Command { only_start: false })
}

#[derive(Clone, Copy)]
enum RegexTarget {
    Text,
    Caption,
}

struct RegexFilter {
    regex: Regex,
    target: RegexTarget,
}

impl MessagePredicate for RegexFilter {
    fn name(&self) -> String {
        match self.target {
            RegexTarget::Text => format!("filters.Regex({})", self.regex.as_str()),
            RegexTarget::Caption => format!("filters.CaptionRegex({})", self.regex.as_str()),
        }
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        let haystack = match self.target {
            RegexTarget::Text => message.text.as_deref(),
            RegexTarget::Caption => message.caption.as_deref(),
        };
        let found = haystack
            .and_then(|h| self.regex.captures(h))
            .and_then(|c| RegexMatch::from_captures(&self.regex, &c));
        match found {
            Some(m) => MatchResult::single(MATCHES_KEY, vec![DataValue::Match(m)]),
            None => MatchResult::NoMatch,
        }
    }

    fn is_data_filter(&self) -> bool {
        true
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Searches the message text; the match is reported under `matches`.
pub fn regex(pattern: &str) -> Result<Filter, ConfigError> {
    Ok(regex_compiled(compile(pattern)?))
}

pub fn regex_compiled(regex: Regex) -> Filter {
    Filter::message(RegexFilter {
        regex,
        target: RegexTarget::Text,
    })
}

/// Searches the message caption; the match is reported under `matches`.
pub fn caption_regex(pattern: &str) -> Result<Filter, ConfigError> {
    Ok(Filter::message(RegexFilter {
        regex: compile(pattern)?,
        target: RegexTarget::Caption,
    }))
}

struct Entity {
    kind: MessageEntityKind,
    caption: bool,
}

impl MessagePredicate for Entity {
    fn name(&self) -> String {
        if self.caption {
            format!("filters.CaptionEntity({:?})", self.kind)
        } else {
            format!("filters.Entity({:?})", self.kind)
        }
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        let entities: &[MessageEntity] = if self.caption {
            &message.caption_entities
        } else {
            &message.entities
        };
        let found = entities
            .iter()
            .filter(|e| e.kind == self.kind)
            .cloned()
            .map(DataValue::Entity)
            .collect();
        MatchResult::single(ENTITIES_KEY, found)
    }

    fn is_data_filter(&self) -> bool {
        true
    }
}

/// Text entities of `kind`; matching entities are reported under `entities`.
pub fn entity(kind: MessageEntityKind) -> Filter {
    Filter::message(Entity {
        kind,
        caption: false,
    })
}

pub fn caption_entity(kind: MessageEntityKind) -> Filter {
    Filter::message(Entity {
        kind,
        caption: true,
    })
}

/// Chat type selection for [`chat_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTypes {
    Private,
    Group,
    Supergroup,
    /// Group or supergroup.
    Groups,
    Channel,
}

impl ChatTypes {
    pub fn accepts(&self, kind: ChatType) -> bool {
        match self {
            ChatTypes::Private => kind == ChatType::Private,
            ChatTypes::Group => kind == ChatType::Group,
            ChatTypes::Supergroup => kind == ChatType::Supergroup,
            ChatTypes::Groups => matches!(kind, ChatType::Group | ChatType::Supergroup),
            ChatTypes::Channel => kind == ChatType::Channel,
        }
    }
}

struct ChatTypeFilter(ChatTypes);

impl MessagePredicate for ChatTypeFilter {
    fn name(&self) -> String {
        format!("filters.ChatType.{}", format!("{:?}", self.0).to_uppercase())
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        self.0.accepts(message.chat.kind).into()
    }
}

pub fn chat_type(types: ChatTypes) -> Filter {
    Filter::message(ChatTypeFilter(types))
}

/// Attachment kinds for [`attachment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Any,
    Photo,
    Document,
    Sticker,
    Video,
    Voice,
    Audio,
    Animation,
    Location,
    Contact,
    Poll,
}

struct AttachmentFilter(Attachment);

impl MessagePredicate for AttachmentFilter {
    fn name(&self) -> String {
        format!("filters.{}", format!("{:?}", self.0).to_uppercase())
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        let present = match self.0 {
            Attachment::Any => message.has_attachment(),
            Attachment::Photo => !message.photo.is_empty(),
            Attachment::Document => message.document.is_some(),
            Attachment::Sticker => message.sticker.is_some(),
            Attachment::Video => message.video.is_some(),
            Attachment::Voice => message.voice.is_some(),
            Attachment::Audio => message.audio.is_some(),
            Attachment::Animation => message.animation.is_some(),
            Attachment::Location => message.location.is_some(),
            Attachment::Contact => message.contact.is_some(),
            Attachment::Poll => message.poll.is_some(),
        };
        present.into()
    }
}

pub fn attachment(kind: Attachment) -> Filter {
    Filter::message(AttachmentFilter(kind))
}

pub fn photo() -> Filter {
    attachment(Attachment::Photo)
}

pub fn document() -> Filter {
    attachment(Attachment::Document)
}

/// Replies to another message.
pub fn reply() -> Filter {
    Filter::message_fn("filters.REPLY", |m| m.reply_to_message.is_some())
}

pub fn forwarded() -> Filter {
    Filter::message_fn("filters.FORWARDED", |m| m.forward_origin.is_some())
}

pub fn is_topic_message() -> Filter {
    Filter::message_fn("filters.IS_TOPIC_MESSAGE", |m| m.is_topic_message)
}

struct Language {
    prefixes: Vec<String>,
}

impl MessagePredicate for Language {
    fn name(&self) -> String {
        format!("filters.Language({:?})", self.prefixes)
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        message
            .from
            .as_ref()
            .and_then(|u| u.language_code.as_deref())
            .is_some_and(|code| self.prefixes.iter().any(|p| code.starts_with(p.as_str())))
            .into()
    }
}

/// Senders whose language code starts with one of `prefixes` (`"en"` matches `"en_US"`).
pub fn language<I, S>(prefixes: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Filter::message(Language {
        prefixes: prefixes.into_iter().map(Into::into).collect(),
    })
}

/// Who a [`mention`] filter looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionTarget {
    UserId(i64),
    /// Without the leading `@`.
    Username(String),
}

struct Mention {
    targets: Vec<MentionTarget>,
}

impl Mention {
    fn mentions(&self, message: &Message, entity: &MessageEntity) -> bool {
        match entity.kind {
            MessageEntityKind::Mention => {
                let Some(mentioned) = message
                    .text
                    .as_deref()
                    .and_then(|t| entity.extract(t))
                    .map(|s| s.trim_start_matches('@'))
                else {
                    return false;
                };
                self.targets.iter().any(|t| {
                    matches!(t, MentionTarget::Username(name) if name.eq_ignore_ascii_case(mentioned))
                })
            }
            MessageEntityKind::TextMention => {
                let Some(user) = entity.user.as_ref() else {
                    return false;
                };
                self.targets.iter().any(|t| match t {
                    MentionTarget::UserId(id) => *id == user.id,
                    MentionTarget::Username(name) => user
                        .username
                        .as_deref()
                        .is_some_and(|u| u.eq_ignore_ascii_case(name)),
                })
            }
            _ => false,
        }
    }
}

impl MessagePredicate for Mention {
    fn name(&self) -> String {
        format!("filters.Mention({:?})", self.targets)
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        message
            .entities
            .iter()
            .any(|e| self.mentions(message, e))
            .into()
    }
}

/// Messages mentioning one of `targets`, via `@username` or a text mention.
pub fn mention(targets: Vec<MentionTarget>) -> Filter {
    let targets = targets
        .into_iter()
        .map(|t| match t {
            MentionTarget::Username(name) => {
                MentionTarget::Username(name.trim_start_matches('@').to_string())
            }
            other => other,
        })
        .collect();
    Filter::message(Mention { targets })
}
