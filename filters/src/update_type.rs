//! Update-scoped filters on the kind of update, for when "edited" vs "new" matters.

use dbot_core::{MatchResult, Update, UpdateKind};

use crate::filter::Filter;
use crate::predicate::UpdatePredicate;

struct KindFilter {
    name: &'static str,
    kinds: &'static [UpdateKind],
}

impl UpdatePredicate for KindFilter {
    fn name(&self) -> String {
        format!("filters.UpdateType.{}", self.name)
    }

    fn check(&self, update: &Update) -> MatchResult {
        self.kinds.contains(&update.kind()).into()
    }
}

fn kinds(name: &'static str, kinds: &'static [UpdateKind]) -> Filter {
    Filter::update(KindFilter { name, kinds })
}

pub fn message() -> Filter {
    kinds("MESSAGE", &[UpdateKind::Message])
}

pub fn edited_message() -> Filter {
    kinds("EDITED_MESSAGE", &[UpdateKind::EditedMessage])
}

/// New or edited messages.
pub fn messages() -> Filter {
    kinds("MESSAGES", &[UpdateKind::Message, UpdateKind::EditedMessage])
}

pub fn channel_post() -> Filter {
    kinds("CHANNEL_POST", &[UpdateKind::ChannelPost])
}

pub fn edited_channel_post() -> Filter {
    kinds("EDITED_CHANNEL_POST", &[UpdateKind::EditedChannelPost])
}

pub fn channel_posts() -> Filter {
    kinds(
        "CHANNEL_POSTS",
        &[UpdateKind::ChannelPost, UpdateKind::EditedChannelPost],
    )
}

/// Any edited message, channel post or business message.
pub fn edited() -> Filter {
    kinds(
        "EDITED",
        &[
            UpdateKind::EditedMessage,
            UpdateKind::EditedChannelPost,
            UpdateKind::EditedBusinessMessage,
        ],
    )
}

pub fn business_message() -> Filter {
    kinds("BUSINESS_MESSAGE", &[UpdateKind::BusinessMessage])
}

pub fn edited_business_message() -> Filter {
    kinds("EDITED_BUSINESS_MESSAGE", &[UpdateKind::EditedBusinessMessage])
}

pub fn business_messages() -> Filter {
    kinds(
        "BUSINESS_MESSAGES",
        &[UpdateKind::BusinessMessage, UpdateKind::EditedBusinessMessage],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbot_core::{Chat, ChatType, Message, UpdatePayload};

    fn msg() -> Message {
        let chat = Chat {
            id: 1,
            kind: ChatType::Channel,
            title: None,
            username: None,
            is_forum: false,
        };
        Message::text(1, chat, "x")
    }

    #[test]
    fn test_edited_vs_new() {
        let new = Update::new(1, UpdatePayload::Message(msg()));
        let edited_post = Update::new(2, UpdatePayload::EditedChannelPost(msg()));

        assert!(messages().evaluate(&new).is_match());
        assert!(!messages().evaluate(&edited_post).is_match());
        assert!(edited().evaluate(&edited_post).is_match());
        assert!(!edited().evaluate(&new).is_match());
        assert!(channel_posts().evaluate(&edited_post).is_match());
        assert_eq!(edited().to_string(), "filters.UpdateType.EDITED");
    }
}
