//! Chat/user allow-lists.
//!
//! An [`AllowList`] holds either chat ids or usernames, never both. With neither configured,
//! `allow_empty` decides. The sets can be changed at runtime through a shared handle;
//! evaluation takes a read lock so it never sees a half-applied change.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dbot_core::{Chat, ConfigError, MatchResult, Message, User};
use tracing::debug;

use crate::filter::Filter;
use crate::predicate::MessagePredicate;

const IDS: &str = "chat_ids";
const USERNAMES: &str = "usernames";

#[derive(Debug, Default)]
struct Entries {
    chat_ids: BTreeSet<i64>,
    usernames: BTreeSet<String>,
}

#[derive(Debug)]
pub struct AllowList {
    entries: RwLock<Entries>,
    allow_empty: bool,
}

fn normalize(username: impl AsRef<str>) -> String {
    username.as_ref().trim_start_matches('@').to_string()
}

impl AllowList {
    /// Fails with [`ConfigError::ConflictingAllowList`] when both sets are non-empty.
    pub fn new<I, U, S>(chat_ids: I, usernames: U, allow_empty: bool) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chat_ids: BTreeSet<i64> = chat_ids.into_iter().collect();
        let usernames: BTreeSet<String> = usernames.into_iter().map(normalize).collect();
        if !chat_ids.is_empty() && !usernames.is_empty() {
            return Err(ConfigError::ConflictingAllowList {
                requested: USERNAMES,
                existing: IDS,
            });
        }
        Ok(Self {
            entries: RwLock::new(Entries {
                chat_ids,
                usernames,
            }),
            allow_empty,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn chat_ids(&self) -> BTreeSet<i64> {
        self.read().chat_ids.clone()
    }

    pub fn usernames(&self) -> BTreeSet<String> {
        self.read().usernames.clone()
    }

    pub fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    pub fn add_chat_ids(&self, ids: impl IntoIterator<Item = i64>) -> Result<(), ConfigError> {
        let mut entries = self.write();
        if !entries.usernames.is_empty() {
            return Err(ConfigError::ConflictingAllowList {
                requested: IDS,
                existing: USERNAMES,
            });
        }
        entries.chat_ids.extend(ids);
        debug!(count = entries.chat_ids.len(), "allow-list chat ids updated");
        Ok(())
    }

    pub fn remove_chat_ids(&self, ids: impl IntoIterator<Item = i64>) -> Result<(), ConfigError> {
        let mut entries = self.write();
        if !entries.usernames.is_empty() {
            return Err(ConfigError::ConflictingAllowList {
                requested: IDS,
                existing: USERNAMES,
            });
        }
        for id in ids {
            entries.chat_ids.remove(&id);
        }
        Ok(())
    }

    pub fn add_usernames<S: AsRef<str>>(
        &self,
        usernames: impl IntoIterator<Item = S>,
    ) -> Result<(), ConfigError> {
        let mut entries = self.write();
        if !entries.chat_ids.is_empty() {
            return Err(ConfigError::ConflictingAllowList {
                requested: USERNAMES,
                existing: IDS,
            });
        }
        entries.usernames.extend(usernames.into_iter().map(normalize));
        debug!(count = entries.usernames.len(), "allow-list usernames updated");
        Ok(())
    }

    pub fn remove_usernames<S: AsRef<str>>(
        &self,
        usernames: impl IntoIterator<Item = S>,
    ) -> Result<(), ConfigError> {
        let mut entries = self.write();
        if !entries.chat_ids.is_empty() {
            return Err(ConfigError::ConflictingAllowList {
                requested: USERNAMES,
                existing: IDS,
            });
        }
        for name in usernames {
            entries.usernames.remove(&normalize(name));
        }
        Ok(())
    }

    /// Checks an entity (chat or user) given its id and username. `None` never passes.
    pub fn allows(&self, entity: Option<(i64, Option<&str>)>) -> bool {
        let Some((id, username)) = entity else {
            return false;
        };
        let entries = self.read();
        if !entries.chat_ids.is_empty() {
            return entries.chat_ids.contains(&id);
        }
        if !entries.usernames.is_empty() {
            return username.is_some_and(|u| entries.usernames.contains(u));
        }
        self.allow_empty
    }

    pub fn allows_chat(&self, chat: Option<&Chat>) -> bool {
        self.allows(chat.map(|c| (c.id, c.username.as_deref())))
    }

    pub fn allows_user(&self, user: Option<&User>) -> bool {
        self.allows(user.map(|u| (u.id, u.username.as_deref())))
    }
}

/// Which part of the message an [`AllowListFilter`] inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowListTarget {
    Chat,
    User,
    SenderChat,
    ViaBot,
}

/// Message filter backed by a shared [`AllowList`]. Clones share the same list, so a
/// handle kept after building the [`Filter`] can still change what it accepts.
#[derive(Debug, Clone)]
pub struct AllowListFilter {
    list: Arc<AllowList>,
    target: AllowListTarget,
}

impl AllowListFilter {
    pub fn new<I, U, S>(
        target: AllowListTarget,
        chat_ids: I,
        usernames: U,
        allow_empty: bool,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            list: Arc::new(AllowList::new(chat_ids, usernames, allow_empty)?),
            target,
        })
    }

    /// Filters on the message's chat.
    pub fn chat<I, U, S>(chat_ids: I, usernames: U, allow_empty: bool) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(AllowListTarget::Chat, chat_ids, usernames, allow_empty)
    }

    /// Filters on the message's sender.
    pub fn user<I, U, S>(user_ids: I, usernames: U, allow_empty: bool) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(AllowListTarget::User, user_ids, usernames, allow_empty)
    }

    pub fn sender_chat<I, U, S>(
        chat_ids: I,
        usernames: U,
        allow_empty: bool,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(AllowListTarget::SenderChat, chat_ids, usernames, allow_empty)
    }

    pub fn via_bot<I, U, S>(bot_ids: I, usernames: U, allow_empty: bool) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(AllowListTarget::ViaBot, bot_ids, usernames, allow_empty)
    }

    pub fn list(&self) -> &AllowList {
        &self.list
    }

    pub fn filter(&self) -> Filter {
        Filter::message(self.clone())
    }
}

impl MessagePredicate for AllowListFilter {
    fn name(&self) -> String {
        let list = self.list.read();
        let shown = if !list.chat_ids.is_empty() {
            format!("{:?}", list.chat_ids)
        } else {
            format!("{:?}", list.usernames)
        };
        format!("filters.{:?}({})", self.target, shown)
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        let allowed = match self.target {
            AllowListTarget::Chat => self.list.allows_chat(Some(&message.chat)),
            AllowListTarget::User => self.list.allows_user(message.from.as_ref()),
            AllowListTarget::SenderChat => self.list.allows_chat(message.sender_chat.as_ref()),
            AllowListTarget::ViaBot => self.list.allows_user(message.via_bot.as_ref()),
        };
        allowed.into()
    }
}

impl From<AllowListFilter> for Filter {
    fn from(filter: AllowListFilter) -> Self {
        Filter::message(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbot_core::{ChatType, Update, UpdatePayload};

    fn update_in_chat(id: i64, username: Option<&str>) -> Update {
        let chat = Chat {
            id,
            kind: ChatType::Group,
            title: None,
            username: username.map(str::to_string),
            is_forum: false,
        };
        Update::new(1, UpdatePayload::Message(Message::text(1, chat, "x")))
    }

    const NO_NAMES: [&str; 0] = [];

    #[test]
    fn test_chat_id_allow_list() {
        let filter: Filter = AllowListFilter::chat([5], NO_NAMES, false).unwrap().into();
        assert!(filter.evaluate(&update_in_chat(5, None)).is_match());
        assert!(!filter.evaluate(&update_in_chat(6, None)).is_match());
    }

    #[test]
    fn test_conflicting_allow_lists_fail_at_construction() {
        let err = AllowListFilter::chat([5], ["@group"], false).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingAllowList {
                requested: "usernames",
                existing: "chat_ids"
            }
        );
    }

    #[test]
    fn test_username_allow_list_strips_at() {
        let filter = AllowListFilter::chat([], ["@group"], false).unwrap().filter();
        assert!(filter.evaluate(&update_in_chat(1, Some("group"))).is_match());
        assert!(!filter.evaluate(&update_in_chat(1, Some("other"))).is_match());
        assert!(!filter.evaluate(&update_in_chat(1, None)).is_match());
    }

    #[test]
    fn test_empty_allow_list_uses_allow_empty() {
        let reject = AllowListFilter::chat([], NO_NAMES, false).unwrap().filter();
        let accept = AllowListFilter::chat([], NO_NAMES, true).unwrap().filter();
        assert!(!reject.evaluate(&update_in_chat(1, None)).is_match());
        assert!(accept.evaluate(&update_in_chat(1, None)).is_match());
    }

    #[test]
    fn test_runtime_mutation_through_shared_handle() {
        let handle = AllowListFilter::chat([], NO_NAMES, false).unwrap();
        let filter = handle.filter();
        assert!(!filter.evaluate(&update_in_chat(9, None)).is_match());

        handle.list().add_chat_ids([9]).unwrap();
        assert!(filter.evaluate(&update_in_chat(9, None)).is_match());
        assert!(handle.list().add_usernames(["someone"]).is_err());

        handle.list().remove_chat_ids([9]).unwrap();
        handle.list().add_usernames(["someone"]).unwrap();
        assert!(handle.list().add_chat_ids([1]).is_err());
        assert_eq!(handle.list().usernames().len(), 1);
    }

    #[test]
    fn test_user_filter_without_sender_rejects() {
        let filter = AllowListFilter::user([1], NO_NAMES, true).unwrap().filter();
        assert!(!filter.evaluate(&update_in_chat(1, None)).is_match());
    }
}
