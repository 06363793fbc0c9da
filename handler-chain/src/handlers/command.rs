//! `/command` and prefix-command handlers.
//!
//! Both compare the first whitespace-delimited token of the message text, case-insensitively,
//! before evaluating their filter, and report the remaining tokens as `args`.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{
    CallbackContext, ConfigError, DataValue, Handler, HandlerResponse, MatchResult, Result,
    Update, ARGS_KEY,
};
use filters::{update_type, Filter};
use tracing::trace;

use crate::callback::Callback;

/// Constraint on the number of command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HasArgs {
    #[default]
    Any,
    /// At least one argument.
    Some,
    /// No arguments.
    None,
    Exactly(usize),
}

impl HasArgs {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            HasArgs::Any => true,
            HasArgs::Some => count > 0,
            HasArgs::None => count == 0,
            HasArgs::Exactly(n) => count == *n,
        }
    }
}

fn is_valid_command(command: &str) -> bool {
    (1..=32).contains(&command.len())
        && command
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '_')
}

/// `Match` for no arguments, otherwise the arguments under `args`.
fn args_result(args: Vec<String>) -> MatchResult {
    if args.is_empty() {
        MatchResult::Match
    } else {
        MatchResult::single(ARGS_KEY, args.into_iter().map(DataValue::Text).collect())
    }
}

/// Handles `/command [args...]` messages, optionally addressed as `/command@bot_username`.
pub struct CommandHandler {
    name: String,
    commands: BTreeSet<String>,
    filter: Filter,
    callback: Callback,
    has_args: HasArgs,
    bot_username: Option<String>,
    block: bool,
}

impl CommandHandler {
    /// Commands are lower-cased and must match `[0-9a-z_]{1,32}`.
    pub fn new<I, S>(commands: I, callback: Callback) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands: BTreeSet<String> = commands
            .into_iter()
            .map(|c| c.as_ref().to_lowercase())
            .collect();
        if commands.is_empty() {
            return Err(ConfigError::InvalidCommand(String::new()));
        }
        if let Some(bad) = commands.iter().find(|c| !is_valid_command(c)) {
            return Err(ConfigError::InvalidCommand(bad.clone()));
        }
        Ok(Self {
            name: format!("CommandHandler({:?})", commands),
            commands,
            filter: update_type::messages(),
            callback,
            has_args: HasArgs::Any,
            bot_username: None,
            block: true,
        })
    }

    /// Replaces the default filter (new or edited messages).
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn has_args(mut self, has_args: HasArgs) -> Self {
        self.has_args = has_args;
        self
    }

    /// When set, `/command@other_bot` is rejected. Without it any `@suffix` is ignored.
    pub fn bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into().trim_start_matches('@').to_string());
        self
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn commands(&self) -> &BTreeSet<String> {
        &self.commands
    }
}

#[async_trait]
impl Handler for CommandHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        let Some(text) = update.message_payload().and_then(|m| m.text.as_deref()) else {
            return MatchResult::NoMatch;
        };
        let mut tokens = text.split_whitespace();
        let Some(command) = tokens.next().and_then(|t| t.strip_prefix('/')) else {
            return MatchResult::NoMatch;
        };
        let (command, mention) = match command.split_once('@') {
            Some((command, mention)) => (command, Some(mention)),
            None => (command, None),
        };
        if !self.commands.contains(&command.to_lowercase()) {
            return MatchResult::NoMatch;
        }
        if let (Some(mention), Some(bot)) = (mention, &self.bot_username) {
            if !mention.eq_ignore_ascii_case(bot) {
                trace!(command, mention, "command addressed to another bot");
                return MatchResult::NoMatch;
            }
        }
        let args: Vec<String> = tokens.map(str::to_string).collect();
        if !self.has_args.accepts(args.len()) {
            return MatchResult::NoMatch;
        }

        let filtered = self.filter.evaluate(update);
        if !filtered.is_match() {
            return MatchResult::NoMatch;
        }
        args_result(args).merge(filtered)
    }

    async fn handle_update(
        &self,
        update: Arc<Update>,
        ctx: CallbackContext,
    ) -> Result<HandlerResponse> {
        self.callback.call(update, ctx).await
    }

    fn blocking(&self) -> bool {
        self.block
    }
}

/// Handles `<prefix><command> [args...]` for every prefix/command combination, e.g. `!help`.
pub struct PrefixHandler {
    name: String,
    combinations: BTreeSet<String>,
    filter: Filter,
    callback: Callback,
    block: bool,
}

impl PrefixHandler {
    pub fn new<P, C, S, T>(
        prefixes: P,
        commands: C,
        callback: Callback,
    ) -> std::result::Result<Self, ConfigError>
    where
        P: IntoIterator<Item = S>,
        C: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .collect();
        let commands: Vec<String> = commands
            .into_iter()
            .map(|c| c.as_ref().to_lowercase())
            .collect();
        if let Some(bad) = prefixes
            .iter()
            .chain(commands.iter())
            .find(|s| s.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::Invalid(format!(
                "prefix or command `{}` contains whitespace and can never match",
                bad
            )));
        }
        let combinations: BTreeSet<String> = prefixes
            .iter()
            .flat_map(|p| commands.iter().map(move |c| format!("{}{}", p, c)))
            .filter(|combination| !combination.is_empty())
            .collect();
        if combinations.is_empty() {
            return Err(ConfigError::Invalid(
                "prefix handler needs at least one prefix and one command".to_string(),
            ));
        }
        Ok(Self {
            name: format!("PrefixHandler({:?})", combinations),
            combinations,
            filter: update_type::messages(),
            callback,
            block: true,
        })
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }
}

#[async_trait]
impl Handler for PrefixHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        let Some(text) = update.message_payload().and_then(|m| m.text.as_deref()) else {
            return MatchResult::NoMatch;
        };
        let mut tokens = text.split_whitespace();
        let Some(first) = tokens.next() else {
            return MatchResult::NoMatch;
        };
        if !self.combinations.contains(&first.to_lowercase()) {
            return MatchResult::NoMatch;
        }
        let filtered = self.filter.evaluate(update);
        if !filtered.is_match() {
            return MatchResult::NoMatch;
        }
        args_result(tokens.map(str::to_string).collect()).merge(filtered)
    }

    async fn handle_update(
        &self,
        update: Arc<Update>,
        ctx: CallbackContext,
    ) -> Result<HandlerResponse> {
        self.callback.call(update, ctx).await
    }

    fn blocking(&self) -> bool {
        self.block
    }
}
