use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    /// Failure reported by the Bot API or the HTTP transport.
    #[error("Bot error: {0}")]
    Bot(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running a callback.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No text in message")]
    NoText,

    #[error("No chat in update")]
    NoChat,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Handler task panicked or was cancelled: {0}")]
    Join(String),
}

/// Invalid filter or handler configuration. Raised at construction time only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Can't set {requested} in conjunction with (already set) {existing}")]
    ConflictingAllowList {
        requested: &'static str,
        existing: &'static str,
    },

    #[error("Command `{0}` is not a valid bot command")]
    InvalidCommand(String),

    #[error("Invalid regex `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("You can not filter for users and include anonymous reactions; use reaction kind `Updated`")]
    AnonymousReactionUserFilter,

    #[error("Conversation must be keyed per chat, per user, or both")]
    InvalidConversationKey,

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, DbotError>;
