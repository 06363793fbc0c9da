//! Middleware for logging and optional auth (allow-list).

use async_trait::async_trait;
use dbot_core::{ConfigError, HandlerError, HandlerResponse, Middleware, Result, Update};
use filters::AllowListFilter;
use tracing::{debug, error, info, instrument};

/// Logs each update in before() and the response in after(); always continues.
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    async fn before(&self, update: &Update) -> Result<bool> {
        let user = update.effective_user();
        info!(
            kind = update.kind().key(),
            user_id = ?user.map(|u| u.id),
            username = %user.and_then(|u| u.username.as_deref()).unwrap_or("unknown"),
            chat_id = ?update.effective_chat().map(|c| c.id),
            text = %update.effective_message().and_then(|m| m.text_or_caption()).unwrap_or(""),
            "Received update"
        );
        Ok(true)
    }

    #[instrument(skip(self, update, response), fields(update_id = update.update_id))]
    async fn after(&self, update: &Update, response: &HandlerResponse) -> Result<()> {
        debug!(response = ?response, "Processed update");
        Ok(())
    }
}

/// Fails with `Unauthorized` unless the update's effective user is allow-listed.
pub struct AuthMiddleware {
    allowed: AllowListFilter,
}

impl AuthMiddleware {
    /// Allows only the given user ids.
    pub fn new(allowed_users: Vec<i64>) -> std::result::Result<Self, ConfigError> {
        AllowListFilter::user(allowed_users, Vec::<String>::new(), false).map(Self::from_allow_list)
    }

    /// Uses an existing user allow-list; changes made through it apply to later updates.
    pub fn from_allow_list(allowed: AllowListFilter) -> Self {
        Self { allowed }
    }

    pub fn allow_list(&self) -> &AllowListFilter {
        &self.allowed
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    async fn before(&self, update: &Update) -> Result<bool> {
        let user = update.effective_user();
        let user_id = user.map(|u| u.id);
        if self.allowed.list().allows_user(user) {
            info!(user_id = ?user_id, "User authorized");
            Ok(true)
        } else {
            error!(user_id = ?user_id, "Unauthorized access attempt");
            Err(HandlerError::Unauthorized.into())
        }
    }
}
