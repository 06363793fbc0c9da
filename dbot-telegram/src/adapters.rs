//! Adapters from Telegram (teloxide) types to dbot_core types.
//!
//! Conversion goes through the Bot API JSON that both sides model, so fields teloxide
//! renames or wraps in newtypes do not need hand-written mapping.

use dbot_core::{DbotError, Result, Update};

/// Wraps a teloxide Update for conversion to core [`Update`].
pub struct TelegramUpdateWrapper<'a>(pub &'a teloxide::types::Update);

impl<'a> TelegramUpdateWrapper<'a> {
    pub fn to_core(&self) -> Result<Update> {
        let value = serde_json::to_value(self.0)?;
        update_from_json(value)
    }
}

/// Parses one Bot API update object.
pub fn update_from_json(value: serde_json::Value) -> Result<Update> {
    serde_json::from_value(value).map_err(DbotError::from)
}
