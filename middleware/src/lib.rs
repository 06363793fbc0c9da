//! # middleware
//!
//! [`dbot_core::Middleware`] implementations: [`LoggingMiddleware`] logs every update and the
//! final response; [`AuthMiddleware`] drops updates whose sender is not allow-listed.

mod logging_auth;

pub use logging_auth::{AuthMiddleware, LoggingMiddleware};

#[cfg(test)]
mod test;
