//! Boxed async callbacks shared by all handlers and error hooks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dbot_core::{CallbackContext, HandlerResponse, Result, Update};

pub type CallbackFuture = Pin<Box<dyn Future<Output = Result<HandlerResponse>> + Send>>;

/// An async function of the update and its context.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(Arc<Update>, CallbackContext) -> CallbackFuture + Send + Sync>);

impl Callback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Update>, CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerResponse>> + Send + 'static,
    {
        Self(Arc::new(move |update, ctx| Box::pin(f(update, ctx))))
    }

    pub async fn call(&self, update: Arc<Update>, ctx: CallbackContext) -> Result<HandlerResponse> {
        (self.0)(update, ctx).await
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Callback")
    }
}
