use super::context::{Context, Value};
use super::intent::{Intent, IntentKind};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Anything that can execute an intent: the gateway itself, or the frame an
/// action receives for issuing sub-intents.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn execute(&self, intent: &mut Intent) -> Result<()>;
}

/// A handler bound to one or more intent kinds.
#[async_trait]
pub trait Action: Send + Sync {
    fn supports(&self, intent: &Intent) -> bool;

    /// Handles the intent, mutating its model in place.
    ///
    /// `gateway` dispatches sub-intents back through the same gateway.
    async fn execute(&self, intent: &mut Intent, gateway: &dyn Gateway) -> Result<()>;
}

/// What an extension sees while an intent is being dispatched.
pub struct ExtensionContext<'a> {
    gateway: &'a dyn Gateway,
    intent: &'a mut Intent,
    previous: &'a [IntentKind],
}

impl<'a> ExtensionContext<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        intent: &'a mut Intent,
        previous: &'a [IntentKind],
    ) -> Self {
        Self {
            gateway,
            intent,
            previous,
        }
    }

    pub fn gateway(&self) -> &'a dyn Gateway {
        self.gateway
    }

    pub fn intent(&self) -> &Intent {
        &*self.intent
    }

    pub fn intent_mut(&mut self) -> &mut Intent {
        &mut *self.intent
    }

    /// Kinds of the enclosing intents, outermost first. Empty for a top-level intent.
    pub fn previous(&self) -> &'a [IntentKind] {
        self.previous
    }
}

/// Hooks run around every dispatched intent, in registration order.
///
/// Expected provider failures are reported on the model, never as `Err`.
#[async_trait]
pub trait Extension: Send + Sync {
    async fn on_pre_execute(&self, context: &mut ExtensionContext<'_>) -> Result<()>;

    async fn on_execute(&self, _context: &mut ExtensionContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn on_post_execute(&self, context: &mut ExtensionContext<'_>) -> Result<()>;
}

pub type ActionBox = Box<dyn Action>;
pub type ExtensionBox = Box<dyn Extension>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The provider answered with an error object.
    #[error("provider rejected the request")]
    Rejected(Value),
    /// The provider could not be reached or answered garbage.
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Per-request options forwarded to the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Connected account the call is made on behalf of.
    pub stripe_account: Option<String>,
}

impl RequestOptions {
    /// Reads `local.stripe_headers` from a model.
    pub fn from_model(model: &Context) -> Self {
        let headers = model.get_context("local").get_context("stripe_headers");
        Self {
            stripe_account: headers
                .get_str("stripe_account")
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// The provider's remote operations.
///
/// Parameters may carry sensitive values; implementations reveal them only to
/// put them on the wire.
#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn retrieve_customer(&self, id: &str, options: &RequestOptions) -> ApiResult<Context>;
    async fn create_customer(&self, params: &Context, options: &RequestOptions)
    -> ApiResult<Context>;
    async fn update_customer(
        &self,
        id: &str,
        params: &Context,
        options: &RequestOptions,
    ) -> ApiResult<Context>;
    async fn create_customer_source(
        &self,
        customer: &str,
        source: &str,
        options: &RequestOptions,
    ) -> ApiResult<Context>;
    async fn delete_customer_source(
        &self,
        customer: &str,
        id: &str,
        options: &RequestOptions,
    ) -> ApiResult<Context>;
    async fn retrieve_token(&self, token: &str, options: &RequestOptions) -> ApiResult<Context>;
    async fn create_token(&self, params: &Context, options: &RequestOptions) -> ApiResult<Context>;
    async fn create_charge(&self, params: &Context, options: &RequestOptions)
    -> ApiResult<Context>;
}

pub type StripeApiRef = Arc<dyn StripeApi>;
