use crate::domain::context::Context;
use crate::domain::intent::{Intent, IntentKind};
use crate::domain::ports::{
    Action, ActionBox, Extension, ExtensionBox, ExtensionContext, Gateway,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use tracing::{Instrument, debug, debug_span, warn};

/// Dispatch depth at which the gateway gives up on a call tree.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// The action registry and dispatcher.
///
/// `PaymentGateway` owns an ordered list of actions and an ordered chain of
/// extensions. Each intent goes to the first action that supports it, with the
/// extension hooks run around it. Actions issue sub-intents through the
/// [`Gateway`] handle they are given, which dispatches through the same
/// registry on the calling task.
///
/// The gateway holds no per-request state, so one instance can serve
/// concurrent top-level intents as long as each carries its own model.
pub struct PaymentGateway {
    actions: Vec<ActionBox>,
    extensions: Vec<ExtensionBox>,
    max_depth: usize,
}

impl PaymentGateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    fn find_action(&self, intent: &Intent) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|action| action.supports(intent))
            .map(|action| action.as_ref())
    }
}

#[async_trait]
impl Gateway for PaymentGateway {
    async fn execute(&self, intent: &mut Intent) -> Result<()> {
        Frame::root(self).execute(intent).await
    }
}

/// Builds a [`PaymentGateway`].
pub struct GatewayBuilder {
    actions: Vec<ActionBox>,
    extensions: Vec<ExtensionBox>,
    max_depth: usize,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            extensions: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl GatewayBuilder {
    /// Appends an action; earlier registrations win when several support an intent.
    pub fn add_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Registers an action ahead of every action added so far.
    pub fn prepend_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.insert(0, Box::new(action));
        self
    }

    pub fn add_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(self) -> PaymentGateway {
        PaymentGateway {
            actions: self.actions,
            extensions: self.extensions,
            max_depth: self.max_depth,
        }
    }
}

/// One level of the dispatch call tree.
///
/// `chain` holds the kinds of the intents currently being executed, outermost
/// first, including the one this frame dispatches.
struct Frame<'g> {
    gateway: &'g PaymentGateway,
    chain: Vec<IntentKind>,
}

impl<'g> Frame<'g> {
    fn root(gateway: &'g PaymentGateway) -> Self {
        Self {
            gateway,
            chain: Vec::new(),
        }
    }

    async fn dispatch(&self, intent: &mut Intent) -> Result<()> {
        let previous = &self.chain[..self.chain.len() - 1];

        for extension in &self.gateway.extensions {
            let mut context = ExtensionContext::new(self, intent, previous);
            extension.on_pre_execute(&mut context).await?;
        }

        let Some(action) = self.gateway.find_action(intent) else {
            warn!(intent = %intent.kind(), "no action supports the request");
            return Err(GatewayError::Unsupported(intent.kind()));
        };

        for extension in &self.gateway.extensions {
            let mut context = ExtensionContext::new(self, intent, previous);
            extension.on_execute(&mut context).await?;
        }

        action.execute(intent, self).await?;

        for extension in &self.gateway.extensions {
            let mut context = ExtensionContext::new(self, intent, previous);
            extension.on_post_execute(&mut context).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Gateway for Frame<'_> {
    async fn execute(&self, intent: &mut Intent) -> Result<()> {
        let kind = intent.kind();
        let depth = self.chain.len();
        if depth >= self.gateway.max_depth {
            return Err(GatewayError::RecursionLimit {
                kind,
                limit: self.gateway.max_depth,
            });
        }

        let mut chain = self.chain.clone();
        chain.push(kind);
        let frame = Frame {
            gateway: self.gateway,
            chain,
        };

        debug!(intent = %kind, depth, "dispatching");
        frame
            .dispatch(intent)
            .instrument(debug_span!("dispatch", intent = %kind, depth))
            .await
    }
}

/// Executes `kind` on `model` and hands the (possibly updated) model back,
/// whether or not dispatch succeeded.
pub async fn execute_on(
    gateway: &dyn Gateway,
    kind: IntentKind,
    model: &mut Context,
) -> Result<()> {
    let mut intent = Intent::new(kind, std::mem::take(model));
    let result = gateway.execute(&mut intent).await;
    *model = intent.into_model();
    result
}
