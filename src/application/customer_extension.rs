use crate::application::gateway::execute_on;
use crate::domain::context::{Context, Value};
use crate::domain::intent::IntentKind;
use crate::domain::ports::{Extension, ExtensionContext, Gateway};
use crate::domain::status::ChargeStatus;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Saves the payer's card on a provider customer and charges through it.
///
/// Opt-in per payment via `local.save_card`. Before a capture (or after a token
/// has been obtained) the raw `card` reference is resolved into a `customer` +
/// `source` pair, creating the customer or attaching the card when needed.
/// After a charge the customer's default card is moved to the one just used.
///
/// All working state lives under `local`:
///
/// * `local.customer` - the customer record, optionally pre-seeded with an `id`
///   of a returning customer or with fields for a new one
/// * `local.card_details` / `local.card_id` - the stored card the charge uses
/// * `local.stripe_headers.stripe_account` - charge on a connected account
///
/// Provider failures are written to `status` / `error` on the model.
#[derive(Debug, Default)]
pub struct CustomerExtension;

#[async_trait]
impl Extension for CustomerExtension {
    async fn on_pre_execute(&self, context: &mut ExtensionContext<'_>) -> Result<()> {
        if context.intent().kind() != IntentKind::Capture {
            return Ok(());
        }

        let gateway = context.gateway();
        let model = context.intent_mut().model_mut();
        retrieve_customer(gateway, model).await?;
        save_card(gateway, model).await
    }

    async fn on_post_execute(&self, context: &mut ExtensionContext<'_>) -> Result<()> {
        let gateway = context.gateway();
        match context.intent().kind() {
            IntentKind::ObtainToken => save_card(gateway, context.intent_mut().model_mut()).await,
            IntentKind::CreateCharge => {
                sync_default_source(gateway, context.intent_mut().model_mut()).await
            }
            _ => Ok(()),
        }
    }
}

/// Refreshes a returning customer's record (and its saved cards) from the provider.
async fn retrieve_customer(gateway: &dyn Gateway, model: &mut Context) -> Result<()> {
    if model.is_truthy("customer") {
        return Ok(());
    }

    let mut local = model.get_context("local");
    if !local.is_truthy("save_card") {
        return Ok(());
    }

    let mut customer = local.get_context("customer");
    if !customer.is_truthy("id") {
        return Ok(());
    }

    debug!(customer = ?customer.get_str("id"), "retrieving returning customer");
    execute_on(gateway, IntentKind::RetrieveCustomer, &mut customer).await?;

    local.set("customer", customer);
    model.set("local", local);
    Ok(())
}

/// Resolves the top-level `card` into a customer and a stored card.
async fn save_card(gateway: &dyn Gateway, model: &mut Context) -> Result<()> {
    if model.is_truthy("customer") {
        return Ok(());
    }

    let card = match model.get("card") {
        Some(card @ (Value::String(_) | Value::Sensitive(_))) if card.is_truthy() => card.clone(),
        _ => return Ok(()),
    };

    let mut local = model.get_context("local");
    if !local.is_truthy("save_card") {
        return Ok(());
    }

    let mut customer = local.get_context("customer");
    customer.set("source", card.clone());

    let card_details = if customer.is_truthy("id") {
        match resolve_saved_card(gateway, model, &customer, &card).await? {
            Some(details) => Some(details),
            None => return Ok(()),
        }
    } else {
        debug!("creating customer with the card as its source");
        execute_on(gateway, IntentKind::CreateCustomer, &mut customer).await?;
        let default_source = customer.get_or_null("default_source").clone();
        if default_source.is_truthy() {
            Some(
                find_source(&customer, |source| source.get("id") == Some(&default_source))
                    .unwrap_or_else(|| card_with_id(default_source.clone())),
            )
        } else {
            None
        }
    };

    if card.is_sensitive() {
        customer.remove("source");
    }

    let customer_id = customer.get_or_null("id").clone();
    let customer_error = customer.get_or_null("error").clone();
    let card_id = card_details
        .as_ref()
        .map(|details| details.get_or_null("id").clone())
        .unwrap_or_default();
    let stripe_headers = local.get_context("stripe_headers");

    local.set("customer", customer);
    if let Some(details) = card_details {
        local.set("card_details", details);
    }
    local.set("card_id", card_id.clone());
    model.set("local", local);
    model.remove("card");

    if !customer_id.is_truthy() || customer_error.is_truthy() {
        mark_failed(model, customer_error);
        return Ok(());
    }

    if stripe_headers.is_truthy("stripe_account") {
        // A customer's card cannot be charged on a connected account directly;
        // it has to be exchanged for a token scoped to that account.
        let mut token = Context::new();
        token.set("customer", customer_id);
        token.set("card", card_id);
        let mut token_local = Context::new();
        token_local.set("stripe_headers", stripe_headers);
        token.set("local", token_local);

        execute_on(gateway, IntentKind::CreateToken, &mut token).await?;
        if token.is_truthy("id") {
            model.set("source", token.get_or_null("id").clone());
        } else {
            mark_failed(model, token.get_or_null("error").clone());
        }
    } else {
        model.set("customer", customer_id);
        model.set("source", card_id);
    }

    Ok(())
}

/// Finds, or attaches, the returning customer's stored card for `card`.
///
/// Returns `None` after marking the model failed when the card could not be attached.
async fn resolve_saved_card(
    gateway: &dyn Gateway,
    model: &mut Context,
    customer: &Context,
    card: &Value,
) -> Result<Option<Context>> {
    if !is_token_like(card) {
        let details = find_source(customer, |source| source.get("id") == Some(card))
            .unwrap_or_else(|| card_with_id(card.clone()));
        return Ok(Some(details));
    }

    let mut token = Context::new();
    token.set("token", card.clone());
    execute_on(gateway, IntentKind::RetrieveToken, &mut token).await?;

    let fingerprint = token.get_context("card").get_or_null("fingerprint").clone();
    if fingerprint.is_truthy()
        && let Some(existing) =
            find_source(customer, |source| source.get("fingerprint") == Some(&fingerprint))
    {
        debug!(card = ?existing.get_str("id"), "reusing saved card with the same fingerprint");
        return Ok(Some(existing));
    }

    debug!(customer = ?customer.get_str("id"), "attaching new card to customer");
    let mut source = Context::new();
    source.set("customer", customer.get_or_null("id").clone());
    source.set("source", card.clone());
    execute_on(gateway, IntentKind::CreateCustomerSource, &mut source).await?;

    if !source.is_truthy("id") {
        mark_failed(model, source.get_or_null("error").clone());
        return Ok(None);
    }
    source.remove("source");
    Ok(Some(source))
}

/// Makes the card just charged the customer's default.
async fn sync_default_source(gateway: &dyn Gateway, model: &mut Context) -> Result<()> {
    let mut local = model.get_context("local");
    if !local.is_truthy("card_id") || !local.is_truthy("customer") || !local.is_truthy("save_card")
    {
        return Ok(());
    }

    let card_id = local.get_or_null("card_id").clone();
    let mut customer = local.get_context("customer");
    if !customer.is_truthy("id")
        || model.is_truthy("error")
        || customer.get_or_null("default_source") == &card_id
    {
        return Ok(());
    }

    debug!(customer = ?customer.get_str("id"), "updating customer default source");
    customer.set("default_source", card_id);
    execute_on(gateway, IntentKind::UpdateCustomer, &mut customer).await?;

    if !customer.is_truthy("id") {
        return Ok(());
    }

    local.set("customer", customer);
    model.set("local", local);
    Ok(())
}

fn is_token_like(card: &Value) -> bool {
    match card {
        Value::Sensitive(_) => true,
        Value::String(s) => s.starts_with("tok"),
        _ => false,
    }
}

/// First entry of `customer.sources.data` accepted by `matches`.
fn find_source(customer: &Context, matches: impl Fn(&Context) -> bool) -> Option<Context> {
    let sources = customer.get_context("sources");
    sources
        .get_or_null("data")
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_context)
        .find(|source| matches(source))
        .cloned()
}

fn card_with_id(id: Value) -> Context {
    let mut card = Context::new();
    card.set("id", id);
    card
}

fn mark_failed(model: &mut Context, error: Value) {
    model.set("status", ChargeStatus::Failed);
    model.set("error", error);
}
