use crate::domain::context::{Context, Value};
use crate::domain::intent::{Intent, IntentKind};
use crate::domain::ports::{Action, ApiError, Gateway, RequestOptions, StripeApiRef};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Keys never sent to the provider on a customer update.
const CUSTOMER_READ_ONLY: &[&str] = &[
    "local", "id", "object", "sources", "source", "created", "livemode", "error",
];

/// Performs the single provider call behind each API intent.
///
/// On success the provider object is merged into the model. A rejection is
/// merged as `{"error": payload}` so callers can inspect it; only transport
/// failures come back as `Err`.
pub struct ApiAction {
    api: StripeApiRef,
}

impl ApiAction {
    pub fn new(api: StripeApiRef) -> Self {
        Self { api }
    }
}

fn required_str<'a>(model: &'a Context, key: &str) -> Result<&'a str> {
    model.validate_not_empty(&[key])?;
    model
        .get_or_null(key)
        .reveal_str()
        .ok_or_else(|| GatewayError::ValidationError(format!("The {key} field must be a string.")))
}

fn check_chargeable(model: &Context) -> Result<()> {
    model.validate_not_empty(&["amount", "currency"])?;
    if !(model.is_truthy("card") || model.is_truthy("customer") || model.is_truthy("source")) {
        return Err(GatewayError::LogicError(
            "The either card token or customer id has to be set.".to_string(),
        ));
    }
    if matches!(model.get("card"), Some(Value::Context(_) | Value::List(_))) {
        return Err(GatewayError::LogicError(
            "The token has already been used.".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl Action for ApiAction {
    fn supports(&self, intent: &Intent) -> bool {
        intent.kind().is_api_call()
    }

    async fn execute(&self, intent: &mut Intent, _gateway: &dyn Gateway) -> Result<()> {
        let kind = intent.kind();
        let model = intent.model_mut();
        let options = RequestOptions::from_model(model);
        let api = self.api.as_ref();

        let outcome = match kind {
            IntentKind::RetrieveCustomer => {
                api.retrieve_customer(required_str(model, "id")?, &options).await
            }
            IntentKind::CreateCustomer => {
                api.create_customer(&model.without(&["local"]), &options).await
            }
            IntentKind::UpdateCustomer => {
                let id = required_str(model, "id")?;
                api.update_customer(id, &model.without(CUSTOMER_READ_ONLY), &options).await
            }
            IntentKind::CreateCustomerSource => {
                let customer = required_str(model, "customer")?;
                let source = required_str(model, "source")?;
                api.create_customer_source(customer, source, &options).await
            }
            IntentKind::DeleteCustomerSource => {
                let customer = required_str(model, "customer")?;
                let id = required_str(model, "id")?;
                api.delete_customer_source(customer, id, &options).await
            }
            IntentKind::RetrieveToken => {
                api.retrieve_token(required_str(model, "token")?, &options).await
            }
            IntentKind::CreateToken => api.create_token(&model.without(&["local"]), &options).await,
            IntentKind::CreateCharge => {
                check_chargeable(model)?;
                api.create_charge(&model.without(&["local"]), &options).await
            }
            other => return Err(GatewayError::Unsupported(other)),
        };

        match outcome {
            Ok(object) => {
                debug!(intent = %kind, id = ?object.get_str("id"), "provider call succeeded");
                model.replace(object);
                Ok(())
            }
            Err(ApiError::Rejected(payload)) => {
                let details = payload.as_context();
                warn!(
                    intent = %kind,
                    error_type = ?details.and_then(|d| d.get_str("type")),
                    code = ?details.and_then(|d| d.get_str("code")),
                    "provider rejected the request"
                );
                model.set("error", payload);
                Ok(())
            }
            Err(ApiError::Transport(message)) => Err(GatewayError::Transport(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gateway::{PaymentGateway, execute_on};
    use crate::domain::sensitive::SensitiveValue;
    use crate::infrastructure::in_memory::{InMemoryStripe, Seed};
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(value: serde_json::Value) -> Context {
        Context::try_from(value).unwrap()
    }

    fn gateway(stripe: &InMemoryStripe) -> PaymentGateway {
        PaymentGateway::builder()
            .add_action(ApiAction::new(Arc::new(stripe.clone())))
            .build()
    }

    fn seeded() -> InMemoryStripe {
        let seed: Seed = serde_json::from_value(json!({
            "tokens": [{
                "id": "tok_visa",
                "number": "4242424242424242",
                "exp_month": 12,
                "exp_year": 2030
            }],
            "customers": [{
                "id": "cus_1",
                "email": "jane@example.com",
                "cards": [{
                    "id": "card_1",
                    "number": "4242424242424242",
                    "exp_month": 1,
                    "exp_year": 2031
                }],
                "default_source": "card_1"
            }]
        }))
        .unwrap();
        InMemoryStripe::from_seed(seed)
    }

    #[tokio::test]
    async fn test_retrieve_customer_merges_provider_object() {
        let stripe = seeded();
        let mut model = ctx(json!({"id": "cus_1", "foo": "fooVal"}));

        execute_on(&gateway(&stripe), IntentKind::RetrieveCustomer, &mut model)
            .await
            .unwrap();

        assert_eq!(model.get_str("email"), Some("jane@example.com"));
        assert_eq!(model.get_str("default_source"), Some("card_1"));
        assert_eq!(model.get_str("foo"), Some("fooVal"));
        let sources = model.get_context("sources");
        assert_eq!(sources.get_or_null("data").as_list().map(|l| l.len()), Some(1));
    }

    #[tokio::test]
    async fn test_rejection_becomes_error_payload() {
        let stripe = seeded();
        let mut model = ctx(json!({"id": "cus_missing"}));

        execute_on(&gateway(&stripe), IntentKind::RetrieveCustomer, &mut model)
            .await
            .unwrap();

        assert_eq!(model.get_str("id"), Some("cus_missing"));
        let error = model.get_context("error");
        assert_eq!(error.get_str("code"), Some("resource_missing"));
    }

    #[tokio::test]
    async fn test_missing_required_fields_fail_validation() {
        let stripe = seeded();
        let mut model = ctx(json!({"customer": "cus_1"}));

        let err = execute_on(&gateway(&stripe), IntentKind::CreateCustomerSource, &mut model)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::ValidationError(ref msg) if msg.contains("source")));
    }

    #[tokio::test]
    async fn test_sensitive_token_is_revealed_only_for_the_call() {
        let stripe = seeded();
        let mut model = Context::new();
        model.set("token", SensitiveValue::new("tok_visa"));

        execute_on(&gateway(&stripe), IntentKind::RetrieveToken, &mut model)
            .await
            .unwrap();

        assert!(model.get_or_null("token").is_sensitive());
        assert!(model.get_context("card").is_truthy("fingerprint"));
    }

    #[tokio::test]
    async fn test_charge_requires_a_payment_method() {
        let stripe = seeded();
        let mut model = ctx(json!({"amount": 100, "currency": "usd"}));

        let err = execute_on(&gateway(&stripe), IntentKind::CreateCharge, &mut model)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::LogicError(_)));
    }

    #[tokio::test]
    async fn test_charge_rejects_structured_card() {
        let stripe = seeded();
        let mut model = ctx(json!({"amount": 100, "currency": "usd", "card": {"number": "4242"}}));

        let err = execute_on(&gateway(&stripe), IntentKind::CreateCharge, &mut model)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::LogicError(ref msg) if msg.contains("already been used")
        ));
    }

    #[tokio::test]
    async fn test_update_customer_sends_only_mutable_fields() {
        let stripe = seeded();
        let mut model = ctx(json!({
            "id": "cus_1",
            "source": "tok_should_not_attach",
            "default_source": "card_1",
            "description": "vip",
            "local": {"save_card": true}
        }));

        execute_on(&gateway(&stripe), IntentKind::UpdateCustomer, &mut model)
            .await
            .unwrap();

        assert_eq!(model.get_str("description"), Some("vip"));
        let sources = model.get_context("sources");
        assert_eq!(sources.get_or_null("data").as_list().map(|l| l.len()), Some(1));
        assert!(!model.contains_key("error"));
    }

    #[test]
    fn test_supports_only_api_kinds() {
        let action = ApiAction::new(Arc::new(InMemoryStripe::new()));
        assert!(action.supports(&Intent::new(IntentKind::CreateCustomer, Context::new())));
        assert!(!action.supports(&Intent::capture(Context::new())));
        assert!(!action.supports(&Intent::get_refund_info(Context::new())));
    }
}
