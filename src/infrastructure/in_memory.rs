use crate::domain::context::{Context, Value};
use crate::domain::ports::{ApiError, ApiResult, RequestOptions, StripeApi};
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Card number the provider always declines.
pub const DECLINED_CARD: &str = "4000000000000002";

/// Customer keys the provider owns and never takes from request parameters.
const PROVIDER_OWNED: &[&str] = &[
    "id", "object", "source", "sources", "default_source", "created", "livemode",
];

/// Card data used to seed tokens and customers' saved cards.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCard {
    #[serde(default)]
    pub id: Option<String>,
    pub number: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cards: Vec<SeedCard>,
    #[serde(default)]
    pub default_source: Option<String>,
}

/// Initial provider state, usually read from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub tokens: Vec<SeedCard>,
    #[serde(default)]
    pub customers: Vec<SeedCustomer>,
}

#[derive(Debug, Clone)]
struct StoredCard {
    id: String,
    fingerprint: String,
    last4: String,
    brand: &'static str,
    exp_month: u32,
    exp_year: u32,
    declined: bool,
    customer: Option<String>,
}

impl StoredCard {
    fn from_number(id: String, number: &str, exp_month: u32, exp_year: u32) -> Self {
        Self {
            id,
            fingerprint: fingerprint(number),
            last4: last4(number),
            brand: brand(number),
            exp_month,
            exp_year,
            declined: number == DECLINED_CARD,
            customer: None,
        }
    }

    fn to_object(&self) -> Context {
        let mut card = Context::new();
        card.set("id", &self.id);
        card.set("object", "card");
        card.set("brand", self.brand);
        card.set("customer", self.customer.clone());
        card.set("exp_month", self.exp_month);
        card.set("exp_year", self.exp_year);
        card.set("fingerprint", &self.fingerprint);
        card.set("last4", &self.last4);
        card
    }
}

#[derive(Debug, Clone)]
struct StoredToken {
    id: String,
    card: StoredCard,
    used: bool,
}

impl StoredToken {
    fn to_object(&self) -> Context {
        let mut token = Context::new();
        token.set("id", &self.id);
        token.set("object", "token");
        token.set("card", self.card.to_object());
        token.set("used", self.used);
        token
    }
}

#[derive(Debug, Clone)]
struct StoredCustomer {
    id: String,
    fields: Context,
    cards: Vec<StoredCard>,
    default_source: Option<String>,
}

impl StoredCustomer {
    fn to_object(&self) -> Context {
        let mut customer = Context::new();
        customer.set("id", &self.id);
        customer.set("object", "customer");
        customer.replace(self.fields.clone());
        customer.set("default_source", self.default_source.clone());

        let data: Vec<Value> = self
            .cards
            .iter()
            .map(|card| card.to_object().into())
            .collect();
        let mut sources = Context::new();
        sources.set("object", "list");
        sources.set("total_count", data.len() as i64);
        sources.set("data", data);
        customer.set("sources", sources);
        customer
    }

    fn attach(&mut self, mut card: StoredCard) -> Context {
        card.customer = Some(self.id.clone());
        let object = card.to_object();
        if self.default_source.is_none() {
            self.default_source = Some(card.id.clone());
        }
        self.cards.push(card);
        object
    }
}

#[derive(Debug, Default)]
struct State {
    customers: HashMap<String, StoredCustomer>,
    tokens: HashMap<String, StoredToken>,
    charges: Vec<Context>,
}

impl State {
    fn customer(&self, id: &str) -> ApiResult<&StoredCustomer> {
        self.customers
            .get(id)
            .ok_or_else(|| missing("customer", id))
    }

    fn customer_mut(&mut self, id: &str) -> ApiResult<&mut StoredCustomer> {
        self.customers
            .get_mut(id)
            .ok_or_else(|| missing("customer", id))
    }

    /// Marks a token used and hands out a fresh card built from it.
    fn consume_token(&mut self, id: &str) -> ApiResult<StoredCard> {
        let token = self.tokens.get_mut(id).ok_or_else(|| missing("token", id))?;
        if token.used {
            return Err(rejection(
                "invalid_request_error",
                "token_already_used",
                format!("You cannot use a Stripe token more than once: {id}."),
            ));
        }
        token.used = true;
        let mut card = token.card.clone();
        card.id = generate_id("card");
        Ok(card)
    }
}

/// An in-process stand-in for the provider.
///
/// Cloning is cheap and every clone shares the same state, so a test can keep a
/// handle to inspect what the gateway did.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStripe {
    state: Arc<RwLock<State>>,
}

impl InMemoryStripe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Seed) -> Self {
        let mut state = State::default();

        for token in seed.tokens {
            let id = token.id.unwrap_or_else(|| generate_id("tok"));
            let card = StoredCard::from_number(
                generate_id("card"),
                &token.number,
                token.exp_month,
                token.exp_year,
            );
            state.tokens.insert(
                id.clone(),
                StoredToken {
                    id,
                    card,
                    used: false,
                },
            );
        }

        for seeded in seed.customers {
            let mut fields = Context::new();
            if let Some(email) = seeded.email {
                fields.set("email", email);
            }
            let mut customer = StoredCustomer {
                id: seeded.id.clone(),
                fields,
                cards: Vec::new(),
                default_source: None,
            };
            for card in seeded.cards {
                let id = card.id.unwrap_or_else(|| generate_id("card"));
                customer.attach(StoredCard::from_number(
                    id,
                    &card.number,
                    card.exp_month,
                    card.exp_year,
                ));
            }
            if seeded.default_source.is_some() {
                customer.default_source = seeded.default_source;
            }
            state.customers.insert(seeded.id, customer);
        }

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// The customer as the provider would return it.
    pub async fn customer(&self, id: &str) -> Option<Context> {
        let state = self.state.read().await;
        state.customers.get(id).map(StoredCustomer::to_object)
    }

    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }

    /// Every successful charge, oldest first.
    pub async fn charges(&self) -> Vec<Context> {
        self.state.read().await.charges.clone()
    }
}

#[async_trait]
impl StripeApi for InMemoryStripe {
    async fn retrieve_customer(&self, id: &str, _options: &RequestOptions) -> ApiResult<Context> {
        let state = self.state.read().await;
        Ok(state.customer(id)?.to_object())
    }

    async fn create_customer(
        &self,
        params: &Context,
        _options: &RequestOptions,
    ) -> ApiResult<Context> {
        let mut state = self.state.write().await;
        let card = match params.get_or_null("source").reveal_str() {
            Some(token) if !token.is_empty() => Some(state.consume_token(token)?),
            _ => None,
        };
        if card.as_ref().is_some_and(|card| card.declined) {
            return Err(declined());
        }

        let mut customer = StoredCustomer {
            id: generate_id("cus"),
            fields: params.without(PROVIDER_OWNED),
            cards: Vec::new(),
            default_source: None,
        };
        if let Some(card) = card {
            customer.attach(card);
        }
        debug!(customer = %customer.id, "created customer");

        let object = customer.to_object();
        state.customers.insert(customer.id.clone(), customer);
        Ok(object)
    }

    async fn update_customer(
        &self,
        id: &str,
        params: &Context,
        _options: &RequestOptions,
    ) -> ApiResult<Context> {
        let mut state = self.state.write().await;
        let customer = state.customer_mut(id)?;

        if let Some(default_source) = params.get_str("default_source") {
            if !customer.cards.iter().any(|card| card.id == default_source) {
                return Err(missing("source", default_source));
            }
            customer.default_source = Some(default_source.to_string());
        }
        customer.fields.replace(params.without(PROVIDER_OWNED));
        Ok(customer.to_object())
    }

    async fn create_customer_source(
        &self,
        customer: &str,
        source: &str,
        _options: &RequestOptions,
    ) -> ApiResult<Context> {
        let mut state = self.state.write().await;
        state.customer(customer)?;
        let card = state.consume_token(source)?;
        if card.declined {
            return Err(declined());
        }
        let customer = state.customer_mut(customer)?;
        Ok(customer.attach(card))
    }

    async fn delete_customer_source(
        &self,
        customer: &str,
        id: &str,
        _options: &RequestOptions,
    ) -> ApiResult<Context> {
        let mut state = self.state.write().await;
        let customer = state.customer_mut(customer)?;
        let index = customer
            .cards
            .iter()
            .position(|card| card.id == id)
            .ok_or_else(|| missing("source", id))?;
        customer.cards.remove(index);
        if customer.default_source.as_deref() == Some(id) {
            customer.default_source = customer.cards.first().map(|card| card.id.clone());
        }

        let mut deleted = Context::new();
        deleted.set("id", id);
        deleted.set("object", "card");
        deleted.set("deleted", true);
        Ok(deleted)
    }

    async fn retrieve_token(&self, token: &str, _options: &RequestOptions) -> ApiResult<Context> {
        let state = self.state.read().await;
        state
            .tokens
            .get(token)
            .map(StoredToken::to_object)
            .ok_or_else(|| missing("token", token))
    }

    async fn create_token(&self, params: &Context, options: &RequestOptions) -> ApiResult<Context> {
        let mut state = self.state.write().await;

        let card = match (params.get_or_null("card"), params.get_str("customer")) {
            (Value::Context(raw), _) => card_from_params(raw)?,
            (card, Some(customer)) => {
                let card_id = card.as_str().unwrap_or_default();
                let customer = state.customer(customer)?;
                let saved = customer
                    .cards
                    .iter()
                    .find(|saved| saved.id == card_id)
                    .ok_or_else(|| missing("card", card_id))?;
                StoredCard {
                    id: generate_id("card"),
                    customer: None,
                    ..saved.clone()
                }
            }
            _ => {
                return Err(rejection(
                    "invalid_request_error",
                    "parameter_missing",
                    "Missing required param: card.".to_string(),
                ));
            }
        };

        let token = StoredToken {
            id: generate_id("tok"),
            card,
            used: false,
        };
        debug!(token = %token.id, account = ?options.stripe_account, "created token");
        let object = token.to_object();
        state.tokens.insert(token.id.clone(), token);
        Ok(object)
    }

    async fn create_charge(
        &self,
        params: &Context,
        options: &RequestOptions,
    ) -> ApiResult<Context> {
        let mut state = self.state.write().await;

        let amount = params
            .get("amount")
            .and_then(Value::as_i64)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| invalid_param("amount"))?;
        let currency = params
            .get_str("currency")
            .ok_or_else(|| invalid_param("currency"))?
            .to_string();

        let customer_id = params.get_str("customer").filter(|id| !id.is_empty());
        let source = params
            .get_or_null("source")
            .reveal_str()
            .or_else(|| params.get_or_null("card").reveal_str())
            .filter(|source| !source.is_empty());

        let card = match (customer_id, source) {
            (Some(customer_id), source) => {
                let customer = state.customer(customer_id)?;
                let card_id = source
                    .map(str::to_string)
                    .or_else(|| customer.default_source.clone())
                    .ok_or_else(|| invalid_param("source"))?;
                customer
                    .cards
                    .iter()
                    .find(|card| card.id == card_id)
                    .cloned()
                    .ok_or_else(|| missing("source", &card_id))?
            }
            (None, Some(token)) => state.consume_token(token)?,
            (None, None) => return Err(invalid_param("source")),
        };
        if card.declined {
            return Err(declined());
        }

        let mut charge = Context::new();
        charge.set("id", generate_id("ch"));
        charge.set("object", "charge");
        charge.set("amount", amount);
        charge.set("currency", currency);
        if let Some(customer_id) = customer_id {
            charge.set("customer", customer_id);
        }
        charge.set("source", card.to_object());
        charge.set("paid", true);
        charge.set("captured", true);
        charge.set("status", "succeeded");
        if let Some(description) = params.get_str("description") {
            charge.set("description", description);
        }
        debug!(charge = ?charge.get_str("id"), account = ?options.stripe_account, "created charge");

        state.charges.push(charge.clone());
        Ok(charge)
    }
}

fn card_from_params(raw: &Context) -> ApiResult<StoredCard> {
    let number = raw
        .get_or_null("number")
        .reveal_str()
        .filter(|number| number.len() >= 12 && number.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| {
            rejection(
                "card_error",
                "incorrect_number",
                "Your card number is incorrect.".to_string(),
            )
        })?;
    let exp_month = raw
        .get("exp_month")
        .and_then(Value::as_i64)
        .filter(|month| (1..=12).contains(month))
        .ok_or_else(|| {
            rejection(
                "card_error",
                "invalid_expiry_month",
                "Your card's expiration month is invalid.".to_string(),
            )
        })?;
    let exp_year = raw
        .get("exp_year")
        .and_then(Value::as_i64)
        .and_then(|year| u32::try_from(year).ok())
        .ok_or_else(|| {
            rejection(
                "card_error",
                "invalid_expiry_year",
                "Your card's expiration year is invalid.".to_string(),
            )
        })?;

    Ok(StoredCard::from_number(
        generate_id("card"),
        number,
        exp_month as u32,
        exp_year,
    ))
}

fn last4(number: &str) -> String {
    let count = number.chars().count();
    number.chars().skip(count.saturating_sub(4)).collect()
}

fn fingerprint(number: &str) -> String {
    let digest = Sha256::digest(number.as_bytes());
    hex::encode(&digest[..8])
}

fn brand(number: &str) -> &'static str {
    match number.as_bytes().first() {
        Some(b'4') => "Visa",
        Some(b'5') => "MasterCard",
        Some(b'3') => "American Express",
        Some(b'6') => "Discover",
        _ => "Unknown",
    }
}

fn generate_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(14)
        .map(char::from)
        .collect();
    format!("{prefix}_{suffix}")
}

fn rejection(error_type: &str, code: &str, message: String) -> ApiError {
    let mut error = Context::new();
    error.set("type", error_type);
    error.set("code", code);
    error.set("message", message);
    ApiError::Rejected(error.into())
}

fn missing(object: &str, id: &str) -> ApiError {
    rejection(
        "invalid_request_error",
        "resource_missing",
        format!("No such {object}: '{id}'"),
    )
}

fn invalid_param(param: &str) -> ApiError {
    rejection(
        "invalid_request_error",
        "parameter_missing",
        format!("Missing required param: {param}."),
    )
}

fn declined() -> ApiError {
    rejection(
        "card_error",
        "card_declined",
        "Your card was declined.".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sensitive::SensitiveValue;
    use serde_json::json;

    fn ctx(value: serde_json::Value) -> Context {
        Context::try_from(value).unwrap()
    }

    fn no_options() -> RequestOptions {
        RequestOptions::default()
    }

    fn error_code(err: ApiError) -> Option<String> {
        match err {
            ApiError::Rejected(Value::Context(error)) => error.get_str("code").map(str::to_string),
            _ => None,
        }
    }

    async fn tokenize(stripe: &InMemoryStripe, number: &str) -> String {
        let mut card = Context::new();
        card.set("number", SensitiveValue::new(number));
        card.set("exp_month", 12i64);
        card.set("exp_year", 2030i64);
        let mut params = Context::new();
        params.set("card", card);

        let token = stripe.create_token(&params, &no_options()).await.unwrap();
        token.get_str("id").unwrap().to_string()
    }

    #[tokio::test]
    async fn test_same_card_number_yields_same_fingerprint() {
        let stripe = InMemoryStripe::new();
        let first = tokenize(&stripe, "4242424242424242").await;
        let second = tokenize(&stripe, "4242424242424242").await;
        let other = tokenize(&stripe, "5555555555554444").await;

        let fingerprint = |token: Context| {
            token.get_context("card").get_str("fingerprint").unwrap().to_string()
        };
        let first = fingerprint(stripe.retrieve_token(&first, &no_options()).await.unwrap());
        let second = fingerprint(stripe.retrieve_token(&second, &no_options()).await.unwrap());
        let other = fingerprint(stripe.retrieve_token(&other, &no_options()).await.unwrap());

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_tokens_are_single_use() {
        let stripe = InMemoryStripe::new();
        let token = tokenize(&stripe, "4242424242424242").await;
        let params = ctx(json!({"source": token}));

        let customer = stripe.create_customer(&params, &no_options()).await.unwrap();
        let err = stripe.create_customer(&params, &no_options()).await.unwrap_err();

        assert!(customer.is_truthy("default_source"));
        assert_eq!(error_code(err).as_deref(), Some("token_already_used"));
        assert_eq!(stripe.customer_count().await, 1);
    }

    #[tokio::test]
    async fn test_declined_card_is_rejected_on_attach_and_charge() {
        let stripe = InMemoryStripe::new();
        let attach = tokenize(&stripe, DECLINED_CARD).await;
        let charge = tokenize(&stripe, DECLINED_CARD).await;

        let customer = stripe.create_customer(&Context::new(), &no_options()).await.unwrap();
        let customer_id = customer.get_str("id").unwrap();
        let err = stripe
            .create_customer_source(customer_id, &attach, &no_options())
            .await
            .unwrap_err();
        assert_eq!(error_code(err).as_deref(), Some("card_declined"));

        let params = ctx(json!({"amount": 100, "currency": "usd", "card": charge}));
        let err = stripe.create_charge(&params, &no_options()).await.unwrap_err();
        assert_eq!(error_code(err).as_deref(), Some("card_declined"));
        assert!(stripe.charges().await.is_empty());
    }

    #[tokio::test]
    async fn test_seed_with_non_ascii_card_number_keeps_last_four_chars() {
        let seed: Seed = serde_json::from_value(json!({
            "tokens": [{
                "id": "tok_odd",
                "number": "4242 4242 4242 42٤٢",
                "exp_month": 1,
                "exp_year": 2031
            }]
        }))
        .unwrap();
        let stripe = InMemoryStripe::from_seed(seed);

        let token = stripe.retrieve_token("tok_odd", &no_options()).await.unwrap();

        assert_eq!(token.get_context("card").get_str("last4"), Some("42٤٢"));
    }

    #[tokio::test]
    async fn test_charge_without_customer_omits_customer_field() {
        let stripe = InMemoryStripe::new();
        let token = tokenize(&stripe, "4242424242424242").await;
        let params = ctx(json!({"amount": 100, "currency": "usd", "source": token}));

        let charge = stripe.create_charge(&params, &no_options()).await.unwrap();

        assert!(!charge.contains_key("customer"));
    }

    #[tokio::test]
    async fn test_charge_customer_default_card() {
        let stripe = InMemoryStripe::new();
        let token = tokenize(&stripe, "4242424242424242").await;
        let customer = stripe
            .create_customer(&ctx(json!({"source": token, "email": "a@b.c"})), &no_options())
            .await
            .unwrap();
        let params = ctx(json!({
            "amount": 1500,
            "currency": "eur",
            "customer": customer.get_str("id").unwrap()
        }));

        let charge = stripe.create_charge(&params, &no_options()).await.unwrap();

        assert_eq!(charge.get_str("status"), Some("succeeded"));
        assert_eq!(
            charge.get_context("source").get_str("id"),
            customer.get_str("default_source")
        );
        assert_eq!(stripe.charges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_foreign_default_source() {
        let stripe = InMemoryStripe::new();
        let customer = stripe.create_customer(&Context::new(), &no_options()).await.unwrap();
        let id = customer.get_str("id").unwrap();

        let err = stripe
            .update_customer(id, &ctx(json!({"default_source": "card_other"})), &no_options())
            .await
            .unwrap_err();

        assert_eq!(error_code(err).as_deref(), Some("resource_missing"));
    }

    #[tokio::test]
    async fn test_deleting_default_card_promotes_next_card() {
        let seed: Seed = serde_json::from_value(json!({
            "customers": [{
                "id": "cus_1",
                "cards": [
                    {
                        "id": "card_1",
                        "number": "4242424242424242",
                        "exp_month": 1,
                        "exp_year": 2031
                    },
                    {
                        "id": "card_2",
                        "number": "5555555555554444",
                        "exp_month": 2,
                        "exp_year": 2032
                    }
                ]
            }]
        }))
        .unwrap();
        let stripe = InMemoryStripe::from_seed(seed);

        let deleted = stripe
            .delete_customer_source("cus_1", "card_1", &no_options())
            .await
            .unwrap();

        assert!(deleted.is_truthy("deleted"));
        let customer = stripe.customer("cus_1").await.unwrap();
        assert_eq!(customer.get_str("default_source"), Some("card_2"));
    }

    #[tokio::test]
    async fn test_token_from_saved_card_keeps_fingerprint() {
        let seed: Seed = serde_json::from_value(json!({
            "customers": [{
                "id": "cus_1",
                "cards": [{
                    "id": "card_1",
                    "number": "4242424242424242",
                    "exp_month": 1,
                    "exp_year": 2031
                }]
            }]
        }))
        .unwrap();
        let stripe = InMemoryStripe::from_seed(seed);
        let options = RequestOptions {
            stripe_account: Some("acct_1".to_string()),
        };

        let token = stripe
            .create_token(&ctx(json!({"customer": "cus_1", "card": "card_1"})), &options)
            .await
            .unwrap();

        let customer = stripe.customer("cus_1").await.unwrap();
        let saved = customer.get_context("sources").get_or_null("data").as_list().unwrap()[0]
            .as_context()
            .unwrap()
            .clone();
        assert_eq!(
            token.get_context("card").get_str("fingerprint"),
            saved.get_str("fingerprint")
        );
        assert_ne!(token.get_context("card").get_str("id"), Some("card_1"));
    }
}
