use serde_json::json;
use std::sync::Arc;
use stripe_gateway::application::factory::stripe_gateway;
use stripe_gateway::application::gateway::PaymentGateway;
use stripe_gateway::domain::context::Context;
use stripe_gateway::infrastructure::in_memory::{InMemoryStripe, Seed};

pub const SEED: &str = "tests/fixtures/seed.json";

pub fn ctx(value: serde_json::Value) -> Context {
    Context::try_from(value).unwrap()
}

pub fn seeded_stripe() -> InMemoryStripe {
    let file = std::fs::File::open(SEED).unwrap();
    let seed: Seed = serde_json::from_reader(file).unwrap();
    InMemoryStripe::from_seed(seed)
}

/// The default gateway over a provider handle the test keeps for inspection.
pub fn gateway(stripe: &InMemoryStripe) -> PaymentGateway {
    stripe_gateway(Arc::new(stripe.clone()))
}

pub fn payment(card: &str, local: serde_json::Value) -> Context {
    ctx(json!({
        "amount": 1000,
        "currency": "usd",
        "card": card,
        "local": local
    }))
}
