//! Domain layer: the context model, intents, and the ports the gateway talks through.

pub mod card;
pub mod context;
pub mod intent;
pub mod ports;
pub mod sensitive;
pub mod status;
