//! Application layer: the dispatcher, its actions and the customer extension.
//!
//! [`gateway::PaymentGateway`] routes each intent to the first action that
//! supports it and runs the extension hooks around it. Actions may issue
//! sub-intents through the gateway handle they are given.

pub mod actions;
pub mod customer_extension;
pub mod factory;
pub mod gateway;
