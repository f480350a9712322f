//! Provider implementations behind the [`StripeApi`](crate::domain::ports::StripeApi) port.

pub mod in_memory;
