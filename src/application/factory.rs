use crate::application::actions::{
    ApiAction, CaptureAction, CreateTokenForCreditCardAction, RefundInfoAction,
};
use crate::application::customer_extension::CustomerExtension;
use crate::application::gateway::{GatewayBuilder, PaymentGateway};
use crate::domain::ports::StripeApiRef;

/// Builder preloaded with the provider's actions and the customer extension.
///
/// Callers can still prepend their own actions or add extensions before building.
pub fn stripe_gateway_builder(api: StripeApiRef) -> GatewayBuilder {
    PaymentGateway::builder()
        .add_action(CaptureAction)
        .add_action(CreateTokenForCreditCardAction)
        .add_action(RefundInfoAction)
        .add_action(ApiAction::new(api))
        .add_extension(CustomerExtension)
}

pub fn stripe_gateway(api: StripeApiRef) -> PaymentGateway {
    stripe_gateway_builder(api).build()
}
