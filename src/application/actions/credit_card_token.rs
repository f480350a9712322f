use crate::domain::context::Context;
use crate::domain::intent::{Intent, IntentKind};
use crate::domain::ports::{Action, Gateway};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;

/// Turns raw card details into a provider token via a CreateToken sub-intent.
///
/// The token object becomes the intent's model and its id the intent's token.
#[derive(Debug, Default)]
pub struct CreateTokenForCreditCardAction;

#[async_trait]
impl Action for CreateTokenForCreditCardAction {
    fn supports(&self, intent: &Intent) -> bool {
        intent.kind() == IntentKind::CreateTokenForCreditCard && intent.card().is_some()
    }

    async fn execute(&self, intent: &mut Intent, gateway: &dyn Gateway) -> Result<()> {
        let Some(card) = intent.card() else {
            return Err(GatewayError::Unsupported(intent.kind()));
        };
        let mut params = Context::new();
        params.set("card", card.to_token_params());

        let mut create_token = Intent::new(IntentKind::CreateToken, params);
        gateway.execute(&mut create_token).await?;

        let token = create_token.into_model();
        intent.set_token(token.get_str("id").map(str::to_string));
        intent.set_model(token);
        Ok(())
    }
}
