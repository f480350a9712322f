use crate::application::gateway::execute_on;
use crate::domain::context::Value;
use crate::domain::intent::{Intent, IntentKind};
use crate::domain::ports::{Action, Gateway};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Drives a capture: obtain a token when the payer has not supplied one, then charge.
///
/// A model that already carries a `status` has been processed (or failed
/// earlier in the chain) and is left untouched.
#[derive(Debug, Default)]
pub struct CaptureAction;

#[async_trait]
impl Action for CaptureAction {
    fn supports(&self, intent: &Intent) -> bool {
        intent.kind() == IntentKind::Capture
    }

    async fn execute(&self, intent: &mut Intent, gateway: &dyn Gateway) -> Result<()> {
        let model = intent.model_mut();
        if model.is_truthy("status") {
            debug!(status = ?model.get_str("status"), "capture already has a status, skipping");
            return Ok(());
        }

        let has_token = matches!(
            model.get("card"),
            Some(Value::String(_) | Value::Sensitive(_))
        );
        if !model.is_truthy("customer") && !model.is_truthy("source") && !has_token {
            execute_on(gateway, IntentKind::ObtainToken, model).await?;
            if model.is_truthy("status") {
                return Ok(());
            }
        }

        execute_on(gateway, IntentKind::CreateCharge, model).await
    }
}
