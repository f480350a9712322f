use crate::domain::intent::{Intent, IntentKind};
use crate::domain::ports::{Action, Gateway};
use crate::error::Result;
use async_trait::async_trait;

/// Answers GetRefundInfo with the refund id stored on the model.
#[derive(Debug, Default)]
pub struct RefundInfoAction;

#[async_trait]
impl Action for RefundInfoAction {
    fn supports(&self, intent: &Intent) -> bool {
        intent.kind() == IntentKind::GetRefundInfo
    }

    async fn execute(&self, intent: &mut Intent, _gateway: &dyn Gateway) -> Result<()> {
        let refund_id = intent.model().get_str("id").map(str::to_string);
        intent.set_refund_id(refund_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gateway::PaymentGateway;
    use crate::domain::context::Context;

    #[tokio::test]
    async fn test_sets_refund_id_from_model() {
        let gateway = PaymentGateway::builder().add_action(RefundInfoAction).build();
        let mut model = Context::new();
        model.set("id", "re_123");
        let mut intent = Intent::get_refund_info(model);

        gateway.execute(&mut intent).await.unwrap();

        assert_eq!(intent.refund_id(), Some("re_123"));
    }

    #[tokio::test]
    async fn test_refund_id_absent_when_model_has_no_id() {
        let gateway = PaymentGateway::builder().add_action(RefundInfoAction).build();
        let mut intent = Intent::get_refund_info(Context::new());

        gateway.execute(&mut intent).await.unwrap();

        assert_eq!(intent.refund_id(), None);
    }

    #[test]
    fn test_supports_only_refund_info() {
        assert!(RefundInfoAction.supports(&Intent::get_refund_info(Context::new())));
        assert!(!RefundInfoAction.supports(&Intent::capture(Context::new())));
    }
}
