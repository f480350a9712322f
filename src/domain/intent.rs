use super::card::CreditCard;
use super::context::Context;
use std::fmt;

/// Every kind of request the gateway knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Capture,
    Refund,
    ObtainToken,
    CreateCharge,
    RetrieveCustomer,
    CreateCustomer,
    UpdateCustomer,
    CreateCustomerSource,
    DeleteCustomerSource,
    RetrieveToken,
    CreateToken,
    GetRefundInfo,
    CreateTokenForCreditCard,
}

impl IntentKind {
    pub fn name(&self) -> &'static str {
        match self {
            IntentKind::Capture => "Capture",
            IntentKind::Refund => "Refund",
            IntentKind::ObtainToken => "ObtainToken",
            IntentKind::CreateCharge => "CreateCharge",
            IntentKind::RetrieveCustomer => "RetrieveCustomer",
            IntentKind::CreateCustomer => "CreateCustomer",
            IntentKind::UpdateCustomer => "UpdateCustomer",
            IntentKind::CreateCustomerSource => "CreateCustomerSource",
            IntentKind::DeleteCustomerSource => "DeleteCustomerSource",
            IntentKind::RetrieveToken => "RetrieveToken",
            IntentKind::CreateToken => "CreateToken",
            IntentKind::GetRefundInfo => "GetRefundInfo",
            IntentKind::CreateTokenForCreditCard => "CreateTokenForCreditCard",
        }
    }

    /// Kinds that map onto exactly one provider API call.
    pub fn is_api_call(&self) -> bool {
        matches!(
            self,
            IntentKind::CreateCharge
                | IntentKind::RetrieveCustomer
                | IntentKind::CreateCustomer
                | IntentKind::UpdateCustomer
                | IntentKind::CreateCustomerSource
                | IntentKind::DeleteCustomerSource
                | IntentKind::RetrieveToken
                | IntentKind::CreateToken
        )
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "capture" => Ok(IntentKind::Capture),
            "refund" => Ok(IntentKind::Refund),
            "obtaintoken" => Ok(IntentKind::ObtainToken),
            "createcharge" => Ok(IntentKind::CreateCharge),
            "retrievecustomer" => Ok(IntentKind::RetrieveCustomer),
            "createcustomer" => Ok(IntentKind::CreateCustomer),
            "updatecustomer" => Ok(IntentKind::UpdateCustomer),
            "createcustomersource" => Ok(IntentKind::CreateCustomerSource),
            "deletecustomersource" => Ok(IntentKind::DeleteCustomerSource),
            "retrievetoken" => Ok(IntentKind::RetrieveToken),
            "createtoken" => Ok(IntentKind::CreateToken),
            "getrefundinfo" => Ok(IntentKind::GetRefundInfo),
            "createtokenforcreditcard" => Ok(IntentKind::CreateTokenForCreditCard),
            _ => Err(format!("unknown intent kind: {s}")),
        }
    }
}

/// A typed request for one unit of work.
///
/// The intent owns its model for the duration of a dispatch; callers get the
/// context back with [`Intent::into_model`].
#[derive(Debug, Clone)]
pub struct Intent {
    kind: IntentKind,
    model: Context,
    card: Option<CreditCard>,
    refund_id: Option<String>,
    token: Option<String>,
}

impl Intent {
    pub fn new(kind: IntentKind, model: Context) -> Self {
        Self {
            kind,
            model,
            card: None,
            refund_id: None,
            token: None,
        }
    }

    pub fn capture(model: Context) -> Self {
        Self::new(IntentKind::Capture, model)
    }

    pub fn get_refund_info(model: Context) -> Self {
        Self::new(IntentKind::GetRefundInfo, model)
    }

    pub fn create_token_for_credit_card(card: CreditCard) -> Self {
        Self {
            card: Some(card),
            ..Self::new(IntentKind::CreateTokenForCreditCard, Context::new())
        }
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    pub fn model(&self) -> &Context {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Context {
        &mut self.model
    }

    pub fn set_model(&mut self, model: Context) {
        self.model = model;
    }

    pub fn into_model(self) -> Context {
        self.model
    }

    pub fn card(&self) -> Option<&CreditCard> {
        self.card.as_ref()
    }

    pub fn refund_id(&self) -> Option<&str> {
        self.refund_id.as_deref()
    }

    pub fn set_refund_id(&mut self, refund_id: Option<String>) {
        self.refund_id = refund_id;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }
}
