use super::context::Context;
use super::sensitive::SensitiveValue;

/// Raw credit card details entered by a payer.
///
/// Number and security code stay wrapped until they are handed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditCard {
    pub number: SensitiveValue,
    pub exp_month: u32,
    pub exp_year: u32,
    pub security_code: Option<SensitiveValue>,
}

impl CreditCard {
    pub fn new(number: impl Into<String>, exp_month: u32, exp_year: u32) -> Self {
        Self {
            number: SensitiveValue::new(number),
            exp_month,
            exp_year,
            security_code: None,
        }
    }

    pub fn with_security_code(mut self, cvc: impl Into<String>) -> Self {
        self.security_code = Some(SensitiveValue::new(cvc));
        self
    }

    /// Card parameters in the shape the token endpoint expects.
    pub fn to_token_params(&self) -> Context {
        let mut card = Context::new();
        card.set("number", self.number.clone());
        card.set("exp_month", self.exp_month);
        card.set("exp_year", self.exp_year);
        if let Some(cvc) = &self.security_code {
            card.set("cvc", cvc.clone());
        }
        card
    }
}
