use crate::domain::context::{Context, Value};
use crate::domain::sensitive::SensitiveValue;
use crate::error::Result;
use std::io::Read;

/// Reads a payment model from a JSON object.
pub struct ContextReader<R: Read> {
    source: R,
    sensitive_card: bool,
}

impl<R: Read> ContextReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            sensitive_card: false,
        }
    }

    /// Wraps a string `card` in a [`SensitiveValue`] so it is never written back out.
    pub fn sensitive_card(mut self, sensitive: bool) -> Self {
        self.sensitive_card = sensitive;
        self
    }

    pub fn read(self) -> Result<Context> {
        let mut model: Context = serde_json::from_reader(self.source)?;
        if self.sensitive_card
            && let Some(card) = model.get_str("card")
        {
            let card = SensitiveValue::new(card);
            model.set("card", Value::Sensitive(card));
        }
        Ok(model)
    }
}
