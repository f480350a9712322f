use serde::{Serialize, Serializer};
use std::fmt;

/// Holds secret material such as a card token or a card number.
///
/// The raw content never shows up through `Debug`, `Display` or `Serialize`;
/// the only way to read it is [`SensitiveValue::peek`]. Serializing a
/// `SensitiveValue` is an error, so a model carrying one cannot be persisted
/// by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SensitiveValue(String);

impl SensitiveValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Reveals the raw content.
    pub fn peek(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the raw content.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SensitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SensitiveValue(***)")
    }
}

impl fmt::Display for SensitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for SensitiveValue {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Err(serde::ser::Error::custom(
            "sensitive values cannot be serialized",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_reveals_raw_content() {
        let value = SensitiveValue::new("tok_secret");
        assert_eq!(value.peek(), "tok_secret");
        assert_eq!(value.into_inner(), "tok_secret");
    }

    #[test]
    fn test_formatting_is_redacted() {
        let value = SensitiveValue::new("4242424242424242");
        assert_eq!(format!("{:?}", value), "SensitiveValue(***)");
        assert_eq!(value.to_string(), "***");
    }

    #[test]
    fn test_serialization_is_refused() {
        let value = SensitiveValue::new("tok_secret");
        let result = serde_json::to_string(&value);
        assert!(result.is_err());
        assert!(!result.unwrap_err().to_string().contains("tok_secret"));
    }
}
