use crate::domain::context::Context;
use crate::error::Result;
use std::io::Write;

/// Writes payment models as pretty-printed JSON, one document per call.
///
/// Writing fails if the model still holds a sensitive value.
pub struct ContextWriter<W: Write> {
    writer: W,
}

impl<W: Write> ContextWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, model: &Context) -> Result<()> {
        let rendered = serde_json::to_string_pretty(model)?;
        writeln!(self.writer, "{rendered}")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sensitive::SensitiveValue;
    use crate::error::GatewayError;

    #[test]
    fn test_writer_outputs_json_object() {
        let mut model = Context::new();
        model.set("status", "succeeded");
        model.set("amount", 100i64);

        let mut writer = ContextWriter::new(Vec::new());
        writer.write(&model).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, serde_json::json!({"status": "succeeded", "amount": 100}));
    }

    #[test]
    fn test_writer_refuses_sensitive_values() {
        let mut model = Context::new();
        model.set("card", SensitiveValue::new("4242424242424242"));

        let mut writer = ContextWriter::new(Vec::new());
        let err = writer.write(&model).unwrap_err();

        assert!(matches!(err, GatewayError::Json(_)));
        assert!(writer.into_inner().is_empty());
    }
}
