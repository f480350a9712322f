use super::sensitive::SensitiveValue;
use crate::error::{GatewayError, Result};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;

static NULL: Value = Value::Null;

/// A single value stored in a [`Context`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sensitive(SensitiveValue),
    List(Vec<Value>),
    Context(Context),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Loose truthiness used by every guard in the gateway.
    ///
    /// Null, `false`, zero, `""`, `"0"` and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Sensitive(s) => !s.peek().is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Context(ctx) => !ctx.is_empty(),
        }
    }

    pub fn is_sensitive(&self) -> bool {
        matches!(self, Value::Sensitive(_))
    }

    /// Returns the content of a plain string. Sensitive values are not plain strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the content of a plain or sensitive string.
    ///
    /// Only the provider boundary is expected to call this on sensitive values.
    pub fn reveal_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Sensitive(s) => Some(s.peek()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&Context> {
        match self {
            Value::Context(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value.into())
    }
}

impl From<SensitiveValue> for Value {
    fn from(value: SensitiveValue) -> Self {
        Value::Sensitive(value)
    }
}

impl From<Context> for Value {
    fn from(value: Context) -> Self {
        Value::Context(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Context(Context::from(map)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sensitive(s) => s.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Context(ctx) => ctx.serialize(serializer),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A>(self, map: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        ContextVisitor.visit_map(map).map(Value::Context)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// The mutable payload carried by every intent.
///
/// Entries keep their insertion order. Nested contexts are plain values: reading
/// one with [`Context::get_context`] hands out a detached copy, and changes only
/// reach the parent once the copy is written back with [`Context::set`].
///
/// Equality ignores entry order.
#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: Vec<(String, Value)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Like [`Context::get`], with absent keys reading as null.
    pub fn get_or_null(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns a detached copy of the nested context under `key`.
    ///
    /// Absent keys and non-context values yield an empty context.
    pub fn get_context(&self, key: &str) -> Context {
        self.get(key)
            .and_then(Value::as_context)
            .cloned()
            .unwrap_or_default()
    }

    /// Inserts or overwrites `key`. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Overwrites this context's entries with every entry of `other`.
    pub fn replace(&mut self, other: Context) {
        for (key, value) in other.entries {
            self.set(key, value);
        }
    }

    /// Returns a copy without the listed top-level keys.
    pub fn without(&self, keys: &[&str]) -> Context {
        self.entries
            .iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .cloned()
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fails with a validation error naming every listed key that is not truthy.
    pub fn validate_not_empty(&self, keys: &[&str]) -> Result<()> {
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !self.is_truthy(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::ValidationError(format!(
                "The {} fields are required.",
                missing.join(", ")
            )))
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Context::new();
        for (key, value) in iter {
            ctx.set(key, value);
        }
        ctx
    }
}

impl IntoIterator for Context {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Context {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

impl TryFrom<serde_json::Value> for Context {
    type Error = GatewayError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Context::from(map)),
            other => Err(GatewayError::ValidationError(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

impl Serialize for Context {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct ContextVisitor;

impl<'de> Visitor<'de> for ContextVisitor {
    type Value = Context;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Context, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut ctx = Context::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            ctx.set(key, value);
        }
        Ok(ctx)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ContextVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> Context {
        Context::try_from(json!({
            "card": "tok_xxx",
            "local": {"save_card": true, "customer": {"id": "cus_1"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_nested_read_is_detached_until_written_back() {
        let mut ctx = model();

        let mut local = ctx.get_context("local");
        local.set("card_id", "card_1");
        assert!(!ctx.get_context("local").contains_key("card_id"));

        ctx.set("local", local);
        assert_eq!(ctx.get_context("local").get_str("card_id"), Some("card_1"));
    }

    #[test]
    fn test_missing_or_scalar_section_reads_as_empty() {
        let ctx = model();
        assert!(ctx.get_context("absent").is_empty());
        assert!(ctx.get_context("card").is_empty());
    }

    #[test]
    fn test_set_keeps_position_of_existing_key() {
        let mut ctx = Context::new();
        ctx.set("a", 1i64);
        ctx.set("b", 2i64);
        ctx.set("a", 3i64);

        let keys: Vec<&str> = ctx.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(ctx.get("a").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn test_truthiness() {
        let ctx = Context::try_from(json!({
            "null": null,
            "false": false,
            "zero": 0,
            "empty": "",
            "zero_str": "0",
            "list": [],
            "obj": {},
            "yes": "tok",
            "one": 1
        }))
        .unwrap();

        for key in ["null", "false", "zero", "empty", "zero_str", "list", "obj", "absent"] {
            assert!(!ctx.is_truthy(key), "{key} should be falsy");
        }
        assert!(ctx.is_truthy("yes"));
        assert!(ctx.is_truthy("one"));
    }

    #[test]
    fn test_replace_overwrites_and_appends() {
        let mut ctx = Context::try_from(json!({"id": "cus_1", "email": "a@b.c"})).unwrap();
        ctx.replace(Context::try_from(json!({"id": null, "error": "E"})).unwrap());

        assert!(ctx.get_or_null("id").is_null());
        assert_eq!(ctx.get_str("email"), Some("a@b.c"));
        assert_eq!(ctx.get_str("error"), Some("E"));
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Context = [("x", 1i64), ("y", 2i64)].into_iter().collect();
        let b: Context = [("y", 2i64), ("x", 1i64)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_not_empty_names_missing_fields() {
        let ctx = Context::try_from(json!({"customer": "cus_1", "source": ""})).unwrap();
        let err = ctx.validate_not_empty(&["customer", "source", "id"]).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ValidationError(ref msg) if msg.contains("source, id")
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let ctx: Context = serde_json::from_str(r#"{"z": 1, "a": {"m": [true, null]}}"#).unwrap();
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(
            serde_json::to_string(&ctx).unwrap(),
            r#"{"z":1,"a":{"m":[true,null]}}"#
        );
    }

    #[test]
    fn test_serializing_sensitive_content_fails() {
        let mut ctx = Context::new();
        ctx.set("card", SensitiveValue::new("tok_secret"));
        assert!(serde_json::to_string(&ctx).is_err());
        assert_eq!(ctx.get_or_null("card").reveal_str(), Some("tok_secret"));
        assert_eq!(ctx.get_or_null("card").as_str(), None);
    }
}
