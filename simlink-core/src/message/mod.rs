mod error;
mod value;

use std::{collections::BTreeMap, fmt};

use serde::{
    de::{Error as _, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

pub use error::FieldError;
pub use value::Value;

const TYPE_KEY: &str = "type";

/// A self-describing unit exchanged with the host: a type tag plus named fields.
///
/// On the wire a message is a single map whose `type` entry holds the tag.
///
/// # Examples
///
/// ```
/// use simlink_core::message::Message;
///
/// let msg = Message::new("ChangeSetting")
///     .with("key", "GraphicDisplayModes")
///     .with("value", "Fullscreen");
/// assert_eq!("ChangeSetting", msg.ty());
/// assert_eq!(Ok("Fullscreen".to_owned()), msg.field::<String>("value"));
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Message {
    ty: String,
    fields: BTreeMap<String, Value>,
}

impl Message {
    /// Creates a message of the given type without fields.
    #[must_use]
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field and returns the message.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing any previous value.
    ///
    /// A field named `type` is ignored. The type tag is fixed by [`Message::new`].
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name != TYPE_KEY {
            self.fields.insert(name, value.into());
        }
    }

    /// The type tag of the message.
    #[must_use]
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// All fields, ordered by name.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns `true` if the field exists and is not nil.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| *v != Value::Nil)
    }

    /// Extracts a typed field.
    pub fn field<T: FromValue>(&self, name: &str) -> Result<T, FieldError> {
        let value = self
            .get(name)
            .filter(|v| **v != Value::Nil)
            .ok_or_else(|| FieldError::Missing(name.to_owned()))?;
        T::from_value(value).ok_or_else(|| FieldError::WrongType {
            field: name.to_owned(),
            expected: T::EXPECTED,
            actual: value.kind(),
        })
    }

    /// Extracts a typed field that may be absent.
    pub fn optional_field<T: FromValue>(&self, name: &str) -> Result<Option<T>, FieldError> {
        if self.contains(name) {
            self.field(name).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        if !self.fields.is_empty() {
            write!(f, " {}", Value::Map(self.fields.clone()))?;
        }
        Ok(())
    }
}

/// A type that can be extracted from a [`Value`].
pub trait FromValue: Sized {
    /// The name of the expected wire type, used in [`FieldError::WrongType`].
    const EXPECTED: &'static str;

    /// Converts the value, or returns `None` if the type does not match.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for u64 {
    const EXPECTED: &'static str = "non-negative int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| u64::try_from(v).ok())
    }
}

impl FromValue for u32 {
    const EXPECTED: &'static str = "non-negative int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| u32::try_from(v).ok())
    }
}

impl FromValue for usize {
    const EXPECTED: &'static str = "non-negative int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| usize::try_from(v).ok())
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "number";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(ToOwned::to_owned)
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "binary";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bytes().map(ToOwned::to_owned)
    }
}

impl FromValue for BTreeMap<String, Value> {
    const EXPECTED: &'static str = "map";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_map().cloned()
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(TYPE_KEY, &self.ty)?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct MessageVisitor;

impl<'de> Visitor<'de> for MessageVisitor {
    type Value = Message;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map with a string `type` entry")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Message, A::Error> {
        let mut ty = None;
        let mut fields = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            if key == TYPE_KEY {
                match map.next_value::<Value>()? {
                    Value::Str(s) => ty = Some(s),
                    other => {
                        return Err(A::Error::custom(format!(
                            "`type` must be a string, but got {}",
                            other.kind()
                        )))
                    }
                }
            } else {
                fields.insert(key, map.next_value()?);
            }
        }
        let ty = ty.ok_or_else(|| A::Error::missing_field(TYPE_KEY))?;
        Ok(Message { ty, fields })
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MessageVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_is_ignored() {
        let msg = Message::new("ChangeSetting")
            .with("type", "x")
            .with("key", "k");
        assert_eq!("ChangeSetting", msg.ty());
        assert_eq!(None, msg.get("type"));
        assert_eq!(1, msg.fields().len());
    }

    #[test]
    fn field() {
        let msg = Message::new("PolledSensor")
            .with("distance", 2.5)
            .with("samples", 3)
            .with("name", "us1")
            .with("empty", Value::Nil);

        assert_eq!(Ok(2.5), msg.field::<f64>("distance"));
        assert_eq!(Ok(3.0), msg.field::<f64>("samples"));
        assert_eq!(Ok(3u32), msg.field::<u32>("samples"));
        assert_eq!(
            Err(FieldError::Missing("missing".to_owned())),
            msg.field::<f64>("missing")
        );
        assert_eq!(
            Err(FieldError::Missing("empty".to_owned())),
            msg.field::<f64>("empty")
        );
        assert_eq!(
            Err(FieldError::WrongType {
                field: "name".to_owned(),
                expected: "number",
                actual: "string",
            }),
            msg.field::<f64>("name")
        );
    }

    #[rstest::rstest]
    #[test]
    #[case(Ok(None), Value::Nil)]
    #[case(Ok(Some(true)), Value::Bool(true))]
    #[case(Err(FieldError::WrongType { field: "f".to_owned(), expected: "bool", actual: "int" }), Value::Int(1))]
    fn optional_field(#[case] expect: Result<Option<bool>, FieldError>, #[case] value: Value) {
        let msg = Message::new("T").with("f", value);
        assert_eq!(expect, msg.optional_field::<bool>("f"));
    }

    #[test]
    fn negative_int_is_not_unsigned() {
        let msg = Message::new("T").with("n", -1);
        assert_eq!(
            Err(FieldError::WrongType {
                field: "n".to_owned(),
                expected: "non-negative int",
                actual: "int",
            }),
            msg.field::<u32>("n")
        );
    }

    #[test]
    fn wire_layout_is_a_flat_map() -> anyhow::Result<()> {
        let msg = Message::new("Hello").with("protocolVersion", "v1");
        let bytes = rmp_serde::to_vec(&msg)?;

        let raw: BTreeMap<String, Value> = rmp_serde::from_slice(&bytes)?;
        assert_eq!(Some(&Value::from("Hello")), raw.get("type"));
        assert_eq!(Some(&Value::from("v1")), raw.get("protocolVersion"));

        assert_eq!(msg, rmp_serde::from_slice::<Message>(&bytes)?);
        Ok(())
    }

    #[test]
    fn missing_type_is_rejected() -> anyhow::Result<()> {
        let raw = BTreeMap::from([("name".to_owned(), Value::from("x"))]);
        let bytes = rmp_serde::to_vec(&raw)?;
        assert!(rmp_serde::from_slice::<Message>(&bytes).is_err());
        Ok(())
    }

    #[test]
    fn display() {
        assert_eq!("Hello", Message::new("Hello").to_string());
        assert_eq!(
            "FPSLimit {fps: 60}",
            Message::new("FPSLimit").with("fps", 60).to_string()
        );
    }
}
