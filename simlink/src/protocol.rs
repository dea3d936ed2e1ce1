use std::collections::BTreeMap;

use simlink_core::message::{FieldError, FromValue, Message, Value};

use crate::error::ProtocolError;

const HOST_ERROR_FIELD: &str = "bngError";

/// Verifies that `ack` answers a command expecting `expected`.
pub(crate) fn check_ack(ack: Message, expected: &str) -> Result<Message, ProtocolError> {
    if let Some(reason) = ack.get(HOST_ERROR_FIELD).and_then(|v| v.as_str()) {
        return Err(ProtocolError::Host(reason.to_owned()));
    }
    if ack.ty() != expected {
        return Err(ProtocolError::UnexpectedAck {
            expected: expected.to_owned(),
            actual: ack.ty().to_owned(),
            reason: None,
        });
    }
    Ok(ack)
}

/// Extracts a field of an ack, reporting a schema mismatch as [`ProtocolError::UnexpectedAck`].
pub(crate) fn field<T: FromValue>(ack: &Message, name: &str) -> Result<T, ProtocolError> {
    ack.field(name).map_err(|e| ProtocolError::malformed(ack, e))
}

pub(crate) fn optional_field<T: FromValue>(
    ack: &Message,
    name: &str,
) -> Result<Option<T>, ProtocolError> {
    ack.optional_field(name)
        .map_err(|e| ProtocolError::malformed(ack, e))
}

/// Extracts an entry of a map carried by `ack`.
pub(crate) fn entry<T: FromValue>(
    ack: &Message,
    map: &BTreeMap<String, Value>,
    name: &str,
) -> Result<T, ProtocolError> {
    let value = map
        .get(name)
        .filter(|v| **v != Value::Nil)
        .ok_or_else(|| ProtocolError::malformed(ack, FieldError::Missing(name.to_owned())))?;
    T::from_value(value).ok_or_else(|| {
        ProtocolError::malformed(
            ack,
            FieldError::WrongType {
                field: name.to_owned(),
                expected: T::EXPECTED,
                actual: value.kind(),
            },
        )
    })
}
