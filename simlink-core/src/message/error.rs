use thiserror::Error;

/// An error produced when a field of a [`Message`] does not match the expected schema.
///
/// [`Message`]: super::Message
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum FieldError {
    /// The field is absent.
    #[error("missing field `{0}`")]
    Missing(String),
    /// The field is present but holds a value of another type.
    #[error("field `{field}` must be {expected}, but got {actual}")]
    WrongType {
        /// The name of the field.
        field: String,
        /// The expected type.
        expected: &'static str,
        /// The type found on the wire.
        actual: &'static str,
    },
}
