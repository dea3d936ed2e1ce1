use simlink_core::message::FieldError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub(crate) enum HostError {
    #[error("{0}")]
    Field(#[from] FieldError),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Sensor `{0}` does not exist")]
    UnknownSensor(String),
    #[error("Sensor `{0}` already exists")]
    DuplicateSensor(String),
    #[error("Ad-hoc request {0} does not exist")]
    UnknownRequest(u64),
    #[error("Shared memory `{0}` is not available: {1}")]
    SharedMemory(String, String),
}
