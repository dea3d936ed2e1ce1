use std::time::Duration;

use simlink_core::{
    link::TransportError,
    message::{FieldError, Message, Value},
};
use thiserror::Error;

use crate::{adhoc::RequestId, sensor::Property};

/// An error in the command/ack exchange.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The ack does not match the command.
    #[error("Expected ack `{expected}`, but got `{actual}`{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    UnexpectedAck {
        /// The expected ack type.
        expected: String,
        /// The received ack type.
        actual: String,
        /// What was wrong with an ack of the expected type.
        reason: Option<String>,
    },
    /// No ack arrived in time.
    #[error("Command `{command}` timed out after {timeout:?}")]
    CommandTimeout {
        /// The command type.
        command: String,
        /// The timeout waited for.
        timeout: Duration,
    },
    /// The host failed to execute the command.
    #[error("Host error: {0}")]
    Host(String),
    /// The host speaks another protocol version.
    #[error("Protocol version mismatch: client speaks {expected}, host speaks {actual}")]
    VersionMismatch {
        /// The version of this client.
        expected: String,
        /// The version of the host.
        actual: String,
    },
}

impl ProtocolError {
    pub(crate) fn malformed(ack: &Message, e: FieldError) -> Self {
        Self::UnexpectedAck {
            expected: ack.ty().to_owned(),
            actual: ack.ty().to_owned(),
            reason: Some(e.to_string()),
        }
    }
}

/// An error in the ad-hoc poll lifecycle.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum PollError {
    /// The request id is unknown or was already collected.
    #[error("Ad-hoc request {0} is unknown or already collected")]
    UnknownRequest(RequestId),
    /// The sensor already has as many uncollected requests as it allows.
    #[error("Sensor `{sensor}` already has {limit} pending ad-hoc requests")]
    TooManyPending {
        /// The sensor name.
        sensor: String,
        /// The limit.
        limit: u32,
    },
    /// The host has not finished the request.
    #[error("Ad-hoc request {0} is not ready")]
    NotReady(RequestId),
    /// The sensor is not attached on this connection.
    #[error("Sensor `{0}` is not attached")]
    UnknownSensor(String),
}

/// An error in sensor configuration.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The host refused a property value and kept the previous one.
    #[error("Host rejected {property} = {value}: {reason}")]
    RejectedConfiguration {
        /// The property.
        property: Property,
        /// The refused value.
        value: Value,
        /// The host's explanation.
        reason: String,
    },
}

/// An error of a shared memory region.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum SharedMemoryError {
    /// Creating, mapping or removing the backing file failed.
    #[error("Shared memory I/O error: {0}")]
    Io(String),
    /// A region with the name is already open on the connection.
    #[error("Shared memory `{0}` is already in use")]
    NameInUse(String),
    /// The name is not a plain file name component.
    #[error("Shared memory name `{0}` must be a plain file name")]
    InvalidName(String),
    /// The region was released.
    #[error("Shared memory `{0}` was released")]
    Released(String),
}

impl From<std::io::Error> for SharedMemoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// An error of a [`Connection`](crate::Connection) operation.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum SimError {
    #[allow(missing_docs)]
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[allow(missing_docs)]
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
    #[allow(missing_docs)]
    #[error("{0}")]
    Poll(#[from] PollError),
    #[allow(missing_docs)]
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
    #[allow(missing_docs)]
    #[error("{0}")]
    SharedMemory(#[from] SharedMemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[test]
    #[case(
        "Expected ack `OpenedSensor`, but got `PolledSensor`",
        ProtocolError::UnexpectedAck { expected: "OpenedSensor".to_owned(), actual: "PolledSensor".to_owned(), reason: None }
    )]
    #[case(
        "Expected ack `PolledSensor`, but got `PolledSensor`: missing field `data`",
        ProtocolError::malformed(&Message::new("PolledSensor"), FieldError::Missing("data".to_owned()))
    )]
    #[case(
        "Command `PollSensor` timed out after 5s",
        ProtocolError::CommandTimeout { command: "PollSensor".to_owned(), timeout: Duration::from_secs(5) }
    )]
    fn protocol_error_display(#[case] expect: &str, #[case] err: ProtocolError) {
        assert_eq!(expect, err.to_string());
    }

    #[test]
    fn rejected_configuration_display() {
        let err = ConfigurationError::RejectedConfiguration {
            property: Property::UpdatePriority,
            value: Value::Float(1.5),
            reason: "out of range".to_owned(),
        };
        assert_eq!("Host rejected UpdatePriority = 1.5: out of range", err.to_string());
    }

    #[test]
    fn sim_error_from() {
        assert_eq!(
            SimError::Poll(PollError::NotReady(RequestId::new(3))),
            PollError::NotReady(RequestId::new(3)).into()
        );
        assert_eq!(
            "Connection is closed",
            SimError::from(TransportError::ConnectionClosed).to_string()
        );
    }
}
