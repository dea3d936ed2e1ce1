use std::time::Duration;

use super::TransportError;
use crate::message::Message;

/// A trait that provides the interface with the simulation host.
///
/// A link moves whole [`Message`]s; framing is the link's concern.
pub trait Link: Send {
    /// Sends a message to the host.
    fn send(&mut self, msg: &Message) -> Result<(), TransportError>;

    /// Blocks until the next message from the host arrives or `timeout` elapses.
    fn receive(&mut self, timeout: Duration) -> Result<Message, TransportError>;

    /// Closes the link.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Checks if the link is open.
    #[must_use]
    fn is_open(&self) -> bool;

    /// Ensures the link is open.
    fn ensure_is_open(&self) -> Result<(), TransportError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }

    /// A description of the remote end, used in diagnostics.
    fn endpoint(&self) -> String {
        String::from("in-process")
    }
}

impl Link for Box<dyn Link> {
    fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        self.as_mut().send(msg)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Message, TransportError> {
        self.as_mut().receive(timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.as_mut().close()
    }

    fn is_open(&self) -> bool {
        self.as_ref().is_open()
    }

    fn ensure_is_open(&self) -> Result<(), TransportError> {
        self.as_ref().ensure_is_open()
    }

    fn endpoint(&self) -> String {
        self.as_ref().endpoint()
    }
}
