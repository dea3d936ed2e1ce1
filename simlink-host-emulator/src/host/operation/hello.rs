use simlink_core::message::Message;

use crate::{error::HostError, HostEmulator};

impl HostEmulator {
    pub(crate) fn hello(&mut self, msg: &Message) -> Result<Message, HostError> {
        let version = msg.field::<String>("protocolVersion")?;
        tracing::info!(
            "Client speaks {}, host speaks {}",
            version,
            self.option.protocol_version
        );
        Ok(Message::new("Hello").with("protocolVersion", self.option.protocol_version.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::EmulatorOption;

    use super::*;

    #[test]
    fn answers_own_version() {
        let mut host = HostEmulator::new(EmulatorOption {
            protocol_version: "v9".to_owned(),
            ..Default::default()
        });
        assert_eq!(
            Some(Message::new("Hello").with("protocolVersion", "v9")),
            host.handle(Message::new("Hello").with("protocolVersion", "v1.4"))
        );
    }

    #[test]
    fn missing_version() {
        let mut host = HostEmulator::default();
        let ack = host.handle(Message::new("Hello")).expect("ack");
        assert_eq!("Error", ack.ty());
    }
}
