use simlink_core::message::Message;

use crate::{error::HostError, host::emulator::VslState, HostEmulator};

impl HostEmulator {
    fn vsl_mut(&mut self, msg: &Message) -> Result<&mut VslState, HostError> {
        let vid = msg.field::<String>("vid")?;
        Ok(self.vsl.entry(vid).or_default())
    }

    pub(crate) fn apply_vsl_settings(&mut self, msg: &Message) -> Result<Message, HostError> {
        let file_name = msg.field::<String>("fileName")?;
        self.vsl_mut(msg)?.options_file = Some(file_name);
        Ok(Message::new("AppliedVSLSettings"))
    }

    pub(crate) fn write_vsl_settings(&mut self, msg: &Message) -> Result<Message, HostError> {
        let file_name = msg.field::<String>("fileName")?;
        self.vsl_mut(msg)?.written_file = Some(file_name);
        Ok(Message::new("WroteVSLSettingsToJSON"))
    }

    pub(crate) fn start_vsl_logging(&mut self, msg: &Message) -> Result<Message, HostError> {
        let output_dir = msg.field::<String>("outputDir")?;
        let state = self.vsl_mut(msg)?;
        state.output_dir = Some(output_dir);
        state.logging = true;
        Ok(Message::new("StartedVSLLogging"))
    }

    pub(crate) fn stop_vsl_logging(&mut self, msg: &Message) -> Result<Message, HostError> {
        self.vsl_mut(msg)?.logging = false;
        Ok(Message::new("StoppedVSLLogging"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session() {
        let mut host = HostEmulator::default();
        assert_eq!(
            Some(Message::new("StartedVSLLogging")),
            host.handle(
                Message::new("StartVSLLogging")
                    .with("vid", "ego")
                    .with("outputDir", "run1")
            )
        );
        let state = host.vsl("ego").expect("state");
        assert!(state.logging());
        assert_eq!(&Some("run1".to_owned()), state.output_dir());

        assert_eq!(
            Some(Message::new("StoppedVSLLogging")),
            host.handle(Message::new("StopVSLLogging").with("vid", "ego"))
        );
        assert!(!host.vsl("ego").expect("state").logging());
        assert!(host.vsl("other").is_none());
    }

    #[test]
    fn missing_vid() {
        let mut host = HostEmulator::default();
        let ack = host
            .handle(Message::new("ApplyVSLSettingsFromJSON").with("fileName", "a.json"))
            .expect("ack");
        assert_eq!("Error", ack.ty());
    }
}
