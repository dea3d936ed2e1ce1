use simlink_core::message::Message;

use crate::{error::HostError, host::shm::HostRegion, HostEmulator};

impl HostEmulator {
    pub(crate) fn open_shared_memory(&mut self, msg: &Message) -> Result<Message, HostError> {
        let name = msg.field::<String>("name")?;
        let size = msg.field::<usize>("size")?;

        let region = HostRegion::open(&self.option.shm_dir, &name, size)?;
        if self.regions.insert(name.clone(), region).is_some() {
            tracing::debug!("Host remapped {}", name);
        }

        Ok(Message::new("OpenedSharedMemory")
            .with("name", name)
            .with("size", size))
    }

    pub(crate) fn close_shared_memory(&mut self, msg: &Message) -> Result<Message, HostError> {
        let name = msg.field::<String>("name")?;
        if self.regions.remove(&name).is_none() {
            tracing::debug!("Host was asked to close unknown region {}", name);
        }
        Ok(Message::new("ClosedSharedMemory"))
    }
}

#[cfg(test)]
mod tests {
    use crate::EmulatorOption;

    use super::*;

    #[test]
    fn open_close() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("imu"), [0u8; 112])?;
        let mut host = HostEmulator::new(EmulatorOption {
            shm_dir: dir.path().to_path_buf(),
            ..Default::default()
        });

        assert_eq!(
            Some(
                Message::new("OpenedSharedMemory")
                    .with("name", "imu")
                    .with("size", 112)
            ),
            host.handle(
                Message::new("OpenSharedMemory")
                    .with("name", "imu")
                    .with("size", 112)
            )
        );
        assert_eq!(Some(112), host.region("imu").map(HostRegion::size));

        assert_eq!(
            Some(Message::new("ClosedSharedMemory")),
            host.handle(Message::new("CloseSharedMemory").with("name", "imu"))
        );
        assert!(host.region("imu").is_none());
        Ok(())
    }

    #[test]
    fn open_without_backing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut host = HostEmulator::new(EmulatorOption {
            shm_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let ack = host
            .handle(
                Message::new("OpenSharedMemory")
                    .with("name", "imu")
                    .with("size", 112),
            )
            .expect("ack");
        assert_eq!("Error", ack.ty());
        Ok(())
    }
}
