use simlink_core::message::{Message, Value};

use crate::{error::HostError, HostEmulator};

impl HostEmulator {
    pub(crate) fn change_setting(&mut self, msg: &Message) -> Result<Message, HostError> {
        let key = msg.field::<String>("key")?;
        let value = msg.field::<Value>("value")?;
        self.settings.insert(key, value);
        Ok(Message::new("SettingsChanged"))
    }

    pub(crate) fn apply_graphics_setting(&mut self) -> Result<Message, HostError> {
        self.graphics_applied += 1;
        Ok(Message::new("GraphicsSettingApplied"))
    }

    pub(crate) fn set_deterministic(&mut self, deterministic: bool) -> Result<Message, HostError> {
        self.deterministic = deterministic;
        Ok(Message::new(if deterministic {
            "SetPhysicsDeterministic"
        } else {
            "SetPhysicsNonDeterministic"
        }))
    }

    pub(crate) fn fps_limit(&mut self, msg: &Message) -> Result<Message, HostError> {
        self.steps_per_second = Some(msg.field::<i64>("fps")?);
        Ok(Message::new("SetFPSLimit"))
    }

    pub(crate) fn remove_fps_limit(&mut self) -> Result<Message, HostError> {
        self.steps_per_second = None;
        Ok(Message::new("RemovedFPSLimit"))
    }

    pub(crate) fn set_particles_enabled(&mut self, msg: &Message) -> Result<Message, HostError> {
        self.particles = msg.field::<bool>("enabled")?;
        Ok(Message::new("ParticlesSet"))
    }
}
