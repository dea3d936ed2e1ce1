use simlink_core::{
    link::Link,
    message::{Message, Value},
};

use crate::{error::SimError, Connection};

/// Simulator-wide settings.
///
/// # Examples
///
/// ```
/// # use simlink::prelude::*;
/// # use simlink_host_emulator::EmulatorOption;
/// # fn main() -> Result<(), SimError> {
/// let connection = Connection::open(Audit::new(EmulatorOption::default()), ConnectionOption::default())?;
///
/// let settings = connection.settings();
/// settings.set_deterministic()?;
/// settings.set_steps_per_second(60)?;
/// # Ok(())
/// # }
/// ```
pub struct Settings<'a, L: Link> {
    connection: &'a Connection<L>,
}

impl<L: Link> Connection<L> {
    /// The simulator settings API.
    #[must_use]
    pub const fn settings(&self) -> Settings<'_, L> {
        Settings { connection: self }
    }
}

impl<L: Link> Settings<'_, L> {
    /// Changes a setting. Graphics settings take effect after [`apply_graphics_setting`].
    ///
    /// [`apply_graphics_setting`]: Self::apply_graphics_setting
    pub fn change_setting(&self, key: &str, value: impl Into<Value>) -> Result<(), SimError> {
        self.connection.call(
            Message::new("ChangeSetting")
                .with("key", key)
                .with("value", value),
            "SettingsChanged",
        )?;
        Ok(())
    }

    /// Applies changed graphics settings.
    pub fn apply_graphics_setting(&self) -> Result<(), SimError> {
        self.connection
            .call(Message::new("ApplyGraphicsSetting"), "GraphicsSettingApplied")?;
        Ok(())
    }

    /// Runs physics in lock step with the client.
    pub fn set_deterministic(&self) -> Result<(), SimError> {
        self.connection.call(
            Message::new("SetPhysicsDeterministic"),
            "SetPhysicsDeterministic",
        )?;
        Ok(())
    }

    /// Runs physics in real time.
    pub fn set_nondeterministic(&self) -> Result<(), SimError> {
        self.connection.call(
            Message::new("SetPhysicsNonDeterministic"),
            "SetPhysicsNonDeterministic",
        )?;
        Ok(())
    }

    /// Limits the simulation to `sps` steps per second.
    pub fn set_steps_per_second(&self, sps: u32) -> Result<(), SimError> {
        self.connection
            .call(Message::new("FPSLimit").with("fps", sps), "SetFPSLimit")?;
        Ok(())
    }

    /// Removes the step limit.
    pub fn remove_step_limit(&self) -> Result<(), SimError> {
        self.connection
            .call(Message::new("RemoveFPSLimit"), "RemovedFPSLimit")?;
        Ok(())
    }

    /// Enables or disables particles.
    pub fn set_particles_enabled(&self, enabled: bool) -> Result<(), SimError> {
        self.connection.call(
            Message::new("ParticlesEnabled").with("enabled", enabled),
            "ParticlesSet",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use simlink_host_emulator::EmulatorOption;

    use crate::{link::Audit, ConnectionOption};

    use super::*;

    #[test]
    fn settings() -> anyhow::Result<()> {
        let connection = Connection::open(
            Audit::new(EmulatorOption::default()),
            ConnectionOption::default(),
        )?;
        let settings = connection.settings();

        settings.change_setting("GraphicDisplayModes", "Fullscreen")?;
        settings.apply_graphics_setting()?;
        settings.set_deterministic()?;
        settings.set_steps_per_second(60)?;
        settings.set_particles_enabled(false)?;

        connection.with_link(|host| {
            assert_eq!(
                Some(&Value::from("Fullscreen")),
                host.setting("GraphicDisplayModes")
            );
            assert_eq!(1, host.graphics_applied());
            assert!(host.is_deterministic());
            assert_eq!(Some(60), host.steps_per_second());
            assert!(!host.particles_enabled());
        });

        settings.set_nondeterministic()?;
        settings.remove_step_limit()?;
        connection.with_link(|host| {
            assert!(!host.is_deterministic());
            assert_eq!(None, host.steps_per_second());
        });
        Ok(())
    }
}
