use simlink_core::{link::Link, message::Message};

use crate::{error::SimError, Connection};

const DEFAULT_OPTIONS_FILE: &str = "template.json";

/// In-game logging of one entity.
pub struct VehicleLogging<'a, L: Link> {
    connection: &'a Connection<L>,
    vid: String,
}

impl<L: Link> Connection<L> {
    /// The in-game logging API of entity `vid`.
    #[must_use]
    pub fn logging(&self, vid: impl Into<String>) -> VehicleLogging<'_, L> {
        VehicleLogging {
            connection: self,
            vid: vid.into(),
        }
    }
}

impl<L: Link> VehicleLogging<'_, L> {
    /// The entity being logged.
    #[must_use]
    pub fn vid(&self) -> &str {
        &self.vid
    }

    /// Applies logging options from a JSON file on the host.
    pub fn set_options_from_json(&self, file_name: &str) -> Result<(), SimError> {
        self.call(
            Message::new("ApplyVSLSettingsFromJSON").with("fileName", file_name),
            "AppliedVSLSettings",
        )
    }

    /// Writes the current logging options to a JSON file on the host, `template.json` if `None`.
    pub fn write_options_to_json(&self, file_name: Option<&str>) -> Result<(), SimError> {
        self.call(
            Message::new("WriteVSLSettingsToJSON")
                .with("fileName", file_name.unwrap_or(DEFAULT_OPTIONS_FILE)),
            "WroteVSLSettingsToJSON",
        )
    }

    /// Starts logging into `output_dir` on the host.
    pub fn start(&self, output_dir: &str) -> Result<(), SimError> {
        self.call(
            Message::new("StartVSLLogging").with("outputDir", output_dir),
            "StartedVSLLogging",
        )?;
        tracing::info!("Started logging {} into {}", self.vid, output_dir);
        Ok(())
    }

    /// Stops logging.
    pub fn stop(&self) -> Result<(), SimError> {
        self.call(Message::new("StopVSLLogging"), "StoppedVSLLogging")?;
        tracing::info!("Stopped logging {}", self.vid);
        Ok(())
    }

    fn call(&self, command: Message, expected: &str) -> Result<(), SimError> {
        self.connection
            .call(command.with("vid", self.vid.as_str()), expected)?;
        Ok(())
    }
}
