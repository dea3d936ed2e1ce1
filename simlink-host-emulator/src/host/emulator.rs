use std::{
    collections::{BTreeMap, VecDeque},
    path::PathBuf,
};

use getset::{CopyGetters, Getters};
use simlink_core::{defined::PROTOCOL_VERSION, message::Message, message::Value};

use crate::error::HostError;

use super::{sensor::EmulatedSensor, shm::HostRegion};

/// How the host completes ad-hoc poll requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdHocMode {
    /// Requests stay pending until [`HostEmulator::mark_ready`] is called.
    #[default]
    Manual,
    /// Requests are ready as soon as they are started.
    Immediate,
}

/// Options for [`HostEmulator`].
#[derive(Clone, Debug, PartialEq)]
pub struct EmulatorOption {
    /// The directory the client creates shared memory regions in.
    pub shm_dir: PathBuf,
    /// The protocol version answered to `Hello`.
    pub protocol_version: String,
    /// The id assigned to the first ad-hoc request.
    pub first_request_id: u64,
    /// How ad-hoc requests are completed.
    pub adhoc_mode: AdHocMode,
}

impl Default for EmulatorOption {
    fn default() -> Self {
        Self {
            shm_dir: std::env::temp_dir(),
            protocol_version: PROTOCOL_VERSION.to_owned(),
            first_request_id: 1,
            adhoc_mode: AdHocMode::Manual,
        }
    }
}

/// The in-game logging state of one entity.
#[derive(Clone, Debug, Default, PartialEq, Getters, CopyGetters)]
pub struct VslState {
    #[getset(get = "pub")]
    /// The last options file applied.
    pub(crate) options_file: Option<String>,
    #[getset(get = "pub")]
    /// The last file the options were written to.
    pub(crate) written_file: Option<String>,
    #[getset(get = "pub")]
    /// The output directory of the running or last session.
    pub(crate) output_dir: Option<String>,
    #[getset(get_copy = "pub")]
    /// Whether logging is running.
    pub(crate) logging: bool,
}

pub(crate) type SensorKey = (String, String);

pub(crate) struct AdHocJob {
    pub(crate) sensor: SensorKey,
    pub(crate) ready: bool,
}

/// An in-process model of the host's command handlers.
pub struct HostEmulator {
    pub(crate) option: EmulatorOption,
    pub(crate) sensors: BTreeMap<SensorKey, EmulatedSensor>,
    pub(crate) jobs: BTreeMap<u64, AdHocJob>,
    pub(crate) next_request_id: u64,
    pub(crate) regions: BTreeMap<String, HostRegion>,
    pub(crate) settings: BTreeMap<String, Value>,
    pub(crate) graphics_applied: usize,
    pub(crate) deterministic: bool,
    pub(crate) steps_per_second: Option<i64>,
    pub(crate) particles: bool,
    pub(crate) vsl: BTreeMap<String, VslState>,
    override_next_ack: Option<Message>,
    stalled: bool,
    held: VecDeque<Message>,
    received: Vec<Message>,
}

impl HostEmulator {
    /// Creates an emulator with no sensors and no regions.
    #[must_use]
    pub fn new(option: EmulatorOption) -> Self {
        Self {
            next_request_id: option.first_request_id,
            option,
            sensors: BTreeMap::new(),
            jobs: BTreeMap::new(),
            regions: BTreeMap::new(),
            settings: BTreeMap::new(),
            graphics_applied: 0,
            deterministic: false,
            steps_per_second: None,
            particles: true,
            vsl: BTreeMap::new(),
            override_next_ack: None,
            stalled: false,
            held: VecDeque::new(),
            received: Vec::new(),
        }
    }

    /// Handles one command and returns its ack, or `None` if the host is stalled.
    ///
    /// The ack of a command handled while stalled is held until [`Self::take_held_acks`].
    ///
    /// A command that fails is answered with an `Error` ack carrying a `bngError` field.
    pub fn handle(&mut self, msg: Message) -> Option<Message> {
        tracing::trace!("Host received {}", msg);
        let res = self.dispatch(&msg);
        self.received.push(msg);

        let ack = res.unwrap_or_else(|e| {
            tracing::debug!("Host rejected command: {}", e);
            Message::new("Error").with("bngError", e.to_string())
        });
        let ack = self.override_next_ack.take().unwrap_or(ack);
        if self.stalled {
            self.held.push_back(ack);
            return None;
        }
        Some(ack)
    }

    fn dispatch(&mut self, msg: &Message) -> Result<Message, HostError> {
        match msg.ty() {
            "Hello" => self.hello(msg),
            "OpenSensor" => self.open_sensor(msg),
            "CloseSensor" => self.close_sensor(msg),
            "PollSensor" => self.poll_sensor(msg),
            "StartAdHocPoll" => self.start_ad_hoc_poll(msg),
            "IsAdHocPollRequestReady" => self.is_ad_hoc_poll_request_ready(msg),
            "CollectAdHocPollRequest" => self.collect_ad_hoc_poll_request(msg),
            "OpenSharedMemory" => self.open_shared_memory(msg),
            "CloseSharedMemory" => self.close_shared_memory(msg),
            "ChangeSetting" => self.change_setting(msg),
            "ApplyGraphicsSetting" => self.apply_graphics_setting(),
            "SetPhysicsDeterministic" => self.set_deterministic(true),
            "SetPhysicsNonDeterministic" => self.set_deterministic(false),
            "FPSLimit" => self.fps_limit(msg),
            "RemoveFPSLimit" => self.remove_fps_limit(),
            "ParticlesEnabled" => self.set_particles_enabled(msg),
            "ApplyVSLSettingsFromJSON" => self.apply_vsl_settings(msg),
            "WriteVSLSettingsToJSON" => self.write_vsl_settings(msg),
            "StartVSLLogging" => self.start_vsl_logging(msg),
            "StopVSLLogging" => self.stop_vsl_logging(msg),
            ty => {
                if let Some(property) = ty.strip_prefix("GetSensor") {
                    self.get_sensor_property(property, msg)
                } else if let Some(property) = ty.strip_prefix("SetSensor") {
                    self.set_sensor_property(property, msg)
                } else {
                    Err(HostError::UnknownCommand(ty.to_owned()))
                }
            }
        }
    }

    /// Completes a pending ad-hoc request. Returns `false` if the request does not exist.
    pub fn mark_ready(&mut self, request_id: u64) -> bool {
        self.jobs
            .get_mut(&request_id)
            .map(|job| job.ready = true)
            .is_some()
    }

    /// Sets the id assigned to the next ad-hoc request.
    pub fn set_next_request_id(&mut self, request_id: u64) {
        self.next_request_id = request_id;
    }

    /// Replaces the ack of the next command. The command itself is still applied.
    pub fn override_next_ack(&mut self, ack: Message) {
        self.override_next_ack = Some(ack);
    }

    /// Stops or resumes answering commands. Commands received while stalled are still applied.
    pub fn stall(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Takes the acks held while stalled, oldest first. Empty while the host is still stalled.
    pub fn take_held_acks(&mut self) -> Vec<Message> {
        if self.stalled {
            return Vec::new();
        }
        self.held.drain(..).collect()
    }

    /// Returns `true` if the host does not answer.
    #[must_use]
    pub const fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Every command received so far, in order.
    #[must_use]
    pub fn received(&self) -> &[Message] {
        &self.received
    }

    /// The options the emulator was created with.
    #[must_use]
    pub const fn option(&self) -> &EmulatorOption {
        &self.option
    }

    /// Returns the sensor `name` attached to `vid`.
    #[must_use]
    pub fn sensor(&self, vid: &str, name: &str) -> Option<&EmulatedSensor> {
        self.sensors.get(&(vid.to_owned(), name.to_owned()))
    }

    /// Returns the sensor `name` attached to `vid`.
    pub fn sensor_mut(&mut self, vid: &str, name: &str) -> Option<&mut EmulatedSensor> {
        self.sensors.get_mut(&(vid.to_owned(), name.to_owned()))
    }

    /// The number of attached sensors.
    #[must_use]
    pub fn num_sensors(&self) -> usize {
        self.sensors.len()
    }

    /// The ids of every uncollected ad-hoc request.
    pub fn pending_requests(&self) -> impl Iterator<Item = u64> + '_ {
        self.jobs.keys().copied()
    }

    /// The number of mapped shared memory regions.
    #[must_use]
    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    /// Returns the shared memory region `name`.
    #[must_use]
    pub fn region(&self, name: &str) -> Option<&HostRegion> {
        self.regions.get(name)
    }

    /// Returns the shared memory region `name`.
    pub fn region_mut(&mut self, name: &str) -> Option<&mut HostRegion> {
        self.regions.get_mut(name)
    }

    /// Returns the value of a setting changed through `ChangeSetting`.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// How many times graphics settings were applied.
    #[must_use]
    pub const fn graphics_applied(&self) -> usize {
        self.graphics_applied
    }

    /// Whether physics run deterministically.
    #[must_use]
    pub const fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// The step limit, if any.
    #[must_use]
    pub const fn steps_per_second(&self) -> Option<i64> {
        self.steps_per_second
    }

    /// Whether particles are enabled.
    #[must_use]
    pub const fn particles_enabled(&self) -> bool {
        self.particles
    }

    /// The in-game logging state of `vid`.
    #[must_use]
    pub fn vsl(&self, vid: &str) -> Option<&VslState> {
        self.vsl.get(vid)
    }
}

impl Default for HostEmulator {
    fn default() -> Self {
        Self::new(EmulatorOption::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_answered_with_error() {
        let mut host = HostEmulator::default();
        let ack = host.handle(Message::new("Teleport")).expect("ack");
        assert_eq!("Error", ack.ty());
        assert_eq!(
            Ok("Unknown command: Teleport".to_owned()),
            ack.field::<String>("bngError")
        );
        assert_eq!(&[Message::new("Teleport")], host.received());
    }

    #[test]
    fn stalled_host_holds_acks() {
        let mut host = HostEmulator::default();
        host.stall(true);
        assert!(host.is_stalled());
        assert_eq!(None, host.handle(Message::new("FPSLimit").with("fps", 30)));
        assert_eq!(Some(30), host.steps_per_second());

        assert!(host.take_held_acks().is_empty());

        host.stall(false);
        assert_eq!(vec![Message::new("SetFPSLimit")], host.take_held_acks());
        assert!(host.take_held_acks().is_empty());
        assert_eq!(
            Some(Message::new("RemovedFPSLimit")),
            host.handle(Message::new("RemoveFPSLimit"))
        );
    }

    #[test]
    fn override_applies_once() {
        let mut host = HostEmulator::default();
        host.override_next_ack(Message::new("Bogus"));
        assert_eq!(
            Some(Message::new("Bogus")),
            host.handle(Message::new("ParticlesEnabled").with("enabled", false))
        );
        assert!(!host.particles_enabled());
        assert_eq!(
            Some(Message::new("ParticlesSet")),
            host.handle(Message::new("ParticlesEnabled").with("enabled", true))
        );
    }

    #[test]
    fn mark_ready_unknown_request() {
        let mut host = HostEmulator::default();
        assert!(!host.mark_ready(1));
    }
}
