mod emulator;
mod operation;
mod sensor;
mod shm;

pub use emulator::{AdHocMode, EmulatorOption, HostEmulator, VslState};
pub use sensor::{EmulatedSensor, SensorOutput};
pub use shm::HostRegion;
