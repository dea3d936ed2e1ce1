#![warn(missing_docs)]

//! An in-process emulator of a simulation host.
//!
//! [`HostEmulator`] answers every command the simlink client sends with the ack the real host
//! would send, and keeps enough state (sensors, ad-hoc jobs, shared memory regions, settings)
//! to verify what the client did. [`EmulatorServer`] serves an emulator over TCP.

mod error;
/// The emulated host.
pub mod host;
mod server;

pub use host::{
    AdHocMode, EmulatedSensor, EmulatorOption, HostEmulator, HostRegion, SensorOutput, VslState,
};
pub use server::EmulatorServer;
