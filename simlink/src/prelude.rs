pub use crate::{
    api::{Settings, VehicleLogging},
    error::{ConfigurationError, PollError, ProtocolError, SharedMemoryError, SimError},
    sensor::{
        AdHocPollable, AdvancedImu, Configurable, ImuSample, Pollable, Property, Sensor,
        SensorConfig, SensorHandle, SensorId, Ultrasonic, UltrasonicReading, IMU_SAMPLE_SIZE,
    },
    Connection, ConnectionOption, RequestId, RequestState, SharedMemoryHandle,
};

pub use simlink_core::{
    link::{Link, TransportError},
    message::{Message, Value},
};

#[cfg(feature = "link-audit")]
pub use crate::link::Audit;
