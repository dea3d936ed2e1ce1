use std::collections::BTreeMap;

use simlink_core::{
    link::Link,
    message::{Message, Value},
};

use crate::{error::SimError, protocol, Connection};

use super::{AdHocPollable, Configurable, Pollable, Sensor, SensorConfig, SensorHandle};

/// A reading of an [`Ultrasonic`] sensor, in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UltrasonicReading {
    /// The distance to the closest hit.
    pub distance: f64,
    /// The near end of the detection window.
    pub window_min: f64,
    /// The far end of the detection window.
    pub window_max: f64,
}

/// A distance sensor returning a small reading inline.
pub struct Ultrasonic<'a, L: Link> {
    connection: &'a Connection<L>,
    handle: SensorHandle,
}

impl<'a, L: Link> Ultrasonic<'a, L> {
    /// The sensor type name on the host.
    pub const KIND: &'static str = "Ultrasonic";

    /// Attaches an ultrasonic sensor `name` to entity `vid`.
    pub fn open(
        connection: &'a Connection<L>,
        name: &str,
        vid: &str,
        config: SensorConfig,
    ) -> Result<Self, SimError> {
        let handle = connection.attach_sensor(name, vid, Self::KIND, config, Vec::new())?;
        Ok(Self { connection, handle })
    }

    /// Detaches the sensor. Its uncollected ad-hoc requests are discarded.
    pub fn remove(self) -> Result<(), SimError> {
        self.connection.detach_sensor(&self.handle)
    }
}

impl<L: Link> Sensor for Ultrasonic<'_, L> {
    type Link = L;

    fn handle(&self) -> &SensorHandle {
        &self.handle
    }

    fn connection(&self) -> &Connection<L> {
        self.connection
    }
}

impl<L: Link> Pollable for Ultrasonic<'_, L> {
    type Reading = UltrasonicReading;

    fn decode(&self, ack: &Message) -> Result<UltrasonicReading, SimError> {
        let data = protocol::field::<BTreeMap<String, Value>>(ack, "data")?;
        Ok(UltrasonicReading {
            distance: protocol::entry(ack, &data, "distance")?,
            window_min: protocol::entry(ack, &data, "windowMin")?,
            window_max: protocol::entry(ack, &data, "windowMax")?,
        })
    }
}

impl<L: Link> AdHocPollable for Ultrasonic<'_, L> {}

impl<L: Link> Configurable for Ultrasonic<'_, L> {}
