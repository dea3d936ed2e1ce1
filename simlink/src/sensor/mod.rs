mod advanced_imu;
mod ultrasonic;

use derive_more::Display;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use simlink_core::{
    link::Link,
    message::{Message, Value},
};

use crate::{
    adhoc::RequestId,
    connection::SensorEntry,
    error::{ConfigurationError, PollError, SimError},
    protocol, Connection,
};

pub use advanced_imu::{AdvancedImu, ImuSample, IMU_SAMPLE_SIZE};
pub use ultrasonic::{Ultrasonic, UltrasonicReading};

/// Identifies an attached sensor on its connection.
///
/// A sensor re-attached under the same name gets a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct SensorId(u64);

impl SensorId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// The configuration a sensor is attached with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Seconds between two readings computed by the host. A non-positive value disables the
    /// sensor: polls succeed and return zeros.
    pub requested_update_time: f64,
    /// The priority of the sensor in `[0, 1]`. `0` is the highest.
    pub update_priority: f64,
    /// Whether the host draws the sensor.
    pub is_visualised: bool,
    /// The maximum number of uncollected ad-hoc requests.
    pub max_pending_requests: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            requested_update_time: 0.1,
            update_priority: 0.0,
            is_visualised: true,
            max_pending_requests: 10,
        }
    }
}

/// A sensor attached to an entity.
#[derive(Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct SensorHandle {
    #[getset(get_copy = "pub")]
    /// The id on the connection.
    id: SensorId,
    #[getset(get = "pub")]
    /// The sensor name, unique per entity.
    name: String,
    #[getset(get = "pub")]
    /// The entity the sensor is attached to.
    vid: String,
    #[getset(get = "pub")]
    /// The sensor type.
    kind: String,
    #[getset(get = "pub")]
    /// The configuration at attach time. Use [`Configurable`] for live values.
    config: SensorConfig,
}

/// A sensor property that can be read and changed on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Property {
    /// Seconds between two readings.
    RequestedUpdateTime,
    /// The priority in `[0, 1]`.
    UpdatePriority,
    /// The maximum number of uncollected ad-hoc requests.
    MaxPendingRequests,
    /// Whether the sensor is drawn.
    IsVisualised,
}

impl Property {
    const fn wire_name(self) -> &'static str {
        match self {
            Property::RequestedUpdateTime => "RequestedUpdateTime",
            Property::UpdatePriority => "UpdatePriority",
            Property::MaxPendingRequests => "MaxPendingRequests",
            Property::IsVisualised => "IsVisualised",
        }
    }
}

/// A sensor attached through a [`Connection`].
pub trait Sensor {
    /// The link of the connection.
    type Link: Link;

    /// The handle of the sensor.
    fn handle(&self) -> &SensorHandle;

    /// The connection the sensor is attached through.
    fn connection(&self) -> &Connection<Self::Link>;
}

/// A sensor that can be polled synchronously.
pub trait Pollable: Sensor {
    /// The decoded reading.
    type Reading;

    /// Decodes the ack of a poll or of an ad-hoc collection.
    fn decode(&self, ack: &Message) -> Result<Self::Reading, SimError>;

    /// Polls the latest reading.
    fn poll(&self) -> Result<Self::Reading, SimError> {
        let handle = self.handle();
        let ack = self.connection().call(
            Message::new("PollSensor")
                .with("name", handle.name().as_str())
                .with("vid", handle.vid().as_str()),
            "PolledSensor",
        )?;
        self.decode(&ack)
    }
}

/// A sensor whose readings can be requested ahead and collected later.
pub trait AdHocPollable: Pollable {
    /// Submits an ad-hoc poll request.
    fn send_ad_hoc_poll_request(&self) -> Result<RequestId, SimError> {
        self.connection().submit_ad_hoc_poll(self.handle())
    }

    /// Asks the host whether request `id` is ready.
    fn is_ad_hoc_poll_request_ready(&self, id: RequestId) -> Result<bool, SimError> {
        self.ensure_owns(id)?;
        self.connection().is_ad_hoc_poll_request_ready(id)
    }

    /// Collects request `id` and decodes its reading.
    fn collect_ad_hoc_poll_request(&self, id: RequestId) -> Result<Self::Reading, SimError> {
        self.ensure_owns(id)?;
        let ack = self.connection().collect_ad_hoc_poll_request(id)?;
        self.decode(&ack)
    }

    #[doc(hidden)]
    fn ensure_owns(&self, id: RequestId) -> Result<(), PollError> {
        if self.connection().request_owner(id) == Some(self.handle().id()) {
            Ok(())
        } else {
            Err(PollError::UnknownRequest(id))
        }
    }
}

/// A sensor whose properties can be read and changed.
pub trait Configurable: Sensor {
    /// Reads `property` from the host.
    fn get_property(&self, property: Property) -> Result<Value, SimError> {
        self.connection().get_sensor_property(self.handle(), property)
    }

    /// Changes `property` on the host.
    ///
    /// Fails with [`ConfigurationError::RejectedConfiguration`] if the host refuses the value, in
    /// which case the previous value stays in effect.
    fn set_property(&self, property: Property, value: Value) -> Result<(), SimError> {
        self.connection()
            .set_sensor_property(self.handle(), property, value)
    }
}

impl<L: Link> Connection<L> {
    pub(crate) fn attach_sensor(
        &self,
        name: &str,
        vid: &str,
        kind: &str,
        config: SensorConfig,
        extra: Vec<(&'static str, Value)>,
    ) -> Result<SensorHandle, SimError> {
        let mut command = Message::new("OpenSensor")
            .with("name", name)
            .with("vid", vid)
            .with("sensorType", kind)
            .with("updateTime", config.requested_update_time)
            .with("priority", config.update_priority)
            .with("isVisualised", config.is_visualised)
            .with("maxPendingRequests", config.max_pending_requests);
        extra
            .into_iter()
            .for_each(|(field, value)| command.insert(field, value));
        self.call(command, "OpenedSensor")?;

        let id = {
            let mut registry = self.registry();
            let id = SensorId::new(registry.next_sensor_id);
            registry.next_sensor_id += 1;
            registry.sensors.insert(
                id,
                SensorEntry {
                    name: name.to_owned(),
                    max_pending: config.max_pending_requests,
                },
            );
            id
        };
        tracing::info!("Attached {} sensor {} to {} as {}", kind, name, vid, id);

        Ok(SensorHandle {
            id,
            name: name.to_owned(),
            vid: vid.to_owned(),
            kind: kind.to_owned(),
            config,
        })
    }

    pub(crate) fn detach_sensor(&self, handle: &SensorHandle) -> Result<(), SimError> {
        if !self.registry().sensors.contains_key(&handle.id) {
            return Err(PollError::UnknownSensor(handle.name.clone()).into());
        }

        let res = self.call(
            Message::new("CloseSensor")
                .with("name", handle.name.as_str())
                .with("vid", handle.vid.as_str()),
            "ClosedSensor",
        );

        let discarded = {
            let mut registry = self.registry();
            registry.sensors.remove(&handle.id);
            registry.adhoc.remove_sensor(handle.id)
        };
        if !discarded.is_empty() {
            tracing::debug!(
                "Discarded ad-hoc requests {} of {}",
                discarded.iter().join(", "),
                handle.name
            );
        }
        tracing::info!("Removed sensor {} from {}", handle.name, handle.vid);

        res.map(|_| ())
    }

    /// Reads `property` of `sensor` from the host.
    pub fn get_sensor_property(
        &self,
        sensor: &SensorHandle,
        property: Property,
    ) -> Result<Value, SimError> {
        let name = property.wire_name();
        let ack = self.call(
            Message::new(format!("GetSensor{name}"))
                .with("name", sensor.name.as_str())
                .with("vid", sensor.vid.as_str()),
            &format!("CompletedGetSensor{name}"),
        )?;
        Ok(protocol::field::<Value>(&ack, "data")?)
    }

    /// Changes `property` of `sensor` on the host.
    pub fn set_sensor_property(
        &self,
        sensor: &SensorHandle,
        property: Property,
        value: Value,
    ) -> Result<(), SimError> {
        let value = match property {
            Property::MaxPendingRequests => value.as_integral().map_or(value, Value::Int),
            _ => value,
        };
        let name = property.wire_name();
        let ack = self.call(
            Message::new(format!("SetSensor{name}"))
                .with("name", sensor.name.as_str())
                .with("vid", sensor.vid.as_str())
                .with("value", value.clone()),
            &format!("CompletedSetSensor{name}"),
        )?;

        if !protocol::field::<bool>(&ack, "accepted")? {
            let reason = protocol::optional_field::<String>(&ack, "reason")?
                .unwrap_or_else(|| "no reason given".to_owned());
            tracing::debug!("Host rejected {} = {}: {}", property, value, reason);
            return Err(ConfigurationError::RejectedConfiguration {
                property,
                value,
                reason,
            }
            .into());
        }

        if property == Property::MaxPendingRequests {
            if let Some(limit) = value.as_i64().and_then(|v| u32::try_from(v).ok()) {
                if let Some(entry) = self.registry().sensors.get_mut(&sensor.id) {
                    entry.max_pending = limit;
                }
            }
        }
        Ok(())
    }
}
