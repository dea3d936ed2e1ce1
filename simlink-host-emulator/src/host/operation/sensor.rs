use simlink_core::message::{Message, Value};

use crate::{
    error::HostError,
    host::{
        emulator::SensorKey,
        sensor::{zeroed, EmulatedSensor, SensorOutput},
    },
    HostEmulator,
};

use super::sensor_key;

impl HostEmulator {
    pub(crate) fn open_sensor(&mut self, msg: &Message) -> Result<Message, HostError> {
        let key = sensor_key(msg)?;
        if self.sensors.contains_key(&key) {
            return Err(HostError::DuplicateSensor(key.1));
        }

        let kind = msg.field::<String>("sensorType")?;
        let output = match msg.optional_field::<String>("shmName")? {
            Some(region) => SensorOutput::SharedMemory {
                region,
                sample_size: msg.optional_field::<usize>("sampleSize")?.unwrap_or(1).max(1),
                data: Vec::new(),
            },
            None => SensorOutput::Inline(EmulatedSensor::default_inline_reading(&kind)),
        };
        let sensor = EmulatedSensor::new(
            key.0.clone(),
            kind,
            msg.field("updateTime")?,
            msg.field("priority")?,
            msg.field("isVisualised")?,
            msg.field("maxPendingRequests")?,
            output,
        );

        tracing::info!("Host opened {} sensor {} on {}", sensor.kind(), key.1, key.0);
        self.sensors.insert(key, sensor);
        Ok(Message::new("OpenedSensor"))
    }

    pub(crate) fn close_sensor(&mut self, msg: &Message) -> Result<Message, HostError> {
        let key = sensor_key(msg)?;
        self.sensors
            .remove(&key)
            .ok_or_else(|| HostError::UnknownSensor(key.1.clone()))?;
        self.jobs.retain(|_, job| job.sensor != key);
        tracing::info!("Host closed sensor {} on {}", key.1, key.0);
        Ok(Message::new("ClosedSensor"))
    }

    pub(crate) fn poll_sensor(&mut self, msg: &Message) -> Result<Message, HostError> {
        let key = sensor_key(msg)?;
        self.reading(&key, Message::new("PolledSensor"))
    }

    /// Fills `ack` with the current reading of a sensor.
    ///
    /// Inline readings go to `data`. Bulk readings are written into the sensor's region and the
    /// ack carries `samples` and `shmReady`. A disabled sensor yields zeros and writes nothing.
    pub(crate) fn reading(&mut self, key: &SensorKey, mut ack: Message) -> Result<Message, HostError> {
        let sensor = self
            .sensors
            .get_mut(key)
            .ok_or_else(|| HostError::UnknownSensor(key.1.clone()))?;
        sensor.count_poll();
        let disabled = sensor.is_disabled();

        match sensor.output() {
            SensorOutput::Inline(reading) => {
                let data = Value::Map(reading.clone());
                ack.insert("data", if disabled { zeroed(&data) } else { data });
            }
            SensorOutput::SharedMemory {
                region,
                sample_size,
                data,
            } => {
                let samples = if disabled {
                    0
                } else {
                    let region_name = region;
                    let region = self.regions.get_mut(region_name).ok_or_else(|| {
                        HostError::SharedMemory(
                            region_name.clone(),
                            "region was not negotiated".to_owned(),
                        )
                    })?;
                    region.write(data) / sample_size
                };
                ack.insert("samples", samples);
                ack.insert("shmReady", true);
            }
        }
        Ok(ack)
    }
}
